/*
 * Worklist fixpoint solver over basic blocks
 *
 * Algorithm (Kildall with delayed widening):
 * 1. Entry input = initial state
 * 2. Pop block; input = join of predecessor outputs (plus initial at entry)
 * 3. Skip if input ⊑ previous input (after pseudo-canonicalization)
 * 4. Loop heads visited more than `widening_delay` times widen, others join
 * 5. Run the block, store its output, enqueue successors
 *
 * Domain errors are attributed to the function and the failing instruction
 * (or the block whose merge failed).
 */

use crate::config::ShapeConfig;
use crate::errors::{Result, ShapeError};
use crate::features::fixpoint::cfg::Cfg;
use crate::features::shape_graph::{AbstractDomain, DomainError};
use crate::shared::models::BlockId;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Per-block states at the fixpoint
#[derive(Debug, Clone)]
pub struct FixpointResult<D> {
    pub inputs: FxHashMap<BlockId, D>,
    pub outputs: FxHashMap<BlockId, D>,
    /// Blocks processed, skipped ones included
    pub iterations: usize,
    /// Join of the outputs of blocks without successors
    pub exit: Option<D>,
}

impl<D> FixpointResult<D> {
    pub fn input(&self, block: BlockId) -> Option<&D> {
        self.inputs.get(&block)
    }

    pub fn output(&self, block: BlockId) -> Option<&D> {
        self.outputs.get(&block)
    }
}

pub struct WorklistSolver<'a> {
    cfg: &'a Cfg,
    widening_delay: usize,
    max_iterations: usize,
}

impl<'a> WorklistSolver<'a> {
    pub fn new(cfg: &'a Cfg, config: &ShapeConfig) -> Self {
        Self {
            cfg,
            widening_delay: config.widening_delay,
            max_iterations: config.max_iterations,
        }
    }

    pub fn with_widening_delay(mut self, delay: usize) -> Self {
        self.widening_delay = delay;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn merge_error(&self, block: BlockId) -> impl Fn(DomainError) -> ShapeError + '_ {
        move |source| ShapeError::Merge {
            function: self.cfg.name().to_string(),
            block,
            source,
        }
    }

    /// Join of predecessor outputs, `None` if nothing reached the block yet
    fn block_input<D: AbstractDomain>(
        &self,
        block: BlockId,
        initial: &D,
        outputs: &FxHashMap<BlockId, D>,
    ) -> Result<Option<D>> {
        let mut acc = (block == self.cfg.entry()).then(|| initial.clone());
        for pred in self.cfg.predecessors(block) {
            let Some(out) = outputs.get(&pred) else { continue };
            acc = Some(match acc {
                None => out.clone(),
                Some(a) => a.join(out).map_err(self.merge_error(block))?,
            });
        }
        Ok(acc)
    }

    fn run_block<D: AbstractDomain>(&self, block: BlockId, input: &D) -> Result<D> {
        let mut state = input.clone();
        let Some(bb) = self.cfg.block(block) else { return Ok(state) };
        for inst in &bb.instructions {
            if state.is_bottom() {
                break;
            }
            state.step(inst).map_err(|source| ShapeError::Instruction {
                function: self.cfg.name().to_string(),
                location: inst.location,
                source,
            })?;
        }
        Ok(state)
    }

    pub fn solve<D: AbstractDomain>(&self, initial: D) -> Result<FixpointResult<D>> {
        let heads = self.cfg.loop_heads();
        let mut inputs: FxHashMap<BlockId, D> = FxHashMap::default();
        let mut outputs: FxHashMap<BlockId, D> = FxHashMap::default();
        let mut visits: FxHashMap<BlockId, usize> = FxHashMap::default();
        let mut queue = VecDeque::from([self.cfg.entry()]);
        let mut queued: FxHashSet<BlockId> = queue.iter().copied().collect();
        let mut iterations = 0usize;

        while let Some(block) = queue.pop_front() {
            queued.remove(&block);
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(ShapeError::NoConvergence {
                    function: self.cfg.name().to_string(),
                    iterations: self.max_iterations,
                });
            }

            let Some(mut incoming) = self.block_input(block, &initial, &outputs)? else { continue };
            let seen = visits.entry(block).or_insert(0);
            *seen += 1;
            let visit = *seen;

            let input = match inputs.get(&block) {
                Some(old) => {
                    incoming.pseudo_canonicalize(old).map_err(self.merge_error(block))?;
                    if outputs.contains_key(&block) && incoming.less_or_equal(old) {
                        trace!(%block, "input stable");
                        continue;
                    }
                    if heads.contains(&block) && visit > self.widening_delay {
                        trace!(%block, visit, "widening");
                        old.widen(&incoming).map_err(self.merge_error(block))?
                    } else {
                        old.join(&incoming).map_err(self.merge_error(block))?
                    }
                }
                None => incoming,
            };

            let output = self.run_block(block, &input)?;
            inputs.insert(block, input);
            outputs.insert(block, output);
            for succ in self.cfg.successors(block) {
                if queued.insert(succ) {
                    queue.push_back(succ);
                }
            }
        }

        let mut exits: Vec<BlockId> = outputs
            .keys()
            .copied()
            .filter(|b| self.cfg.successors(*b).is_empty())
            .collect();
        exits.sort_unstable();
        let mut exit: Option<D> = None;
        for b in exits {
            let Some(out) = outputs.get(&b) else { continue };
            exit = Some(match exit {
                None => out.clone(),
                Some(e) => e.join(out).map_err(self.merge_error(b))?,
            });
        }

        debug!(function = self.cfg.name(), iterations, blocks = outputs.len(), "fixpoint reached");
        Ok(FixpointResult {
            inputs,
            outputs,
            iterations,
            exit,
        })
    }
}
