/*
 * Control-flow graph of one function
 *
 * Basic blocks hold located instructions; edges carry no payload. Backed by
 * petgraph so loop heads come from a DFS back-edge scan.
 */

use crate::errors::{Result, ShapeError};
use crate::shared::models::{BlockId, InstLocation, Instruction, LocatedInstruction};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{depth_first_search, Control, DfsEvent};
use petgraph::Direction;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<LocatedInstruction>,
}

#[derive(Debug, Clone)]
pub struct Cfg {
    name: String,
    graph: DiGraph<BasicBlock, ()>,
    index: FxHashMap<BlockId, NodeIndex>,
    entry: BlockId,
}

impl Cfg {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.index.get(&id).map(|ix| &self.graph[*ix])
    }

    /// Blocks in insertion order
    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.graph.node_weights()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    fn neighbors(&self, id: BlockId, dir: Direction) -> Vec<BlockId> {
        let Some(ix) = self.index.get(&id) else { return Vec::new() };
        let mut out: Vec<BlockId> = self.graph.neighbors_directed(*ix, dir).map(|n| self.graph[n].id).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn predecessors(&self, id: BlockId) -> Vec<BlockId> {
        self.neighbors(id, Direction::Incoming)
    }

    pub fn successors(&self, id: BlockId) -> Vec<BlockId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Targets of DFS back edges from the entry
    pub fn loop_heads(&self) -> FxHashSet<BlockId> {
        let mut heads = FxHashSet::default();
        let Some(start) = self.index.get(&self.entry) else { return heads };
        depth_first_search(&self.graph, Some(*start), |event| {
            if let DfsEvent::BackEdge(_, head) = event {
                heads.insert(self.graph[head].id);
            }
            Control::<()>::Continue
        });
        heads
    }
}

/// Incremental CFG construction
///
/// ```rust,ignore
/// let cfg = CfgBuilder::new("f")
///     .block(BlockId(0), vec![Instruction::Jump])
///     .block(BlockId(1), vec![Instruction::Exit])
///     .edge(BlockId(0), BlockId(1))
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct CfgBuilder {
    name: String,
    blocks: Vec<(BlockId, Vec<Instruction>)>,
    edges: Vec<(BlockId, BlockId)>,
    entry: Option<BlockId>,
}

impl CfgBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn block(mut self, id: BlockId, instructions: Vec<Instruction>) -> Self {
        self.blocks.push((id, instructions));
        self
    }

    pub fn edge(mut self, from: BlockId, to: BlockId) -> Self {
        self.edges.push((from, to));
        self
    }

    /// Entry block; defaults to the first block added
    pub fn entry(mut self, id: BlockId) -> Self {
        self.entry = Some(id);
        self
    }

    pub fn build(self) -> Result<Cfg> {
        let mut graph = DiGraph::new();
        let mut index = FxHashMap::default();
        for (id, insts) in self.blocks {
            if index.contains_key(&id) {
                return Err(ShapeError::program(format!("{}: duplicate block {}", self.name, id)));
            }
            let instructions = insts
                .into_iter()
                .enumerate()
                .map(|(i, inst)| LocatedInstruction::new(InstLocation::new(id, i as u32), inst))
                .collect();
            let ix = graph.add_node(BasicBlock { id, instructions });
            index.insert(id, ix);
        }
        for (from, to) in self.edges {
            match (index.get(&from), index.get(&to)) {
                (Some(a), Some(b)) => {
                    graph.add_edge(*a, *b, ());
                }
                _ => {
                    return Err(ShapeError::program(format!(
                        "{}: edge {} -> {} references an unknown block",
                        self.name, from, to
                    )))
                }
            }
        }
        let entry = match self.entry {
            Some(e) if index.contains_key(&e) => e,
            Some(e) => return Err(ShapeError::program(format!("{}: entry {} does not exist", self.name, e))),
            None => match graph.node_weights().next() {
                Some(b) => b.id,
                None => return Err(ShapeError::program(format!("{}: empty function", self.name))),
            },
        };
        Ok(Cfg {
            name: self.name,
            graph,
            index,
            entry,
        })
    }
}
