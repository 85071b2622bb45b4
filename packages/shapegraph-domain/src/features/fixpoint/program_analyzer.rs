//! Whole-program driver
//!
//! Functions are analyzed independently: each gets its own `NodeAllocator`
//! and entry state, so they can run on the rayon pool. A failure is reported
//! per function and never aborts the others.

use crate::config::{NumericStrategy, ShapeConfig};
use crate::errors::{Result, ShapeError};
use crate::features::fixpoint::cfg::Cfg;
use crate::features::fixpoint::solver::WorklistSolver;
use crate::features::numeric::{BasicScalars, ConstantSetValue, ConstantValue, IntervalValue, ScalarDomain};
use crate::features::shape_graph::{AbstractDomain, MemoryState, NodeAllocator};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum FunctionOutcome {
    Converged {
        iterations: usize,
        /// Live nodes reachable in the exit state
        live_nodes: usize,
    },
    Failed(ShapeError),
}

#[derive(Debug)]
pub struct FunctionReport {
    pub name: String,
    pub outcome: FunctionOutcome,
}

impl FunctionReport {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, FunctionOutcome::Converged { .. })
    }

    pub fn error(&self) -> Option<&ShapeError> {
        match &self.outcome {
            FunctionOutcome::Failed(e) => Some(e),
            FunctionOutcome::Converged { .. } => None,
        }
    }
}

/// Reports in input order
#[derive(Debug, Default)]
pub struct ProgramReport {
    pub functions: Vec<FunctionReport>,
}

impl ProgramReport {
    pub fn get(&self, name: &str) -> Option<&FunctionReport> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn succeeded(&self) -> usize {
        self.functions.iter().filter(|f| f.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FunctionReport> {
        self.functions.iter().filter(|f| !f.is_ok())
    }
}

#[derive(Debug, Clone)]
pub struct ProgramAnalyzer {
    config: ShapeConfig,
}

impl ProgramAnalyzer {
    pub fn new(config: ShapeConfig) -> Result<Self> {
        config.validate()?;
        info!(
            numeric = config.numeric.as_str(),
            overlap = ?config.overlap_policy,
            join = ?config.join_policy,
            "shape analyzer initialized"
        );
        Ok(Self { config })
    }

    pub fn config(&self) -> &ShapeConfig {
        &self.config
    }

    fn run<S: ScalarDomain>(&self, cfg: &Cfg) -> Result<FunctionOutcome> {
        let initial = MemoryState::<S>::new(NodeAllocator::from_config(&self.config));
        let result = WorklistSolver::new(cfg, &self.config).solve(initial)?;
        let live_nodes = result
            .exit
            .as_ref()
            .map_or(0, |s| s.deep_copy().graph().live_count());
        Ok(FunctionOutcome::Converged {
            iterations: result.iterations,
            live_nodes,
        })
    }

    pub fn analyze_function(&self, cfg: &Cfg) -> FunctionReport {
        let start = Instant::now();
        let outcome = match self.config.numeric {
            NumericStrategy::Constant => self.run::<BasicScalars<ConstantValue>>(cfg),
            NumericStrategy::ConstantSet => self.run::<BasicScalars<ConstantSetValue>>(cfg),
            NumericStrategy::Interval => self.run::<BasicScalars<IntervalValue>>(cfg),
        };
        let outcome = match outcome {
            Ok(o) => {
                debug!(function = cfg.name(), elapsed = ?start.elapsed(), "analysis converged");
                o
            }
            Err(e) => {
                warn!(function = cfg.name(), error = %e, "analysis failed");
                FunctionOutcome::Failed(e)
            }
        };
        FunctionReport {
            name: cfg.name().to_string(),
            outcome,
        }
    }

    pub fn analyze_program(&self, functions: &[Cfg]) -> ProgramReport {
        let start = Instant::now();
        let report = ProgramReport {
            functions: self.analyze_all(functions),
        };
        info!(
            functions = functions.len(),
            failed = functions.len() - report.succeeded(),
            elapsed = ?start.elapsed(),
            "program analyzed"
        );
        report
    }

    #[cfg(feature = "parallel")]
    fn analyze_all(&self, functions: &[Cfg]) -> Vec<FunctionReport> {
        if self.config.enable_parallel {
            functions.par_iter().map(|f| self.analyze_function(f)).collect()
        } else {
            functions.iter().map(|f| self.analyze_function(f)).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn analyze_all(&self, functions: &[Cfg]) -> Vec<FunctionReport> {
        functions.iter().map(|f| self.analyze_function(f)).collect()
    }
}
