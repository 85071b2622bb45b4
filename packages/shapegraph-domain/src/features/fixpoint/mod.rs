//! # Fixpoint driver
//!
//! - `cfg`: basic blocks on a petgraph digraph
//! - `solver`: worklist iteration with delayed widening at loop heads
//! - `program_analyzer`: per-function analysis, optionally in parallel

pub mod cfg;
pub mod program_analyzer;
pub mod solver;

pub use cfg::{BasicBlock, Cfg, CfgBuilder};
pub use program_analyzer::{FunctionOutcome, FunctionReport, ProgramAnalyzer, ProgramReport};
pub use solver::{FixpointResult, WorklistSolver};
