//! Feature slices
//!
//! - `numeric`: value abstractions and the scalar companion
//! - `shape_graph`: the points-to memory domain
//! - `fixpoint`: CFGs, the worklist solver and whole-program driver

pub mod fixpoint;
pub mod numeric;
pub mod shape_graph;
