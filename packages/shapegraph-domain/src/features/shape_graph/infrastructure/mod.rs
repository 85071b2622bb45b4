//! Shape graph implementation: arena, unification, transfer and lattice

pub mod allocator;
pub mod dot;
pub mod graph;
pub mod lattice;
pub mod transfer;
pub mod unify;

pub use allocator::{DefaultNodePolicy, NodeAllocator};
pub use graph::ShapeGraph;
pub use transfer::{Compatibility, StoreValue};
pub use unify::MergeMode;
