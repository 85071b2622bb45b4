//! # Shape graph memory domain
//!
//! Points-to abstraction in the style of unification-based shape analysis:
//! memory is a graph of nodes with byte-addressed fields, equalities between
//! cells are kept in a union-find, and nodes degrade from exact to summarized
//! to collapsed as precision is lost.
//!
//! ## Layers
//! - `domain`: nodes, cells, symbolic offsets, errors
//! - `ports`: `NodePolicy` (classification) and `AbstractDomain` (solver interface)
//! - `infrastructure`: the graph arena, unification, transfer functions, lattice
//! - `application`: `MemoryState`, combining the graph with registers and scalars
//!
//! ## Invariants
//! - the stack node is never summarized nor collapsed; operations that would
//!   need it fail with `DomainError`
//! - a collapsed node has no fields and every cell of it is `(node, 0)`
//! - without the optimistic overlap policy, no two fields of a node overlap

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use application::{MemoryState, RegisterMap};
pub use domain::{
    Cell, DomainError, DomainResult, FieldKey, NodeAccess, NodeData, NodeFlags, NodeId, NodeKind, NodeSlot,
    RangeSet, Region, RegionSet, SymCell, SymOffset,
};
pub use infrastructure::{
    Compatibility, DefaultNodePolicy, MergeMode, NodeAllocator, ShapeGraph, StoreValue,
};
pub use ports::{AbstractDomain, NodePolicy};
