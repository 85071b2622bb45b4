//! Ports (Interfaces) for the shape graph
//!
//! `NodePolicy` is the classification strategy plugged into a `NodeAllocator`:
//! it assigns initial flags and parameterizes the overlap and join heuristics.
//! Policies are shared between threads behind an `Arc<dyn NodePolicy>`.
//!
//! `AbstractDomain` is what the fixpoint solver drives: a per-program-point
//! state with a transfer function and lattice operations.

use crate::config::{JoinPolicy, OverlapPolicy};
use crate::features::shape_graph::domain::{DomainResult, NodeFlags, Region};
use crate::shared::models::LocatedInstruction;
use std::fmt;

pub trait NodePolicy: Send + Sync + fmt::Debug {
    /// Flags of a freshly created node in `region`
    fn initial_flags(&self, region: Region) -> NodeFlags {
        NodeFlags::new(region)
    }

    fn overlap_policy(&self) -> OverlapPolicy;

    fn join_policy(&self) -> JoinPolicy;

    /// Offset of `r10` inside the stack node at function entry
    fn stack_frame_size(&self) -> i64;

    /// Largest finite offset set kept by symbolic cells
    fn max_offset_set(&self) -> usize;

    /// True if `value` looks like a null or dangling pointer
    fn is_plausible_dangling(&self, value: i64) -> bool;

    #[inline]
    fn accepts_tilings(&self) -> bool {
        self.overlap_policy() == OverlapPolicy::Optimistic
    }
}

/// State of a forward abstract interpreter
///
/// Joins and widenings are fallible because merging graphs can hit the same
/// stack invariants as the transfer functions.
pub trait AbstractDomain: Clone + fmt::Debug + Send + Sync + Sized {
    /// Apply one instruction in place
    fn step(&mut self, inst: &LocatedInstruction) -> DomainResult<()>;

    fn join(&self, other: &Self) -> DomainResult<Self>;

    fn widen(&self, other: &Self) -> DomainResult<Self>;

    fn less_or_equal(&self, other: &Self) -> bool;

    fn is_bottom(&self) -> bool;

    /// Copy without unreachable nodes
    fn deep_copy(&self) -> Self;

    /// Bring `self` into a representation comparable with `other`
    fn pseudo_canonicalize(&mut self, other: &Self) -> DomainResult<()>;
}
