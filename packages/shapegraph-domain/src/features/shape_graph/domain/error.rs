//! Domain errors
//!
//! Every variant is fatal to the function being analyzed. Touching fresh
//! non-stack memory is never an error.

use super::node::NodeId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Load/store on a stack range whose contents were smashed to unknown
    #[error("access to unknown stack region [{offset}, {end})")]
    UnknownRegion { offset: i64, end: i64 },

    /// memcpy/memset with unresolved length touching structured stack memory
    #[error("unbounded {operation} touches stack structure at offset {offset}")]
    UnboundedStackOperation { operation: &'static str, offset: i64 },

    /// Non-constant stride on a stack pointer, or non-exact stack offset used for an access
    #[error("stack address cannot be represented: {reason}")]
    UnrepresentableStackAddress { reason: String },

    /// Stack load over fields that do not line up with the access
    #[error("stack load [{offset}, {end}) overlaps incompatible fields")]
    IncompatibleStackAccess { offset: i64, end: i64 },

    /// `base + offset + len` does not fit in an offset
    #[error("access of {len} bytes at {base} + {offset} overflows the offset range")]
    AddressOverflow { base: i64, offset: i64, len: u64 },

    /// An operation would summarize or collapse the stack node
    #[error("operation would collapse the stack: {reason}")]
    StackCollapse { reason: String },

    /// Internal invariant broken: a node id does not resolve to a live node
    #[error("node {0} is not live in the graph")]
    DanglingNode(NodeId),
}

impl DomainError {
    pub fn unrepresentable(reason: impl Into<String>) -> Self {
        DomainError::UnrepresentableStackAddress { reason: reason.into() }
    }

    pub fn stack_collapse(reason: impl Into<String>) -> Self {
        DomainError::StackCollapse { reason: reason.into() }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
