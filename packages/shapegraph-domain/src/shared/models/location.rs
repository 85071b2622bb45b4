//! Program locations
//!
//! A location identifies one instruction inside a basic block. Errors raised by
//! the abstract domains are attributed to the offending location.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Basic block label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Instruction position: block label + index inside the block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstLocation {
    pub block: BlockId,
    pub index: u32,
}

impl InstLocation {
    pub fn new(block: BlockId, index: u32) -> Self {
        Self { block, index }
    }

    /// Location used for instructions built outside any CFG (tests, ad-hoc stepping)
    pub fn detached() -> Self {
        Self::new(BlockId(u32::MAX), 0)
    }
}

impl fmt::Display for InstLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.index)
    }
}
