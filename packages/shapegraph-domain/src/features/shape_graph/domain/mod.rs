//! Shape graph domain types

pub mod cell;
pub mod error;
pub mod node;
pub mod range_set;

pub use cell::{Cell, SymCell, SymOffset};
pub use error::{DomainError, DomainResult};
pub use node::{field_end, FieldKey, NodeAccess, NodeData, NodeFlags, NodeId, NodeKind, NodeSlot, Region, RegionSet};
pub use range_set::{RangeSet, UNBOUNDED};
