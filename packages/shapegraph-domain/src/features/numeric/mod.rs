//! # Numeric companion
//!
//! Non-relational numeric values used in two places:
//! - integer nodes of the shape graph (a value per leaf node)
//! - the scalar companion of a memory state (registers and stack slots)
//!
//! Three strategies are shipped: flat constants, small constant sets and
//! intervals. The strategy is picked once per analysis (`NumericStrategy`) and
//! the memory domain is monomorphized over it.

pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use domain::{ConstantSetValue, ConstantValue, IntervalValue};
pub use infrastructure::BasicScalars;
pub use ports::{NumValue, ScalarDomain};
