//! Numeric abstraction strategies

pub mod constant;
pub mod constant_set;
pub mod interval;

pub use constant::ConstantValue;
pub use constant_set::ConstantSetValue;
pub use interval::IntervalValue;
