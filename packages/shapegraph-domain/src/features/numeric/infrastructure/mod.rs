//! Numeric infrastructure

pub mod basic_scalars;

pub use basic_scalars::BasicScalars;
