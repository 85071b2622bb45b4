//! Shared module - Common types and utilities
//!
//! This module contains the bytecode-level types that are shared across all
//! features (registers, instructions, program locations).

pub mod models;

// Re-exports for convenience
pub use models::*;
