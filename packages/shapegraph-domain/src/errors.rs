//! Error types for shapegraph-domain
//!
//! Domain errors (`DomainError`) are raised by the points-to graph and carry no
//! location; the fixpoint driver attributes them to a function and an
//! instruction before they reach callers as `ShapeError`.

use crate::config::ConfigError;
use crate::features::shape_graph::DomainError;
use crate::shared::models::{BlockId, InstLocation};
use thiserror::Error;

/// Main error type for shapegraph-domain operations
#[derive(Debug, Error)]
pub enum ShapeError {
    /// A transfer function rejected an instruction
    #[error("{function} at {location}: {source}")]
    Instruction {
        function: String,
        location: InstLocation,
        #[source]
        source: DomainError,
    },

    /// Joining or widening predecessor states failed
    #[error("{function} at merge into {block}: {source}")]
    Merge {
        function: String,
        block: BlockId,
        #[source]
        source: DomainError,
    },

    /// Fixpoint iteration did not stabilize
    #[error("{function}: no fixpoint after {iterations} iterations")]
    NoConvergence { function: String, iterations: usize },

    /// Malformed program (missing entry, dangling edge, ...)
    #[error("Program error: {0}")]
    Program(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ShapeError {
    /// Create a program error
    pub fn program(msg: impl Into<String>) -> Self {
        ShapeError::Program(msg.into())
    }

    /// Underlying domain error, if the failure came from the abstract domain
    pub fn domain_error(&self) -> Option<&DomainError> {
        match self {
            ShapeError::Instruction { source, .. } | ShapeError::Merge { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Name of the function the error is attributed to
    pub fn function(&self) -> Option<&str> {
        match self {
            ShapeError::Instruction { function, .. }
            | ShapeError::Merge { function, .. }
            | ShapeError::NoConvergence { function, .. } => Some(function),
            _ => None,
        }
    }
}

/// Result type alias for shapegraph operations
pub type Result<T> = std::result::Result<T, ShapeError>;
