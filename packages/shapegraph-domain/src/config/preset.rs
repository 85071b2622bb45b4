//! Preset configurations
//!
//! Presets trade precision of the numeric companion for speed. All presets use
//! the pessimistic overlap and join policies.

use super::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

/// Configuration preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// CI: flat constants, widen at the first revisit
    ///
    /// - Numeric: constant
    /// - widening_delay=1, max_iterations=1000
    Fast,

    /// Development: small constant sets
    ///
    /// - Numeric: constant_set
    /// - widening_delay=2, max_iterations=5000
    Balanced,

    /// Audit: intervals, late widening
    ///
    /// - Numeric: interval
    /// - widening_delay=3, max_iterations=20000
    Thorough,

    /// Custom: minimal defaults, expected to be overridden via YAML or builders
    Custom,
}

impl Preset {
    /// Parse preset from string
    pub fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "thorough" => Ok(Self::Thorough),
            "custom" => Ok(Self::Custom),
            _ => Err(ConfigError::UnknownPreset(s.to_string())),
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::Thorough => "thorough",
            Self::Custom => "custom",
        }
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self::Balanced
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
