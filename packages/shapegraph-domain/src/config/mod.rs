//! Analysis configuration
//!
//! Two tiers, same as the rest of the pipeline configs:
//! - Level 1: Preset - one-liner (`ShapeConfig::from_preset(Preset::Fast)`)
//! - Level 2: Builder / YAML overrides for individual knobs
//!
//! # Examples
//!
//! ```rust,ignore
//! use shapegraph_domain::config::{ShapeConfig, Preset, OverlapPolicy};
//!
//! let config = ShapeConfig::from_preset(Preset::Thorough)
//!     .overlap_policy(OverlapPolicy::Optimistic)
//!     .widening_delay(4);
//! config.validate()?;
//!
//! let config = ShapeConfig::from_yaml_str("preset: fast\noverrides:\n  max_iterations: 500\n")?;
//! ```
//!
//! Presets never enable the optimistic policies; those are unproven and must
//! be opted into explicitly.

pub mod error;
pub mod preset;
pub mod shape_config;

// Re-exports
pub use error::{ConfigError, ConfigResult};
pub use preset::Preset;
pub use shape_config::{JoinPolicy, NumericStrategy, OverlapPolicy, ShapeConfig, ShapeConfigPatch};
