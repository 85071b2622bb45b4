//! Shape analysis configuration
//!
//! `ShapeConfig` holds every knob the memory domain and the fixpoint driver
//! read. YAML files carry a base preset plus optional overrides:
//!
//! ```yaml
//! preset: thorough
//! overrides:
//!   overlap_policy: optimistic
//!   max_iterations: 500
//! ```

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use serde::{Deserialize, Serialize};

/// Numeric abstraction used for integer nodes and the scalar companion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericStrategy {
    /// Flat constant lattice
    Constant,
    /// Small sets of constants
    ConstantSet,
    /// Signed intervals
    Interval,
}

impl NumericStrategy {
    /// Parse strategy from string
    pub fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "constant" => Ok(Self::Constant),
            "constant_set" => Ok(Self::ConstantSet),
            "interval" => Ok(Self::Interval),
            _ => Err(ConfigError::UnknownStrategy(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::ConstantSet => "constant_set",
            Self::Interval => "interval",
        }
    }
}

/// How overlapping fields inside one node are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Any non-exact overlap is incompatible
    Pessimistic,
    /// Exact tilings of narrower fields are accepted (unproven)
    Optimistic,
}

/// How a pointer is joined with a number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// Drop the register
    Pessimistic,
    /// Keep the pointer when the number looks like a null/dangling pointer (unproven)
    Optimistic,
}

/// Memory domain configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShapeConfig {
    /// Numeric strategy
    pub numeric: NumericStrategy,

    /// Field overlap policy
    pub overlap_policy: OverlapPolicy,

    /// Pointer/number join policy
    pub join_policy: JoinPolicy,

    /// Initial offset of `r10` inside the stack node
    pub stack_frame_size: i64,

    /// Largest finite offset set before it goes to top
    pub max_offset_set: usize,

    /// Largest power of two treated as a dangling pointer by the optimistic join
    pub dangling_threshold: i64,

    /// Loop-head visits joined before widening kicks in
    pub widening_delay: usize,

    /// Block visits per function before giving up
    pub max_iterations: usize,

    /// Analyze functions in parallel
    pub enable_parallel: bool,
}

impl ShapeConfig {
    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.stack_frame_size < 8 || self.stack_frame_size > 1 << 20 {
            return Err(ConfigError::range_with_hint(
                "stack_frame_size",
                self.stack_frame_size,
                8,
                1 << 20,
                "Stack frame must hold at least one 64-bit slot",
            ));
        }
        if self.stack_frame_size % 8 != 0 {
            return Err(ConfigError::Validation(format!(
                "stack_frame_size must be 8-byte aligned, got {}",
                self.stack_frame_size
            )));
        }
        if self.max_offset_set == 0 || self.max_offset_set > 64 {
            return Err(ConfigError::range_with_hint(
                "max_offset_set",
                self.max_offset_set,
                1,
                64,
                "Large offset sets slow down joins without helping convergence",
            ));
        }
        if self.dangling_threshold < 0 || self.dangling_threshold > 4096 {
            return Err(ConfigError::range_with_hint(
                "dangling_threshold",
                self.dangling_threshold,
                0,
                4096,
                "Only small values are plausible dangling pointers",
            ));
        }
        if self.widening_delay > 32 {
            return Err(ConfigError::range_with_hint(
                "widening_delay",
                self.widening_delay,
                0,
                32,
                "Long delays rarely gain precision",
            ));
        }
        if self.max_iterations == 0 || self.max_iterations > 1_000_000 {
            return Err(ConfigError::range_with_hint(
                "max_iterations",
                self.max_iterations,
                1,
                1_000_000,
                "Iteration budget must be positive",
            ));
        }
        Ok(())
    }

    /// Builder: Set numeric strategy
    pub fn numeric(mut self, v: NumericStrategy) -> Self {
        self.numeric = v;
        self
    }

    /// Builder: Set overlap_policy
    pub fn overlap_policy(mut self, v: OverlapPolicy) -> Self {
        self.overlap_policy = v;
        self
    }

    /// Builder: Set join_policy
    pub fn join_policy(mut self, v: JoinPolicy) -> Self {
        self.join_policy = v;
        self
    }

    /// Builder: Set stack_frame_size
    pub fn stack_frame_size(mut self, v: i64) -> Self {
        self.stack_frame_size = v;
        self
    }

    /// Builder: Set max_offset_set
    pub fn max_offset_set(mut self, v: usize) -> Self {
        self.max_offset_set = v;
        self
    }

    /// Builder: Set dangling_threshold
    pub fn dangling_threshold(mut self, v: i64) -> Self {
        self.dangling_threshold = v;
        self
    }

    /// Builder: Set widening_delay
    pub fn widening_delay(mut self, v: usize) -> Self {
        self.widening_delay = v;
        self
    }

    /// Builder: Set max_iterations
    pub fn max_iterations(mut self, v: usize) -> Self {
        self.max_iterations = v;
        self
    }

    /// Builder: Set enable_parallel
    pub fn enable_parallel(mut self, v: bool) -> Self {
        self.enable_parallel = v;
        self
    }

    /// Get preset configuration
    pub fn from_preset(preset: Preset) -> Self {
        let base = Self {
            numeric: NumericStrategy::ConstantSet,
            overlap_policy: OverlapPolicy::Pessimistic,
            join_policy: JoinPolicy::Pessimistic,
            stack_frame_size: 4096,
            max_offset_set: 8,
            dangling_threshold: 64,
            widening_delay: 2,
            max_iterations: 5000,
            enable_parallel: true,
        };
        match preset {
            Preset::Fast => Self {
                numeric: NumericStrategy::Constant,
                widening_delay: 1,
                max_iterations: 1000,
                max_offset_set: 4,
                ..base
            },
            Preset::Balanced | Preset::Custom => base,
            Preset::Thorough => Self {
                numeric: NumericStrategy::Interval,
                widening_delay: 3,
                max_iterations: 20_000,
                max_offset_set: 16,
                ..base
            },
        }
    }

    /// Load from YAML text (`preset` + `overrides`), validated
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let file: ShapeConfigFile = serde_yaml::from_str(yaml)?;
        let mut config = Self::from_preset(file.preset);
        if let Some(overrides) = file.overrides {
            overrides.apply(&mut config);
        }
        config.validate()?;
        Ok(config)
    }

    /// Export as YAML; every field is written as an override on `custom`
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = ShapeConfigFile {
            preset: Preset::Custom,
            overrides: Some(ShapeConfigPatch::from(self)),
        };
        Ok(serde_yaml::to_string(&file)?)
    }
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Balanced)
    }
}

/// On-disk layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ShapeConfigFile {
    #[serde(default)]
    preset: Preset,

    #[serde(skip_serializing_if = "Option::is_none")]
    overrides: Option<ShapeConfigPatch>,
}

/// Partial override of a `ShapeConfig`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShapeConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap_policy: Option<OverlapPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_policy: Option<JoinPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_frame_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_offset_set: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dangling_threshold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widening_delay: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_parallel: Option<bool>,
}

impl ShapeConfigPatch {
    /// Overwrite the fields that are set
    pub fn apply(&self, config: &mut ShapeConfig) {
        if let Some(v) = self.numeric {
            config.numeric = v;
        }
        if let Some(v) = self.overlap_policy {
            config.overlap_policy = v;
        }
        if let Some(v) = self.join_policy {
            config.join_policy = v;
        }
        if let Some(v) = self.stack_frame_size {
            config.stack_frame_size = v;
        }
        if let Some(v) = self.max_offset_set {
            config.max_offset_set = v;
        }
        if let Some(v) = self.dangling_threshold {
            config.dangling_threshold = v;
        }
        if let Some(v) = self.widening_delay {
            config.widening_delay = v;
        }
        if let Some(v) = self.max_iterations {
            config.max_iterations = v;
        }
        if let Some(v) = self.enable_parallel {
            config.enable_parallel = v;
        }
    }
}

impl From<&ShapeConfig> for ShapeConfigPatch {
    fn from(c: &ShapeConfig) -> Self {
        Self {
            numeric: Some(c.numeric),
            overlap_policy: Some(c.overlap_policy),
            join_policy: Some(c.join_policy),
            stack_frame_size: Some(c.stack_frame_size),
            max_offset_set: Some(c.max_offset_set),
            dangling_threshold: Some(c.dangling_threshold),
            widening_delay: Some(c.widening_delay),
            max_iterations: Some(c.max_iterations),
            enable_parallel: Some(c.enable_parallel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_presets_are_valid_and_pessimistic() {
        for preset in [Preset::Fast, Preset::Balanced, Preset::Thorough, Preset::Custom] {
            let config = ShapeConfig::from_preset(preset);
            assert!(config.validate().is_ok(), "{} preset invalid", preset);
            assert_eq!(config.overlap_policy, OverlapPolicy::Pessimistic);
            assert_eq!(config.join_policy, JoinPolicy::Pessimistic);
            assert_eq!(config.stack_frame_size, 4096);
        }
        assert_eq!(ShapeConfig::from_preset(Preset::Fast).numeric, NumericStrategy::Constant);
        assert_eq!(ShapeConfig::from_preset(Preset::Thorough).numeric, NumericStrategy::Interval);
    }

    #[test]
    fn test_builder_and_validation() {
        let config = ShapeConfig::default().widening_delay(40);
        assert!(matches!(config.validate(), Err(ConfigError::Range { .. })));

        let config = ShapeConfig::default().stack_frame_size(4100);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let config = ShapeConfig::default()
            .overlap_policy(OverlapPolicy::Optimistic)
            .max_iterations(10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = "preset: thorough\noverrides:\n  overlap_policy: optimistic\n  max_iterations: 500\n";
        let config = ShapeConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.numeric, NumericStrategy::Interval);
        assert_eq!(config.overlap_policy, OverlapPolicy::Optimistic);
        assert_eq!(config.max_iterations, 500);
    }

    #[test]
    fn test_yaml_rejects_unknown_and_invalid() {
        assert!(matches!(
            ShapeConfig::from_yaml_str("preset: fast\nturbo: true\n"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            ShapeConfig::from_yaml_str("overrides:\n  max_offset_set: 0\n"),
            Err(ConfigError::Range { .. })
        ));
    }

    #[test]
    fn test_yaml_export_reloads() {
        let config = ShapeConfig::from_preset(Preset::Fast).join_policy(JoinPolicy::Optimistic);
        let yaml = config.to_yaml().unwrap();
        assert_eq!(ShapeConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(NumericStrategy::from_str("constant-set").unwrap(), NumericStrategy::ConstantSet);
        assert_eq!(NumericStrategy::Interval.as_str(), "interval");
        assert!(NumericStrategy::from_str("octagon").is_err());
    }
}
