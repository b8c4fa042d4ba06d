//! Engine tuning constants

use super::{parse_toml, load_toml, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable engine constants
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub diminishing: DiminishingConfig,
    #[serde(default)]
    pub effects: EffectConfig,
    #[serde(default)]
    pub summons: SummonConfig,
    #[serde(default)]
    pub bus: BusConfig,
}

impl EngineConfig {
    /// Load and validate from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: EngineConfig = load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = parse_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.diminishing.validate()?;
        if !(0.0..=1.0).contains(&self.summons.element_match_chance) {
            return Err(ConfigError::ValidationError(format!(
                "summons.element_match_chance must be within [0, 1], got {}",
                self.summons.element_match_chance
            )));
        }
        if self.summons.max_summons == 0 {
            return Err(ConfigError::ValidationError(
                "summons.max_summons must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Soft-cap curves used when scaling newly added buffs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiminishingConfig {
    #[serde(default = "default_curves")]
    pub curves: Vec<CurveConfig>,
    /// Lower bound for any scaling factor
    #[serde(default = "default_min_factor")]
    pub min_factor: f64,
}

impl Default for DiminishingConfig {
    fn default() -> Self {
        DiminishingConfig {
            curves: default_curves(),
            min_factor: default_min_factor(),
        }
    }
}

impl DiminishingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_factor > 0.0 && self.min_factor <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "diminishing.min_factor must be within (0, 1], got {}",
                self.min_factor
            )));
        }
        for curve in &self.curves {
            if curve.step <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "soft cap for {:?} has non-positive step {}",
                    curve.stats, curve.step
                )));
            }
            if curve.divisor < 1.0 {
                return Err(ConfigError::ValidationError(format!(
                    "soft cap for {:?} has divisor {} below 1",
                    curve.stats, curve.divisor
                )));
            }
        }
        Ok(())
    }
}

/// One soft-cap class: every full `step` above `offset` divides the factor by `divisor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveConfig {
    pub stats: Vec<String>,
    #[serde(default)]
    pub offset: f64,
    pub step: f64,
    pub divisor: f64,
}

fn default_curves() -> Vec<CurveConfig> {
    let curve = |stats: &[&str], offset: f64, step: f64, divisor: f64| CurveConfig {
        stats: stats.iter().map(|s| s.to_string()).collect(),
        offset,
        step,
        divisor,
    };
    vec![
        curve(&["max_hp"], 0.0, 500.0, 4.0),
        curve(&["atk", "defense"], 0.0, 100.0, 100.0),
        curve(&["crit_rate", "mitigation", "vitality"], 0.02, 0.01, 100.0),
        curve(&["crit_damage"], 2.0, 5.0, 1000.0),
    ]
}

fn default_min_factor() -> f64 {
    1e-6
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectConfig {
    /// DOT count at which independent DOTs are resolved in a parallel batch
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
    /// Per-stack chance for Frozen Wound to cancel an action
    #[serde(default = "default_frozen_chance")]
    pub frozen_wound_chance_per_stack: f64,
}

impl Default for EffectConfig {
    fn default() -> Self {
        EffectConfig {
            parallel_threshold: default_parallel_threshold(),
            frozen_wound_chance_per_stack: default_frozen_chance(),
        }
    }
}

fn default_parallel_threshold() -> usize {
    20
}
fn default_frozen_chance() -> f64 {
    0.01
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummonConfig {
    /// Fraction of the summoner's base stats given to a summon
    #[serde(default = "default_stat_multiplier")]
    pub stat_multiplier: f64,
    #[serde(default = "default_max_summons")]
    pub max_summons: usize,
    /// Chance that a summon shares its summoner's element
    #[serde(default = "default_element_match_chance")]
    pub element_match_chance: f64,
    /// Health fraction below which a summon is no longer considered viable
    #[serde(default = "default_min_health_threshold")]
    pub min_health_threshold: f64,
}

impl Default for SummonConfig {
    fn default() -> Self {
        SummonConfig {
            stat_multiplier: default_stat_multiplier(),
            max_summons: default_max_summons(),
            element_match_chance: default_element_match_chance(),
            min_health_threshold: default_min_health_threshold(),
        }
    }
}

fn default_stat_multiplier() -> f64 {
    0.5
}
fn default_max_summons() -> usize {
    1
}
fn default_element_match_chance() -> f64 {
    0.7
}
fn default_min_health_threshold() -> f64 {
    0.25
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Emissions slower than this are logged as warnings
    #[serde(default = "default_slow_emit_warn_ms")]
    pub slow_emit_warn_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            slow_emit_warn_ms: default_slow_emit_warn_ms(),
        }
    }
}

fn default_slow_emit_warn_ms() -> u64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.diminishing.curves.len(), 4);
        assert!((config.diminishing.min_factor - 1e-6).abs() < f64::EPSILON);
        assert_eq!(config.effects.parallel_threshold, 20);
        assert!((config.summons.stat_multiplier - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.summons.max_summons, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_constants() {
        let toml = r#"
[effects]
parallel_threshold = 64

[summons]
stat_multiplier = 0.75
max_summons = 3

[[diminishing.curves]]
stats = ["max_hp"]
step = 1000.0
divisor = 2.0
"#;

        let config = EngineConfig::parse(toml).unwrap();
        assert_eq!(config.effects.parallel_threshold, 64);
        assert!((config.effects.frozen_wound_chance_per_stack - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.summons.max_summons, 3);
        assert!((config.summons.element_match_chance - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.diminishing.curves.len(), 1);
        assert!((config.diminishing.curves[0].offset).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_zero_step() {
        let toml = r#"
[[diminishing.curves]]
stats = ["atk"]
step = 0.0
divisor = 100.0
"#;
        let err = EngineConfig::parse(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_rejects_zero_max_summons() {
        let err = EngineConfig::parse("[summons]\nmax_summons = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_summons"));
    }

    #[test]
    fn test_error_messages_name_the_failure() {
        let err = EngineConfig::parse("[effects]\nparallel_threshold = \"many\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
        assert!(err.to_string().starts_with("malformed engine config TOML"));

        let err = EngineConfig::load(Path::new("/nonexistent/effect_core/engine.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
        assert!(err.to_string().starts_with("cannot read engine config"));

        let err = EngineConfig::parse("[summons]\nelement_match_chance = 1.5\n").unwrap_err();
        assert!(err.to_string().starts_with("rejected engine config: summons.element_match_chance"));
    }
}
