//! DoT preset loading

use super::ConfigError;
use crate::dot::{DotPreset, DotRegistry, HotPreset};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Container for DoT/HoT presets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DotPresetsConfig {
    #[serde(default)]
    pub dot_presets: Vec<DotPreset>,
    #[serde(default)]
    pub hot_presets: Vec<HotPreset>,
}

impl DotPresetsConfig {
    fn into_registry(self) -> Result<DotRegistry, ConfigError> {
        let mut registry = DotRegistry::new();
        for preset in self.dot_presets {
            if preset.turns <= 0 {
                return Err(ConfigError::ValidationError(format!(
                    "DoT preset '{}' must last at least one turn",
                    preset.id
                )));
            }
            if preset.max_stacks == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "DoT preset '{}' has max_stacks = 0",
                    preset.id
                )));
            }
            registry.register(preset);
        }
        for preset in self.hot_presets {
            if preset.turns <= 0 {
                return Err(ConfigError::ValidationError(format!(
                    "HoT preset '{}' must last at least one turn",
                    preset.id
                )));
            }
            registry.register_hot(preset);
        }
        Ok(registry)
    }
}

/// Load DoT presets from a TOML file
pub fn load_dot_presets(path: &Path) -> Result<DotRegistry, ConfigError> {
    let config: DotPresetsConfig = super::load_toml(path)?;
    config.into_registry()
}

/// Load DoT presets from a TOML string
pub fn parse_dot_presets(content: &str) -> Result<DotRegistry, ConfigError> {
    let config: DotPresetsConfig = super::parse_toml(content)?;
    config.into_registry()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dot::DotBehavior;
    use crate::types::DamageType;

    #[test]
    fn test_parse_presets() {
        let toml = r#"
[[dot_presets]]
id = "blazing_torment"
name = "Blazing Torment"
damage_type = "fire"
damage_fraction = 0.5
turns = 3

[dot_presets.behavior]
type = "blazing_torment"

[[dot_presets]]
id = "gale_erosion"
name = "Gale Erosion"
damage_type = "wind"
damage_fraction = 0.25
turns = 3
max_stacks = 5

[[hot_presets]]
id = "light_radiant_regeneration"
name = "Radiant Regeneration"
damage_type = "light"
healing = 5
turns = 2
"#;

        let registry = parse_dot_presets(toml).unwrap();
        let fire = registry.get(DamageType::Fire).unwrap();
        assert_eq!(fire.behavior, DotBehavior::BlazingTorment);

        let wind = registry.get(DamageType::Wind).unwrap();
        assert_eq!(wind.behavior, DotBehavior::Plain);
        assert_eq!(wind.max_stacks, Some(5));

        assert!(registry.get(DamageType::Ice).is_none());
        assert!(registry.get_hot(DamageType::Light).is_some());
    }

    #[test]
    fn test_rejects_zero_turns() {
        let toml = r#"
[[dot_presets]]
id = "fizzle"
name = "Fizzle"
damage_type = "dark"
damage_fraction = 0.1
turns = 0
"#;
        let err = parse_dot_presets(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
