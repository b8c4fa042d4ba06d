//! DoT (Damage over Time) system

mod active;
pub mod tick;
mod types;

pub use active::DamageOverTime;
pub use tick::{is_batchable, tick_batch, tick_dot, DotHit};
pub use types::{DotBehavior, DotPreset, HotPreset};

use crate::effects::HealingOverTime;
use crate::types::{DamageType, EntityId};
use std::collections::HashMap;

/// Per-damage-type DoT and HoT factories
#[derive(Debug, Clone, Default)]
pub struct DotRegistry {
    dots: HashMap<DamageType, DotPreset>,
    hots: HashMap<DamageType, HotPreset>,
}

impl DotRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        DotRegistry {
            dots: HashMap::new(),
            hots: HashMap::new(),
        }
    }

    /// Register (or replace) the DoT preset for a damage type
    pub fn register(&mut self, preset: DotPreset) {
        self.dots.insert(preset.damage_type, preset);
    }

    pub fn register_hot(&mut self, preset: HotPreset) {
        self.hots.insert(preset.damage_type, preset);
    }

    pub fn get(&self, damage_type: DamageType) -> Option<&DotPreset> {
        self.dots.get(&damage_type)
    }

    pub fn get_hot(&self, damage_type: DamageType) -> Option<&HotPreset> {
        self.hots.get(&damage_type)
    }

    /// DoT inflicted by a hit of `damage` with `damage_type`, if that type has one
    pub fn create_dot(
        &self,
        damage_type: DamageType,
        damage: f64,
        source: Option<&EntityId>,
    ) -> Option<DamageOverTime> {
        let dot = self.get(damage_type).map(|p| p.create(damage, source));
        if dot.is_none() {
            tracing::debug!(%damage_type, "no DoT preset for damage type");
        }
        dot
    }

    pub fn create_hot(
        &self,
        damage_type: DamageType,
        source: Option<&EntityId>,
    ) -> Option<HealingOverTime> {
        self.get_hot(damage_type).map(|p| p.create(source))
    }

    /// Load default presets
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let mut dot = |id: &str,
                       name: &str,
                       damage_type: DamageType,
                       damage_fraction: f64,
                       behavior: DotBehavior| {
            registry.register(DotPreset {
                id: id.to_string(),
                name: name.to_string(),
                damage_type,
                damage_fraction,
                turns: 3,
                max_stacks: None,
                behavior,
            });
        };

        dot(
            "abyssal_corruption",
            "Abyssal Corruption",
            DamageType::Dark,
            0.4,
            DotBehavior::AbyssalCorruption,
        );
        dot(
            "blazing_torment",
            "Blazing Torment",
            DamageType::Fire,
            0.5,
            DotBehavior::BlazingTorment,
        );
        dot(
            "frozen_wound",
            "Frozen Wound",
            DamageType::Ice,
            0.25,
            DotBehavior::FrozenWound,
        );
        dot(
            "celestial_atrophy",
            "Celestial Atrophy",
            DamageType::Light,
            0.3,
            DotBehavior::CelestialAtrophy,
        );
        dot(
            "charged_decay",
            "Charged Decay",
            DamageType::Lightning,
            0.25,
            DotBehavior::Plain,
        );
        dot(
            "gale_erosion",
            "Gale Erosion",
            DamageType::Wind,
            0.25,
            DotBehavior::Plain,
        );

        registry.register_hot(HotPreset {
            id: "light_radiant_regeneration".to_string(),
            name: "Radiant Regeneration".to_string(),
            damage_type: DamageType::Light,
            healing: 5,
            turns: 2,
        });

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_presets() {
        let registry = DotRegistry::with_defaults();
        let cases = [
            (DamageType::Dark, "abyssal_corruption", 40),
            (DamageType::Fire, "blazing_torment", 50),
            (DamageType::Ice, "frozen_wound", 25),
            (DamageType::Light, "celestial_atrophy", 30),
            (DamageType::Lightning, "charged_decay", 25),
            (DamageType::Wind, "gale_erosion", 25),
        ];
        for (damage_type, id, damage) in cases {
            let dot = registry.create_dot(damage_type, 100.0, None).unwrap();
            assert_eq!(dot.id, id);
            assert_eq!(dot.damage, damage);
            assert_eq!(dot.turns, 3);
            assert_eq!(dot.damage_type, damage_type);
        }
    }

    #[test]
    fn test_generic_has_no_dot() {
        let registry = DotRegistry::with_defaults();
        assert!(registry.create_dot(DamageType::Generic, 100.0, None).is_none());
    }

    #[test]
    fn test_light_hot_preset() {
        let registry = DotRegistry::with_defaults();
        let source = EntityId::from("lady_light");
        let hot = registry.create_hot(DamageType::Light, Some(&source)).unwrap();
        assert_eq!(hot.id, "light_radiant_regeneration");
        assert_eq!(hot.source, Some(source));
        assert!(registry.create_hot(DamageType::Fire, None).is_none());
    }
}
