//! DoT behaviour and preset definitions

use super::DamageOverTime;
use crate::effects::HealingOverTime;
use crate::types::{DamageType, EntityId};
use serde::{Deserialize, Serialize};

/// Special behaviour layered on top of plain per-turn damage
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DotBehavior {
    /// Damage once per turn, nothing else
    #[default]
    Plain,
    /// Also ticks whenever the bearer takes an action
    BlazingTorment,
    /// Each stack adds a chance for the bearer's action to be skipped
    FrozenWound,
    /// Spreads a copy of itself to every ally when the bearer dies
    AbyssalCorruption,
    /// Each tick attaches an attack-down modifier lasting the remaining turns
    CelestialAtrophy,
    /// Damage recomputed every tick from the bearer's last damage taken
    Echo {
        fraction: f64,
    },
}

impl DotBehavior {
    /// Whether a tick depends only on the DoT itself and the bearer's
    /// mitigation, so it can be resolved out of order
    pub fn is_independent(&self) -> bool {
        !matches!(self, DotBehavior::CelestialAtrophy | DotBehavior::Echo { .. })
    }

    pub fn spreads_on_death(&self) -> bool {
        matches!(self, DotBehavior::AbyssalCorruption)
    }
}

/// Factory entry turning a hit into a DoT for one damage type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DotPreset {
    pub id: String,
    pub name: String,
    pub damage_type: DamageType,
    /// Fraction of the triggering hit dealt per tick
    pub damage_fraction: f64,
    pub turns: i32,
    #[serde(default)]
    pub max_stacks: Option<u32>,
    #[serde(default)]
    pub behavior: DotBehavior,
}

impl DotPreset {
    /// Build a DoT from a triggering hit of `damage`
    pub fn create(&self, damage: f64, source: Option<&EntityId>) -> DamageOverTime {
        let mut dot = DamageOverTime::new(
            self.id.clone(),
            self.name.clone(),
            (damage * self.damage_fraction) as i64,
            self.turns,
        )
        .with_behavior(self.behavior)
        .with_damage_type(self.damage_type);
        dot.source = source.cloned();
        dot.max_stacks = self.max_stacks;
        dot
    }
}

/// Factory entry for a HoT granted by a damage type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotPreset {
    pub id: String,
    pub name: String,
    pub damage_type: DamageType,
    pub healing: i64,
    pub turns: i32,
}

impl HotPreset {
    pub fn create(&self, source: Option<&EntityId>) -> HealingOverTime {
        let mut hot = HealingOverTime::new(
            self.id.clone(),
            self.name.clone(),
            self.healing,
            self.turns,
        );
        hot.source = source.cloned();
        hot
    }
}
