//! HealingOverTime - A live HoT instance on an entity

use crate::stat_block::Stats;
use crate::types::EntityId;
use serde::{Deserialize, Serialize};

/// An active HoT instance. HoTs have no inherent stack cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingOverTime {
    pub id: String,
    pub name: String,
    /// Healing per tick, before the bearer's vitality
    pub healing: i64,
    pub turns: i32,
    #[serde(default)]
    pub source: Option<EntityId>,
}

impl HealingOverTime {
    pub fn new(id: impl Into<String>, name: impl Into<String>, healing: i64, turns: i32) -> Self {
        HealingOverTime {
            id: id.into(),
            name: name.into(),
            healing,
            turns,
            source: None,
        }
    }

    pub fn with_source(mut self, source: &EntityId) -> Self {
        self.source = Some(source.clone());
        self
    }

    /// Heal the bearer, then consume a turn. Returns (healed, survives).
    pub fn tick(&mut self, stats: &mut Stats) -> (i64, bool) {
        let healed = stats.apply_healing(self.healing as f64, self.source.as_ref());
        self.turns -= 1;
        (healed, self.turns > 0)
    }

    /// Copy with healing scaled by `multiplier`
    pub fn scaled(&self, multiplier: f64) -> HealingOverTime {
        HealingOverTime {
            healing: (self.healing as f64 * multiplier) as i64,
            ..self.clone()
        }
    }
}
