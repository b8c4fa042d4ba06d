//! DamageOverTime - A live DoT instance on an entity

use super::DotBehavior;
use crate::types::{DamageType, EntityId};
use serde::{Deserialize, Serialize};

/// An active DoT instance owned by one effect manager
///
/// Instances sharing an `id` are stacks of the same effect; each ticks on
/// its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageOverTime {
    /// Stacking/lookup key (e.g. "blazing_torment")
    pub id: String,
    /// Display name
    pub name: String,
    /// Damage per tick, before the bearer's mitigation
    pub damage: i64,
    /// Remaining turns
    pub turns: i32,
    /// Entity that applied it, for identification only
    #[serde(default)]
    pub source: Option<EntityId>,
    #[serde(default)]
    pub max_stacks: Option<u32>,
    #[serde(default)]
    pub behavior: DotBehavior,
    #[serde(default)]
    pub damage_type: DamageType,
    /// Layer keys of the modifiers this DoT attached to its bearer
    #[serde(skip)]
    pub(crate) linked: Vec<u64>,
}

impl DamageOverTime {
    pub fn new(id: impl Into<String>, name: impl Into<String>, damage: i64, turns: i32) -> Self {
        DamageOverTime {
            id: id.into(),
            name: name.into(),
            damage,
            turns,
            source: None,
            max_stacks: None,
            behavior: DotBehavior::Plain,
            damage_type: DamageType::Generic,
            linked: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: &EntityId) -> Self {
        self.source = Some(source.clone());
        self
    }

    pub fn with_max_stacks(mut self, max_stacks: u32) -> Self {
        self.max_stacks = Some(max_stacks);
        self
    }

    pub fn with_behavior(mut self, behavior: DotBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_damage_type(mut self, damage_type: DamageType) -> Self {
        self.damage_type = damage_type;
        self
    }

    pub fn is_active(&self) -> bool {
        self.turns > 0
    }

    /// Consume one turn, returning whether the DoT survives
    pub fn consume_turn(&mut self) -> bool {
        self.turns -= 1;
        self.turns > 0
    }

    /// Fresh copy for spreading to another entity
    pub fn spread_copy(&self) -> DamageOverTime {
        DamageOverTime {
            turns: self.turns.max(1),
            linked: Vec::new(),
            ..self.clone()
        }
    }

    /// Total damage still to come, before mitigation
    pub fn total_remaining_damage(&self) -> i64 {
        self.damage * i64::from(self.turns.max(0))
    }
}
