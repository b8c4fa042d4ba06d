//! Event payloads carried on the bus

use crate::types::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known event names
pub mod names {
    pub const BATTLE_START: &str = "battle_start";
    pub const BATTLE_END: &str = "battle_end";
    pub const TURN_START: &str = "turn_start";
    pub const TURN_END: &str = "turn_end";
    pub const ACTION_TAKEN: &str = "action_taken";
    pub const HIT_LANDED: &str = "hit_landed";
    pub const DAMAGE_TAKEN: &str = "damage_taken";
    pub const HEAL_RECEIVED: &str = "heal_received";
    pub const ENTITY_DEFEAT: &str = "entity_defeat";
    pub const ENTITY_KILLED: &str = "entity_killed";
    pub const ULTIMATE_USED: &str = "ultimate_used";
    pub const LEVEL_UP: &str = "level_up";
    pub const SUMMON_CREATED: &str = "summon_created";
    pub const SUMMON_REMOVED: &str = "summon_removed";
    pub const SUMMON_DEFEATED: &str = "summon_defeated";
    pub const CRITICAL_BOOST_CHANGE: &str = "critical_boost_change";
    pub const COUNTER_ATTACK: &str = "counter_attack";
    pub const DOT_SPREAD: &str = "dot_spread";
}

/// One emission: a name plus the entities and values involved
///
/// `entity` is the subject (the one taking damage, starting a turn, …) and
/// `other` the counterpart (attacker, healer, summoner) when there is one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    #[serde(default)]
    pub entity: Option<EntityId>,
    #[serde(default)]
    pub other: Option<EntityId>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub detail: Map<String, Value>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Event {
            name: name.into(),
            entity: None,
            other: None,
            amount: None,
            detail: Map::new(),
        }
    }

    pub fn for_entity(mut self, entity: &EntityId) -> Self {
        self.entity = Some(entity.clone());
        self
    }

    pub fn with_other(mut self, other: Option<&EntityId>) -> Self {
        self.other = other.cloned();
        self
    }

    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.detail.insert(key.to_string(), value.into());
        self
    }

    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.detail.get(key).and_then(Value::as_str)
    }

    pub fn detail_f64(&self, key: &str) -> Option<f64> {
        self.detail.get(key).and_then(Value::as_f64)
    }

    pub fn detail_i64(&self, key: &str) -> Option<i64> {
        self.detail.get(key).and_then(Value::as_i64)
    }

    /// True when `id` is this event's subject
    pub fn is_about(&self, id: &EntityId) -> bool {
        self.entity.as_ref() == Some(id)
    }
}
