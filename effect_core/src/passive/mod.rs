//! Passive abilities - event-triggered behaviour declared by id on an entity
//!
//! An entity lists passive ids in `Stats::passives`; duplicates are separate
//! instances and each one triggers. The registry maps ids to handlers and
//! dispatches combat events to them.

mod builtin;

pub use builtin::{
    AdvancedCombatSynergy, AttackUp, CarlyGuardiansAegis, GraygrayCounterMaestro,
    LunaLunarReservoir, PlayerLevelUpBonus, RoomHeal,
};

use crate::bus::{names, Event};
use crate::combatant::Combatant;
use crate::stat_block::Stats;
use crate::types::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Presentation hint for a passive's stack count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackDisplay {
    /// Single-charge toggle
    Spinner,
    /// Small bounded count
    Pips,
    /// Open-ended count
    Number,
}

impl StackDisplay {
    pub fn for_max_stacks(max_stacks: Option<u32>) -> Self {
        match max_stacks {
            Some(1) => StackDisplay::Spinner,
            Some(n) if n <= 5 => StackDisplay::Pips,
            _ => StackDisplay::Number,
        }
    }
}

/// Arguments that come with a triggering event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassiveContext {
    pub event: String,
    /// Attacker for `damage_taken`, target for `hit_landed`
    pub other: Option<EntityId>,
    pub amount: i64,
}

impl PassiveContext {
    pub fn new(event: impl Into<String>) -> Self {
        PassiveContext {
            event: event.into(),
            ..Default::default()
        }
    }

    pub fn with_other(mut self, other: Option<&EntityId>) -> Self {
        self.other = other.cloned();
        self
    }

    pub fn with_amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }

    pub fn from_event(event: &Event) -> Self {
        PassiveContext {
            event: event.name.clone(),
            other: event.other.clone(),
            amount: event.amount.unwrap_or(0),
        }
    }
}

/// A passive ability
pub trait Passive: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Events this passive reacts to
    fn triggers(&self) -> &[&'static str];

    /// None for open-ended stacks
    fn max_stacks(&self) -> Option<u32> {
        None
    }

    /// Live stack count; defaults to the number of held instances
    fn stacks(&self, stats: &Stats) -> i64 {
        stats.passive_count(self.id()) as i64
    }

    fn display(&self, _stats: &Stats) -> StackDisplay {
        StackDisplay::for_max_stacks(self.max_stacks())
    }

    /// Run one instance of the passive
    fn apply(&self, target: &mut Combatant, ctx: &PassiveContext);
}

/// Introspection record for one passive held by an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassiveDescription {
    pub id: String,
    pub name: String,
    pub stacks: i64,
    pub max_stacks: Option<u32>,
    pub display: StackDisplay,
}

/// Maps passive ids to their handlers
#[derive(Clone, Default)]
pub struct PassiveRegistry {
    passives: HashMap<String, Arc<dyn Passive>>,
}

impl std::fmt::Debug for PassiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.passives.keys().collect();
        ids.sort();
        f.debug_struct("PassiveRegistry").field("passives", &ids).finish()
    }
}

impl PassiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in passive
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(AttackUp);
        registry.register(RoomHeal);
        registry.register(LunaLunarReservoir);
        registry.register(GraygrayCounterMaestro);
        registry.register(PlayerLevelUpBonus);
        registry.register(CarlyGuardiansAegis);
        registry.register(AdvancedCombatSynergy);
        registry
    }

    /// Register a passive, replacing any with the same id
    pub fn register<P: Passive + 'static>(&mut self, passive: P) {
        self.passives
            .insert(passive.id().to_string(), Arc::new(passive));
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Passive>> {
        self.passives.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.passives.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.passives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passives.is_empty()
    }

    /// Every event name some registered passive reacts to
    pub fn trigger_events(&self) -> Vec<&'static str> {
        let mut events: Vec<&'static str> = self
            .passives
            .values()
            .flat_map(|p| p.triggers().iter().copied())
            .collect();
        events.sort_unstable();
        events.dedup();
        events
    }

    /// Run every held instance that reacts to `ctx.event`
    ///
    /// Returns the number of instances run. Unknown ids are skipped.
    pub fn trigger(&self, target: &mut Combatant, ctx: &PassiveContext) -> usize {
        if target.stats.passives.is_empty() {
            return 0;
        }
        let held = target.stats.passives.clone();
        let mut ran = 0;
        for id in &held {
            let Some(passive) = self.passives.get(id) else {
                continue;
            };
            if !passive.triggers().contains(&ctx.event.as_str()) {
                continue;
            }
            passive.apply(target, ctx);
            ran += 1;
        }
        if ran > 0 {
            debug!(entity = %target.id(), event = %ctx.event, ran, "triggered passives");
        }
        ran
    }

    pub fn trigger_event(&self, target: &mut Combatant, event: &Event) -> usize {
        self.trigger(target, &PassiveContext::from_event(event))
    }

    pub fn trigger_damage_taken(
        &self,
        target: &mut Combatant,
        attacker: Option<&EntityId>,
        damage: i64,
    ) -> usize {
        let ctx = PassiveContext::new(names::DAMAGE_TAKEN)
            .with_other(attacker)
            .with_amount(damage);
        self.trigger(target, &ctx)
    }

    pub fn trigger_hit_landed(
        &self,
        target: &mut Combatant,
        hit_target: Option<&EntityId>,
        damage: i64,
    ) -> usize {
        let ctx = PassiveContext::new(names::HIT_LANDED)
            .with_other(hit_target)
            .with_amount(damage);
        self.trigger(target, &ctx)
    }

    pub fn trigger_turn_end(&self, target: &mut Combatant) -> usize {
        self.trigger(target, &PassiveContext::new(names::TURN_END))
    }

    pub fn trigger_action_taken(&self, target: &mut Combatant) -> usize {
        self.trigger(target, &PassiveContext::new(names::ACTION_TAKEN))
    }

    pub fn trigger_level_up(&self, target: &mut Combatant, level: u32) -> usize {
        let ctx = PassiveContext::new(names::LEVEL_UP).with_amount(i64::from(level));
        self.trigger(target, &ctx)
    }

    /// One record per distinct passive id held, in first-held order
    pub fn describe(&self, stats: &Stats) -> Vec<PassiveDescription> {
        let mut seen: Vec<&str> = Vec::new();
        for id in &stats.passives {
            if !seen.contains(&id.as_str()) {
                seen.push(id);
            }
        }
        seen.into_iter()
            .map(|id| match self.passives.get(id) {
                Some(passive) => PassiveDescription {
                    id: id.to_string(),
                    name: passive.name().to_string(),
                    stacks: passive.stacks(stats),
                    max_stacks: passive.max_stacks(),
                    display: passive.display(stats),
                },
                None => PassiveDescription {
                    id: id.to_string(),
                    name: id.to_string(),
                    stacks: stats.passive_count(id) as i64,
                    max_stacks: None,
                    display: StackDisplay::Number,
                },
            })
            .collect()
    }
}
