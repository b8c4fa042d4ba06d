//! Combatant - an entity's stats together with its effect manager
//!
//! Combatants are shared between the battle loop, bus handlers and the summon
//! manager as [`SharedCombatant`]. Handlers lock, mutate, then publish the
//! entity's queued events only after the lock is released.

use crate::config::EffectConfig;
use crate::dot::DamageOverTime;
use crate::effects::{EffectManager, HealingOverTime, StatModifier, TickReport};
use crate::stat_block::{DiminishingReturns, StatEffect, Stats};
use crate::types::{AddOutcome, DamageType, EntityId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type SharedCombatant = Arc<Mutex<Combatant>>;

/// Lock a shared combatant, recovering from a poisoned lock
pub fn lock(combatant: &SharedCombatant) -> MutexGuard<'_, Combatant> {
    combatant.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Summon bookkeeping carried by summoned entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummonInfo {
    pub summoner_id: EntityId,
    pub summon_type: String,
    pub summon_source: String,
    pub is_temporary: bool,
    /// -1 for permanent summons
    pub turns_remaining: i32,
}

impl SummonInfo {
    /// Count down one turn; false once a limited summon has run out
    pub fn tick_turn(&mut self) -> bool {
        if self.turns_remaining > 0 {
            self.turns_remaining -= 1;
            return self.turns_remaining > 0;
        }
        true
    }

    pub fn is_expired(&self) -> bool {
        self.turns_remaining == 0
    }
}

/// One entity in battle
#[derive(Debug, Clone)]
pub struct Combatant {
    pub stats: Stats,
    pub effects: EffectManager,
    pub summon: Option<SummonInfo>,
}

impl Combatant {
    pub fn new(stats: Stats) -> Self {
        Combatant {
            stats,
            effects: EffectManager::new(),
            summon: None,
        }
    }

    pub fn with_effects(mut self, effects: EffectManager) -> Self {
        self.effects = effects;
        self
    }

    pub fn shared(self) -> SharedCombatant {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> &EntityId {
        &self.stats.id
    }

    pub fn is_summon(&self) -> bool {
        self.summon.is_some()
    }

    pub fn add_dot(&mut self, dot: DamageOverTime, max_stacks: Option<u32>) -> AddOutcome {
        self.effects.add_dot(&mut self.stats, dot, max_stacks)
    }

    pub fn add_hot(&mut self, hot: HealingOverTime) -> AddOutcome {
        self.effects.add_hot(&mut self.stats, hot)
    }

    pub fn add_modifier(&mut self, modifier: StatModifier) -> AddOutcome {
        self.effects.add_modifier(&mut self.stats, modifier)
    }

    pub fn remove_modifier(&mut self, id: &str) -> usize {
        self.effects.remove_modifier(&mut self.stats, id)
    }

    pub fn tick(&mut self, others: &mut [&mut Combatant]) -> TickReport {
        self.effects.tick(&mut self.stats, others)
    }

    pub fn on_action<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        self.effects.on_action(&mut self.stats, rng)
    }

    /// Cancel every pending timed effect
    pub fn cleanup(&mut self) {
        self.effects.cleanup(&mut self.stats);
    }

    /// Field-level persistence record
    pub fn snapshot(&self) -> EntitySnapshot {
        let stats = &self.stats;
        EntitySnapshot {
            id: stats.id.clone(),
            plugin_type: stats.plugin_type.clone(),
            damage_type: stats.damage_type,
            hp: stats.hp,
            level: stats.level,
            exp: stats.exp,
            shields: stats.shields,
            overheal_enabled: stats.overheal_enabled,
            base_stats: stats.base_stats().clone(),
            passives: stats.passives.clone(),
            passive_counters: stats.passive_counters().clone(),
            effects: stats.active_effects().to_vec(),
            dots: self.effects.dots().to_vec(),
            hots: self.effects.hots().to_vec(),
            modifiers: self
                .effects
                .mods()
                .iter()
                .filter_map(ModifierDescriptor::from_modifier)
                .collect(),
            summon: self.summon.clone(),
        }
    }

    /// Rebuild a combatant with the default curves and effect settings
    pub fn restore(snapshot: EntitySnapshot) -> Combatant {
        Self::restore_with(
            snapshot,
            Arc::new(DiminishingReturns::default()),
            &EffectConfig::default(),
        )
    }

    /// Rebuild a combatant whose derived stats match the snapshot exactly
    ///
    /// `curves` must be the ones the snapshot was taken under; effects are
    /// re-applied through them.
    pub fn restore_with(
        snapshot: EntitySnapshot,
        curves: Arc<DiminishingReturns>,
        config: &EffectConfig,
    ) -> Combatant {
        let mut stats = Stats::new(snapshot.id)
            .with_plugin_type(snapshot.plugin_type)
            .with_damage_type(snapshot.damage_type);
        stats.set_curves(curves);
        for (stat, value) in &snapshot.base_stats {
            stats.set_base_stat(stat, *value);
        }
        stats.level = snapshot.level;
        stats.exp = snapshot.exp;
        stats.shields = snapshot.shields;
        stats.overheal_enabled = snapshot.overheal_enabled;
        stats.passives = snapshot.passives;
        for (passive, value) in &snapshot.passive_counters {
            stats.set_passive_counter(passive, *value);
        }
        for effect in snapshot.effects {
            stats.add_effect(effect);
        }

        let mut effects = EffectManager::with_config(config);
        for dot in snapshot.dots {
            effects.push_dot(&mut stats, dot);
        }
        for hot in snapshot.hots {
            effects.push_hot(&mut stats, hot);
        }
        for descriptor in snapshot.modifiers {
            effects.add_modifier(&mut stats, descriptor.into_modifier());
        }
        stats.hp = snapshot.hp;

        Combatant {
            stats,
            effects,
            summon: snapshot.summon,
        }
    }
}

/// A modifier as persisted: its contributions as they were applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierDescriptor {
    pub id: String,
    pub name: String,
    pub turns: i32,
    #[serde(default)]
    pub deltas: BTreeMap<String, f64>,
    #[serde(default)]
    pub multipliers: BTreeMap<String, f64>,
}

impl ModifierDescriptor {
    fn from_modifier(modifier: &StatModifier) -> Option<Self> {
        let applied: &StatEffect = modifier.applied_effect()?;
        Some(ModifierDescriptor {
            id: modifier.id.clone(),
            name: modifier.name.clone(),
            turns: modifier.turns,
            deltas: applied.stat_modifiers.clone(),
            multipliers: applied.multipliers.clone(),
        })
    }

    /// Already scaled, so it is re-applied without diminishing returns
    fn into_modifier(self) -> StatModifier {
        let mut modifier = StatModifier::new(self.id, self.name, self.turns).bypassing_diminishing();
        modifier.deltas = self.deltas;
        modifier.multipliers = self.multipliers;
        modifier
    }
}

/// Flat, serialisable record of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub plugin_type: String,
    #[serde(default)]
    pub damage_type: DamageType,
    pub hp: i64,
    pub level: u32,
    pub exp: i64,
    #[serde(default)]
    pub shields: i64,
    #[serde(default)]
    pub overheal_enabled: bool,
    pub base_stats: BTreeMap<String, f64>,
    #[serde(default)]
    pub passives: Vec<String>,
    #[serde(default)]
    pub passive_counters: BTreeMap<String, i64>,
    #[serde(default)]
    pub effects: Vec<StatEffect>,
    #[serde(default)]
    pub dots: Vec<DamageOverTime>,
    #[serde(default)]
    pub hots: Vec<HealingOverTime>,
    #[serde(default)]
    pub modifiers: Vec<ModifierDescriptor>,
    #[serde(default)]
    pub summon: Option<SummonInfo>,
}

/// The current roster of one side
#[derive(Debug, Clone, Default)]
pub struct Party {
    pub members: Vec<SharedCombatant>,
}

impl Party {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_members(members: Vec<SharedCombatant>) -> Self {
        Party { members }
    }

    pub fn push(&mut self, member: SharedCombatant) {
        self.members.push(member);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.members.iter().map(|m| lock(m).id().clone()).collect()
    }

    pub fn find(&self, id: &EntityId) -> Option<SharedCombatant> {
        self.members
            .iter()
            .find(|m| lock(m).id() == id)
            .cloned()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.find(id).is_some()
    }

    pub fn contains_member(&self, member: &SharedCombatant) -> bool {
        self.members.iter().any(|m| Arc::ptr_eq(m, member))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dot::DotBehavior;
    use crate::stat_block::{ATK, CRIT_RATE, DEFENSE, MAX_HP};

    #[test]
    fn test_snapshot_round_trip_preserves_derived_stats() {
        let mut hero = Combatant::new(Stats::new("hero").with_passives(&["attack_up"]));
        hero.stats
            .add_effect(StatEffect::new("relic", "relic").with_modifier(DEFENSE, 15.0));
        hero.add_modifier(StatModifier::new("rage", "Rage", 3).with_multiplier(ATK, 2.0));
        hero.add_modifier(StatModifier::new("focus", "Focus", 2).with_delta(CRIT_RATE, 0.5));
        hero.add_dot(
            DamageOverTime::new("blazing_torment", "Blazing Torment", 12, 2)
                .with_behavior(DotBehavior::BlazingTorment),
            None,
        );
        hero.add_hot(HealingOverTime::new("regen", "Regen", 5, 4));
        hero.stats.hp = 640;
        hero.stats.set_passive_counter("attack_up", 2);

        let json = serde_json::to_string(&hero.snapshot()).unwrap();
        let restored = Combatant::restore(serde_json::from_str(&json).unwrap());

        for stat in [ATK, DEFENSE, CRIT_RATE, MAX_HP] {
            assert_eq!(restored.stats.current(stat), hero.stats.current(stat), "{stat}");
        }
        assert_eq!(restored.stats.hp, 640);
        assert_eq!(restored.stats.dots, hero.stats.dots);
        assert_eq!(restored.stats.hots, hero.stats.hots);
        assert_eq!(restored.stats.mods, hero.stats.mods);
        assert_eq!(restored.stats.passive_counter("attack_up"), 2);
        assert_eq!(restored.effects.dots()[0].behavior, DotBehavior::BlazingTorment);
    }

    #[test]
    fn test_party_lookup() {
        let a = Combatant::new(Stats::new("a")).shared();
        let b = Combatant::new(Stats::new("b")).shared();
        let party = Party::from_members(vec![Arc::clone(&a), b]);

        assert_eq!(party.len(), 2);
        assert!(party.contains(&EntityId::from("b")));
        assert!(!party.contains(&EntityId::from("c")));
        assert!(party.contains_member(&a));
        assert_eq!(party.ids(), vec![EntityId::from("a"), EntityId::from("b")]);
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let shared = Combatant::new(Stats::new("a")).shared();
        let clone = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(shared.is_poisoned());
        assert_eq!(lock(&shared).id().as_str(), "a");
    }
}
