//! Stats - The combat-relevant state of one entity
//!
//! Base values are only changed by permanent progression (levelling, explicit
//! `set_base_stat`). Everything timed lives on top of them as either a direct
//! [`StatEffect`] or a modifier layer owned by the entity's effect manager, and
//! current values are always folded on demand.

mod diminishing;
mod effect;
mod stat_value;

pub use diminishing::{calculate_diminishing_returns, DiminishingReturns, SoftCap};
pub use effect::{is_beneficial_delta, is_beneficial_multiplier, StatEffect, LOWER_IS_BETTER};
pub use stat_value::StatValue;

use crate::bus::{names, Event};
use crate::types::{DamageType, EntityId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const MAX_HP: &str = "max_hp";
pub const ATK: &str = "atk";
pub const DEFENSE: &str = "defense";
pub const CRIT_RATE: &str = "crit_rate";
pub const CRIT_DAMAGE: &str = "crit_damage";
pub const EFFECT_HIT_RATE: &str = "effect_hit_rate";
pub const MITIGATION: &str = "mitigation";
pub const REGAIN: &str = "regain";
pub const DODGE_ODDS: &str = "dodge_odds";
pub const EFFECT_RESISTANCE: &str = "effect_resistance";
pub const VITALITY: &str = "vitality";

/// Default base table for a fresh entity
pub const DEFAULT_BASE_STATS: &[(&str, f64)] = &[
    (MAX_HP, 1000.0),
    (ATK, 200.0),
    (DEFENSE, 200.0),
    (CRIT_RATE, 0.05),
    (CRIT_DAMAGE, 2.0),
    (EFFECT_HIT_RATE, 1.0),
    (MITIGATION, 1.0),
    (REGAIN, 100.0),
    (DODGE_ODDS, 0.05),
    (EFFECT_RESISTANCE, 0.05),
    (VITALITY, 1.0),
];

/// Share of overflow healing converted to shields once shields already exist
const OVERHEAL_SHIELD_RATE: f64 = 0.2;

/// Lower (and upper) bounds applied to derived values
fn clamp_stat(stat: &str, value: f64) -> f64 {
    match stat {
        CRIT_RATE | EFFECT_HIT_RATE | REGAIN | EFFECT_RESISTANCE => value.max(0.0),
        CRIT_DAMAGE => value.max(1.0),
        MITIGATION => value.max(0.1),
        VITALITY => value.max(0.01),
        DODGE_ODDS => value.clamp(0.0, 1.0),
        _ => value,
    }
}

/// Damage left after mitigation: at least 1 for any positive hit
pub fn mitigated_damage(amount: f64, mitigation: f64) -> i64 {
    if amount <= 0.0 {
        return 0;
    }
    let mitigation = mitigation.max(1e-6);
    ((amount / mitigation).floor() as i64).max(1)
}

/// An already-scaled contribution pushed by a stat modifier
///
/// Removing the layer removes exactly what was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierLayer {
    pub key: u64,
    /// Id of the modifier that owns this layer
    pub owner: String,
    pub effect: StatEffect,
}

/// Complete combat state for an entity (player, foe or summon)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    // === Identity ===
    pub id: EntityId,
    /// Role tag such as "player", "foe" or "summon"
    pub plugin_type: String,
    #[serde(default)]
    pub damage_type: DamageType,

    // === Progression ===
    pub hp: i64,
    pub level: u32,
    pub exp: i64,
    pub actions_per_turn: u32,
    #[serde(default)]
    pub level_up_gains: BTreeMap<String, f64>,

    // === Base values ===
    base: BTreeMap<String, f64>,

    // === Active contributions ===
    #[serde(default)]
    active_effects: Vec<StatEffect>,
    #[serde(default)]
    modifier_layers: Vec<ModifierLayer>,
    #[serde(default)]
    next_layer: u64,

    // === Labels ===
    #[serde(default)]
    pub dots: Vec<String>,
    #[serde(default)]
    pub hots: Vec<String>,
    #[serde(default)]
    pub mods: Vec<String>,
    #[serde(default)]
    pub passives: Vec<String>,
    /// Live passive counters (charge, stacks, …) keyed by passive id
    #[serde(default)]
    passive_state: BTreeMap<String, i64>,

    // === Runtime tracking ===
    #[serde(default)]
    pub shields: i64,
    #[serde(default)]
    pub overheal_enabled: bool,
    #[serde(default)]
    pub total_damage_taken: i64,
    #[serde(default)]
    pub last_damage_taken: i64,

    /// Events queued while the entity is borrowed, published by the owner
    #[serde(skip)]
    outbox: Vec<Event>,
    #[serde(skip)]
    curves: Arc<DiminishingReturns>,
}

impl Stats {
    /// Create an entity with the default base table and full hp
    pub fn new(id: impl Into<EntityId>) -> Self {
        let base: BTreeMap<String, f64> = DEFAULT_BASE_STATS
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        let level_up_gains = [(MAX_HP, 10.0), (ATK, 5.0), (DEFENSE, 3.0)]
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        let mut stats = Stats {
            id: id.into(),
            plugin_type: "player".to_string(),
            damage_type: DamageType::Generic,
            hp: 0,
            level: 1,
            exp: 0,
            actions_per_turn: 1,
            level_up_gains,
            base,
            active_effects: Vec::new(),
            modifier_layers: Vec::new(),
            next_layer: 0,
            dots: Vec::new(),
            hots: Vec::new(),
            mods: Vec::new(),
            passives: Vec::new(),
            passive_state: BTreeMap::new(),
            shields: 0,
            overheal_enabled: false,
            total_damage_taken: 0,
            last_damage_taken: 0,
            outbox: Vec::new(),
            curves: Arc::new(DiminishingReturns::default()),
        };
        stats.hp = stats.max_hp();
        stats
    }

    /// Builder: set a base stat
    pub fn with_base(mut self, stat: &str, value: f64) -> Self {
        self.set_base_stat(stat, value);
        if stat == MAX_HP {
            self.hp = self.max_hp();
        }
        self
    }

    pub fn with_plugin_type(mut self, plugin_type: impl Into<String>) -> Self {
        self.plugin_type = plugin_type.into();
        self
    }

    pub fn with_damage_type(mut self, damage_type: DamageType) -> Self {
        self.damage_type = damage_type;
        self
    }

    pub fn with_passives(mut self, passives: &[&str]) -> Self {
        self.passives = passives.iter().map(|p| p.to_string()).collect();
        self
    }

    // === Base stats ===

    /// Base value of a stat, 0 if the entity has none
    pub fn base_stat(&self, stat: &str) -> f64 {
        self.base.get(stat).copied().unwrap_or(0.0)
    }

    pub fn set_base_stat(&mut self, stat: &str, value: f64) {
        self.base.insert(stat.to_string(), value);
    }

    pub fn modify_base_stat(&mut self, stat: &str, amount: f64) {
        *self.base.entry(stat.to_string()).or_insert(0.0) += amount;
    }

    pub fn base_stats(&self) -> &BTreeMap<String, f64> {
        &self.base
    }

    // === Derived stats ===

    /// Current value of `stat`: base, then every delta, then every factor
    pub fn current(&self, stat: &str) -> f64 {
        let mut value = StatValue::with_base(self.base_stat(stat));
        let contributions = self
            .active_effects
            .iter()
            .chain(self.modifier_layers.iter().map(|layer| &layer.effect));
        for effect in contributions {
            if let Some(delta) = effect.stat_modifiers.get(stat) {
                value.add_flat(*delta);
            }
            if let Some(factor) = effect.multipliers.get(stat) {
                value.add_more(*factor);
            }
        }
        clamp_stat(stat, value.compute())
    }

    pub fn max_hp(&self) -> i64 {
        self.current(MAX_HP) as i64
    }

    pub fn atk(&self) -> i64 {
        self.current(ATK) as i64
    }

    pub fn defense(&self) -> i64 {
        self.current(DEFENSE) as i64
    }

    pub fn crit_rate(&self) -> f64 {
        self.current(CRIT_RATE)
    }

    pub fn crit_damage(&self) -> f64 {
        self.current(CRIT_DAMAGE)
    }

    pub fn effect_hit_rate(&self) -> f64 {
        self.current(EFFECT_HIT_RATE)
    }

    pub fn effect_resistance(&self) -> f64 {
        self.current(EFFECT_RESISTANCE)
    }

    pub fn mitigation(&self) -> f64 {
        self.current(MITIGATION)
    }

    pub fn vitality(&self) -> f64 {
        self.current(VITALITY)
    }

    pub fn regain(&self) -> i64 {
        self.current(REGAIN) as i64
    }

    pub fn dodge_odds(&self) -> f64 {
        self.current(DODGE_ODDS)
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn effective_hp(&self) -> i64 {
        self.hp + self.shields
    }

    // === Diminishing returns ===

    pub fn curves(&self) -> &DiminishingReturns {
        &self.curves
    }

    pub fn set_curves(&mut self, curves: Arc<DiminishingReturns>) {
        self.curves = curves;
    }

    pub(crate) fn shared_curves(&self) -> Arc<DiminishingReturns> {
        Arc::clone(&self.curves)
    }

    // === Direct stat effects ===

    /// Add an effect, replacing any existing effect with the same name
    pub fn add_effect(&mut self, effect: StatEffect) {
        self.remove_effect_by_name(&effect.name);
        tracing::debug!(entity = %self.id, effect = %effect.name, "added stat effect");
        self.active_effects.push(effect);
    }

    pub fn remove_effect_by_name(&mut self, name: &str) -> bool {
        let before = self.active_effects.len();
        self.active_effects.retain(|e| e.name != name);
        before != self.active_effects.len()
    }

    /// Remove every effect from `source`, returning how many went
    pub fn remove_effect_by_source(&mut self, source: &str) -> usize {
        let before = self.active_effects.len();
        self.active_effects.retain(|e| e.source != source);
        before - self.active_effects.len()
    }

    /// Advance every temporary effect one turn and drop the expired ones
    pub fn tick_effects(&mut self) {
        for effect in &mut self.active_effects {
            effect.tick();
        }
        self.active_effects.retain(|e| !e.is_expired());
    }

    pub fn active_effects(&self) -> &[StatEffect] {
        &self.active_effects
    }

    pub fn find_effect(&self, name: &str) -> Option<&StatEffect> {
        self.active_effects.iter().find(|e| e.name == name)
    }

    pub fn clear_all_effects(&mut self) {
        self.active_effects.clear();
    }

    // === Modifier layers ===

    /// Push an already-scaled contribution, returning its removal key
    pub(crate) fn push_layer(&mut self, owner: &str, effect: StatEffect) -> u64 {
        let key = self.next_layer;
        self.next_layer += 1;
        self.modifier_layers.push(ModifierLayer {
            key,
            owner: owner.to_string(),
            effect,
        });
        key
    }

    pub(crate) fn remove_layer(&mut self, key: u64) -> Option<StatEffect> {
        let pos = self.modifier_layers.iter().position(|l| l.key == key)?;
        Some(self.modifier_layers.remove(pos).effect)
    }

    pub fn modifier_layers(&self) -> &[ModifierLayer] {
        &self.modifier_layers
    }

    // === Passive counters ===

    pub fn passive_counter(&self, passive: &str) -> i64 {
        self.passive_state.get(passive).copied().unwrap_or(0)
    }

    pub fn set_passive_counter(&mut self, passive: &str, value: i64) {
        self.passive_state.insert(passive.to_string(), value);
    }

    /// Add to a counter and return the new value
    pub fn add_passive_counter(&mut self, passive: &str, delta: i64) -> i64 {
        let counter = self.passive_state.entry(passive.to_string()).or_insert(0);
        *counter += delta;
        *counter
    }

    pub fn passive_counters(&self) -> &BTreeMap<String, i64> {
        &self.passive_state
    }

    /// Number of instances of `passive` the entity holds
    pub fn passive_count(&self, passive: &str) -> usize {
        self.passives.iter().filter(|p| *p == passive).count()
    }

    // === Events ===

    pub(crate) fn queue(&mut self, event: Event) {
        self.outbox.push(event);
    }

    /// Drain every event queued since the last call
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }

    pub fn pending_events(&self) -> &[Event] {
        &self.outbox
    }

    // === Damage and healing ===

    /// Apply incoming damage after mitigation, returning the damage dealt
    ///
    /// Shields absorb first; hp never drops below 0. Dead entities take
    /// nothing and queue nothing.
    pub fn apply_damage(&mut self, amount: f64, attacker: Option<&EntityId>) -> i64 {
        if !self.is_alive() {
            return 0;
        }
        let dealt = mitigated_damage(amount, self.mitigation());
        self.absorb_damage(dealt, attacker)
    }

    /// Apply damage that has already been mitigated
    pub(crate) fn absorb_damage(&mut self, dealt: i64, attacker: Option<&EntityId>) -> i64 {
        if !self.is_alive() || dealt <= 0 {
            return 0;
        }
        self.last_damage_taken = dealt;
        self.total_damage_taken += dealt;

        let mut remaining = dealt;
        if self.shields > 0 {
            let absorbed = remaining.min(self.shields);
            self.shields -= absorbed;
            remaining -= absorbed;
        }
        if remaining > 0 {
            self.hp = (self.hp - remaining).max(0);
        }

        self.queue(
            Event::new(names::DAMAGE_TAKEN)
                .for_entity(&self.id)
                .with_other(attacker)
                .with_amount(dealt),
        );
        dealt
    }

    /// Heal, scaled by vitality, returning the hp and shields actually gained
    ///
    /// Without overheal hp is capped at max hp. With overheal the excess
    /// becomes shields: in full if there are none yet, otherwise at 20%.
    pub fn apply_healing(&mut self, amount: f64, healer: Option<&EntityId>) -> i64 {
        if !self.is_alive() || amount <= 0.0 {
            return 0;
        }
        let mut heal = (amount * self.vitality()) as i64;
        let max_hp = self.max_hp();
        let before = self.hp + self.shields;

        if self.overheal_enabled {
            if self.hp < max_hp {
                let normal = heal.min(max_hp - self.hp);
                self.hp += normal;
                heal -= normal;
            }
            if heal > 0 {
                if self.shields <= 0 {
                    self.shields += heal;
                } else {
                    self.shields += (heal as f64 * OVERHEAL_SHIELD_RATE) as i64;
                }
            }
        } else {
            self.hp = (self.hp + heal).min(max_hp).max(self.hp);
        }

        let applied = self.hp + self.shields - before;
        self.queue(
            Event::new(names::HEAL_RECEIVED)
                .for_entity(&self.id)
                .with_other(healer)
                .with_amount(applied),
        );
        applied
    }

    pub fn enable_overheal(&mut self) {
        self.overheal_enabled = true;
    }

    /// Turn overheal off and drop any shields
    pub fn disable_overheal(&mut self) {
        self.overheal_enabled = false;
        self.shields = 0;
    }

    // === Levelling ===

    pub fn exp_to_level(&self) -> i64 {
        2_i64.saturating_pow(self.level) * 50
    }

    /// Gain experience (scaled by vitality), levelling up as often as it allows
    pub fn gain_exp(&mut self, amount: i64) -> u32 {
        self.exp += (amount as f64 * self.vitality()) as i64;
        let mut gained = 0;
        while self.exp >= self.exp_to_level() {
            self.exp -= self.exp_to_level();
            self.level += 1;
            gained += 1;
            self.on_level_up();
        }
        gained
    }

    fn on_level_up(&mut self) {
        let level = f64::from(self.level);
        let gains: Vec<(String, f64)> = self
            .level_up_gains
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        for (stat, gain) in gains {
            self.modify_base_stat(&stat, gain * level);
        }
        self.hp = self.max_hp();
        self.queue(
            Event::new(names::LEVEL_UP)
                .for_entity(&self.id)
                .with_amount(i64::from(self.level)),
        );
    }
}
