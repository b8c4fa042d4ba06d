//! StatModifier - Timed, reversible stat buffs and debuffs

use crate::stat_block::{StatEffect, Stats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Suffix marking a multiplier in [`create_stat_buff`] arguments
const MULT_SUFFIX: &str = "_mult";

/// What a modifier actually pushed onto its target
#[derive(Debug, Clone, PartialEq)]
struct Applied {
    key: u64,
    effect: StatEffect,
}

/// A named, timed bundle of additive deltas and multiplicative factors
///
/// Scaling against diminishing returns happens once, in [`apply`](Self::apply),
/// from the target's values just before the buff lands. The scaled result is
/// kept so [`remove`](Self::remove) takes away exactly what was added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatModifier {
    pub id: String,
    pub name: String,
    pub turns: i32,
    #[serde(default)]
    pub deltas: BTreeMap<String, f64>,
    #[serde(default)]
    pub multipliers: BTreeMap<String, f64>,
    #[serde(default)]
    pub bypass_diminishing: bool,
    #[serde(skip)]
    applied: Option<Applied>,
}

impl StatModifier {
    pub fn new(id: impl Into<String>, name: impl Into<String>, turns: i32) -> Self {
        StatModifier {
            id: id.into(),
            name: name.into(),
            turns,
            deltas: BTreeMap::new(),
            multipliers: BTreeMap::new(),
            bypass_diminishing: false,
            applied: None,
        }
    }

    pub fn with_delta(mut self, stat: impl Into<String>, value: f64) -> Self {
        self.deltas.insert(stat.into(), value);
        self
    }

    pub fn with_multiplier(mut self, stat: impl Into<String>, factor: f64) -> Self {
        self.multipliers.insert(stat.into(), factor);
        self
    }

    /// Skip diminishing returns (guaranteed mechanics such as %-of-max-hp shields)
    pub fn bypassing_diminishing(mut self) -> Self {
        self.bypass_diminishing = true;
        self
    }

    /// Scale against `stats` and push the result. Applying twice is a no-op.
    pub fn apply(&mut self, stats: &mut Stats) -> bool {
        if self.applied.is_some() {
            return false;
        }
        let scaled = stats
            .curves()
            .scale_effect(stats, &self.to_effect(), self.bypass_diminishing);
        let key = stats.push_layer(&self.id, scaled.clone());
        tracing::debug!(
            entity = %stats.id,
            modifier = %self.id,
            deltas = ?scaled.stat_modifiers,
            multipliers = ?scaled.multipliers,
            "applied stat modifier"
        );
        self.applied = Some(Applied {
            key,
            effect: scaled,
        });
        true
    }

    /// Take back exactly what `apply` pushed
    pub fn remove(&mut self, stats: &mut Stats) -> bool {
        match self.applied.take() {
            Some(applied) => stats.remove_layer(applied.key).is_some(),
            None => false,
        }
    }

    /// Consume one turn; expired modifiers remove themselves
    pub fn tick(&mut self, stats: &mut Stats) -> bool {
        self.turns -= 1;
        if self.turns <= 0 {
            self.remove(stats);
            return false;
        }
        true
    }

    pub fn is_applied(&self) -> bool {
        self.applied.is_some()
    }

    pub fn layer_key(&self) -> Option<u64> {
        self.applied.as_ref().map(|a| a.key)
    }

    /// The scaled contributions currently on the target
    pub fn applied_effect(&self) -> Option<&StatEffect> {
        self.applied.as_ref().map(|a| &a.effect)
    }

    /// The raw, unscaled bundle as a stat effect
    pub fn to_effect(&self) -> StatEffect {
        StatEffect {
            name: self.name.clone(),
            stat_modifiers: self.deltas.clone(),
            multipliers: self.multipliers.clone(),
            duration: self.turns,
            source: self.id.clone(),
        }
    }

    pub fn is_beneficial(&self) -> bool {
        self.to_effect().is_beneficial()
    }
}

/// Build a modifier from `(stat, value)` pairs and apply it to `stats`
///
/// Keys ending in `_mult` are multipliers for the stat without the suffix;
/// everything else is an additive delta. An empty `id` falls back to `name`.
pub fn create_stat_buff(
    stats: &mut Stats,
    name: &str,
    id: &str,
    turns: i32,
    modifiers: &[(&str, f64)],
) -> StatModifier {
    let id = if id.is_empty() { name } else { id };
    let mut modifier = StatModifier::new(id, name, turns);
    for (key, value) in modifiers {
        match key.strip_suffix(MULT_SUFFIX) {
            Some(stat) => {
                modifier.multipliers.insert(stat.to_string(), *value);
            }
            None => {
                modifier.deltas.insert(key.to_string(), *value);
            }
        }
    }
    modifier.apply(stats);
    modifier
}
