//! StatEffect - A directly entity-owned bundle of stat changes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stats where a smaller value helps the bearer
pub const LOWER_IS_BETTER: &[&str] = &["damage_taken"];

/// Whether an additive change to `stat` helps the bearer
pub fn is_beneficial_delta(stat: &str, value: f64) -> bool {
    if LOWER_IS_BETTER.contains(&stat) {
        value < 0.0
    } else {
        value > 0.0
    }
}

/// Whether a multiplicative change to `stat` helps the bearer
pub fn is_beneficial_multiplier(stat: &str, value: f64) -> bool {
    if LOWER_IS_BETTER.contains(&stat) {
        value < 1.0
    } else {
        value > 1.0
    }
}

/// A temporary or permanent stat change owned by an entity
///
/// Values in `stat_modifiers` are additive and `multipliers` are factors
/// (1.3 = +30%). Neither is rescaled when read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatEffect {
    pub name: String,
    pub stat_modifiers: BTreeMap<String, f64>,
    #[serde(default)]
    pub multipliers: BTreeMap<String, f64>,
    /// Remaining turns; -1 for permanent effects (cards/relics)
    #[serde(default = "permanent")]
    pub duration: i32,
    pub source: String,
}

fn permanent() -> i32 {
    -1
}

impl StatEffect {
    /// Create a permanent, empty effect
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        StatEffect {
            name: name.into(),
            stat_modifiers: BTreeMap::new(),
            multipliers: BTreeMap::new(),
            duration: -1,
            source: source.into(),
        }
    }

    /// Add an additive change
    pub fn with_modifier(mut self, stat: impl Into<String>, value: f64) -> Self {
        self.stat_modifiers.insert(stat.into(), value);
        self
    }

    /// Add a multiplicative change
    pub fn with_multiplier(mut self, stat: impl Into<String>, factor: f64) -> Self {
        self.multipliers.insert(stat.into(), factor);
        self
    }

    /// Set the duration in turns
    pub fn with_duration(mut self, turns: i32) -> Self {
        self.duration = turns;
        self
    }

    pub fn is_permanent(&self) -> bool {
        self.duration < 0
    }

    pub fn is_expired(&self) -> bool {
        self.duration == 0
    }

    /// Reduce duration by one if temporary
    pub fn tick(&mut self) {
        if self.duration > 0 {
            self.duration -= 1;
        }
    }

    /// Additive contribution to `stat`
    pub fn delta(&self, stat: &str) -> f64 {
        self.stat_modifiers.get(stat).copied().unwrap_or(0.0)
    }

    /// Multiplicative contribution to `stat`
    pub fn factor(&self, stat: &str) -> f64 {
        self.multipliers.get(stat).copied().unwrap_or(1.0)
    }

    pub fn touches(&self, stat: &str) -> bool {
        self.stat_modifiers.contains_key(stat) || self.multipliers.contains_key(stat)
    }

    /// An effect is beneficial only if every one of its contributions is
    ///
    /// Empty effects are not beneficial.
    pub fn is_beneficial(&self) -> bool {
        if self.stat_modifiers.is_empty() && self.multipliers.is_empty() {
            return false;
        }
        self.stat_modifiers
            .iter()
            .all(|(stat, v)| is_beneficial_delta(stat, *v))
            && self
                .multipliers
                .iter()
                .all(|(stat, v)| is_beneficial_multiplier(stat, *v))
    }

    /// Copy with every contribution scaled by `multiplier`
    ///
    /// Deltas scale directly; factors scale their bonus part
    /// (`1 + (f - 1) × multiplier`).
    pub fn scaled(&self, multiplier: f64) -> StatEffect {
        StatEffect {
            name: self.name.clone(),
            stat_modifiers: self
                .stat_modifiers
                .iter()
                .map(|(k, v)| (k.clone(), v * multiplier))
                .collect(),
            multipliers: self
                .multipliers
                .iter()
                .map(|(k, v)| (k.clone(), 1.0 + (v - 1.0) * multiplier))
                .collect(),
            duration: self.duration,
            source: self.source.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_tick() {
        let mut effect = StatEffect::new("rally", "card").with_duration(2);
        effect.tick();
        assert_eq!(effect.duration, 1);
        assert!(!effect.is_expired());
        effect.tick();
        assert!(effect.is_expired());
    }

    #[test]
    fn test_permanent_never_expires() {
        let mut effect = StatEffect::new("relic", "relic");
        for _ in 0..10 {
            effect.tick();
        }
        assert!(effect.is_permanent());
        assert!(!effect.is_expired());
    }

    #[test]
    fn test_beneficial_requires_every_component() {
        let pure = StatEffect::new("a", "s").with_modifier("atk", 50.0);
        let mixed = StatEffect::new("b", "s")
            .with_modifier("atk", 100.0)
            .with_modifier("defense", -50.0);
        let shield = StatEffect::new("c", "s").with_modifier("damage_taken", -0.2);
        let weak_mult = StatEffect::new("d", "s").with_multiplier("atk", 0.8);

        assert!(pure.is_beneficial());
        assert!(!mixed.is_beneficial());
        assert!(shield.is_beneficial());
        assert!(!weak_mult.is_beneficial());
        assert!(!StatEffect::new("empty", "s").is_beneficial());
    }

    #[test]
    fn test_scaled_copy() {
        let effect = StatEffect::new("buff", "s")
            .with_modifier("atk", 40.0)
            .with_multiplier("defense", 1.5)
            .with_duration(3);
        let half = effect.scaled(0.5);
        assert!((half.delta("atk") - 20.0).abs() < 1e-9);
        assert!((half.factor("defense") - 1.25).abs() < 1e-9);
        assert_eq!(half.duration, 3);
    }
}
