//! Diminishing returns - soft caps on newly added buffs
//!
//! A buff's scaling factor is taken once, from the target's current stat value
//! at the moment the buff is created. It is never re-derived afterwards, so
//! the order in which buffs are applied changes their potency.

use super::{StatEffect, Stats};
use crate::config::{ConfigError, CurveConfig, DiminishingConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Absorbs float error such as `(0.03 - 0.02) / 0.01 = 0.9999…`
const STEP_EPSILON: f64 = 1e-9;

/// One soft-cap class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoftCap {
    /// Values at or below this are uncapped
    pub offset: f64,
    /// Width of one step above the offset
    pub step: f64,
    /// Factor divisor per full step
    pub divisor: f64,
}

impl SoftCap {
    pub const fn new(offset: f64, step: f64, divisor: f64) -> Self {
        SoftCap {
            offset,
            step,
            divisor,
        }
    }

    /// Number of full steps `value` sits above the offset; 0 for a degenerate cap
    pub fn steps(&self, value: f64) -> u32 {
        if self.step <= 0.0 || value <= self.offset {
            return 0;
        }
        ((value - self.offset) / self.step + STEP_EPSILON).floor() as u32
    }

    /// Scaling factor for `value`, floored at `min_factor`
    pub fn factor(&self, value: f64, min_factor: f64) -> f64 {
        let steps = self.steps(value);
        if steps == 0 {
            return 1.0;
        }
        self.divisor.powi(-(steps.min(i32::MAX as u32) as i32)).max(min_factor)
    }
}

const HP_CAP: SoftCap = SoftCap::new(0.0, 500.0, 4.0);
const ATK_DEF_CAP: SoftCap = SoftCap::new(0.0, 100.0, 100.0);
const PERCENT_CAP: SoftCap = SoftCap::new(0.02, 0.01, 100.0);
const CRIT_DAMAGE_CAP: SoftCap = SoftCap::new(2.0, 5.0, 1000.0);
const DEFAULT_MIN_FACTOR: f64 = 1e-6;

fn default_cap(stat: &str) -> Option<SoftCap> {
    match stat {
        "max_hp" => Some(HP_CAP),
        "atk" | "defense" => Some(ATK_DEF_CAP),
        "crit_rate" | "mitigation" | "vitality" => Some(PERCENT_CAP),
        "crit_damage" => Some(CRIT_DAMAGE_CAP),
        _ => None,
    }
}

/// Scaling factor for a buff to `stat` on a target currently at `value`,
/// using the standard curves. Unconfigured stats are uncapped.
pub fn calculate_diminishing_returns(stat: &str, value: f64) -> f64 {
    default_cap(stat)
        .map(|cap| cap.factor(value, DEFAULT_MIN_FACTOR))
        .unwrap_or(1.0)
}

/// Per-stat soft caps
#[derive(Debug, Clone, PartialEq)]
pub struct DiminishingReturns {
    caps: BTreeMap<String, SoftCap>,
    min_factor: f64,
}

impl Default for DiminishingReturns {
    fn default() -> Self {
        let mut caps = BTreeMap::new();
        for stat in [
            "max_hp",
            "atk",
            "defense",
            "crit_rate",
            "mitigation",
            "vitality",
            "crit_damage",
        ] {
            if let Some(cap) = default_cap(stat) {
                caps.insert(stat.to_string(), cap);
            }
        }
        DiminishingReturns {
            caps,
            min_factor: DEFAULT_MIN_FACTOR,
        }
    }
}

impl DiminishingReturns {
    /// Build from configuration, rejecting curves that would divide by zero
    pub fn from_config(config: &DiminishingConfig) -> Result<Self, ConfigError> {
        let mut caps = BTreeMap::new();
        for CurveConfig {
            stats,
            offset,
            step,
            divisor,
        } in &config.curves
        {
            if *step <= 0.0 || *divisor < 1.0 {
                return Err(ConfigError::ValidationError(format!(
                    "invalid soft cap for {stats:?}: step {step}, divisor {divisor}"
                )));
            }
            for stat in stats {
                caps.insert(stat.clone(), SoftCap::new(*offset, *step, *divisor));
            }
        }
        Ok(DiminishingReturns {
            caps,
            min_factor: config.min_factor,
        })
    }

    /// A table with no soft caps at all
    pub fn uncapped() -> Self {
        DiminishingReturns {
            caps: BTreeMap::new(),
            min_factor: DEFAULT_MIN_FACTOR,
        }
    }

    pub fn cap(&self, stat: &str) -> Option<&SoftCap> {
        self.caps.get(stat)
    }

    /// Factor in (0, 1] for a buff to `stat` on a target currently at `value`
    pub fn factor(&self, stat: &str, value: f64) -> f64 {
        match self.caps.get(stat) {
            Some(cap) => cap.factor(value, self.min_factor),
            None => 1.0,
        }
    }

    /// Scale raw deltas and multipliers against `stats` as it is right now
    ///
    /// Every factor is evaluated before any part of the buff lands. A
    /// multiplier is scaled through its bonus: `1 + (m - 1) × factor`.
    pub fn scale(
        &self,
        stats: &Stats,
        deltas: &BTreeMap<String, f64>,
        multipliers: &BTreeMap<String, f64>,
        bypass: bool,
    ) -> (BTreeMap<String, f64>, BTreeMap<String, f64>) {
        if bypass {
            return (deltas.clone(), multipliers.clone());
        }
        let scaled_deltas = deltas
            .iter()
            .map(|(stat, value)| {
                let factor = self.factor(stat, stats.current(stat));
                (stat.clone(), value * factor)
            })
            .collect();
        let scaled_multipliers = multipliers
            .iter()
            .map(|(stat, mult)| {
                let factor = self.factor(stat, stats.current(stat));
                (stat.clone(), 1.0 + (mult - 1.0) * factor)
            })
            .collect();
        (scaled_deltas, scaled_multipliers)
    }

    /// Scale a raw effect into the bundle that will actually be applied
    pub fn scale_effect(&self, stats: &Stats, raw: &StatEffect, bypass: bool) -> StatEffect {
        let (stat_modifiers, multipliers) =
            self.scale(stats, &raw.stat_modifiers, &raw.multipliers, bypass);
        StatEffect {
            name: raw.name.clone(),
            stat_modifiers,
            multipliers,
            duration: raw.duration,
            source: raw.source.clone(),
        }
    }
}
