//! StatValue - The fold used for every derived stat (Base → Flat → More)

use serde::{Deserialize, Serialize};

/// Accumulates the contributions to a single stat
///
/// Final value is calculated as:
/// `(base + Σ flat) × Π more`
///
/// - `base`: The entity's base value
/// - `flat`: Already-scaled additive deltas, summed in the order they were added
/// - `more`: Already-scaled multiplicative factors (e.g. 1.3 for +30%)
///
/// Every reader of a current stat goes through this fold so the combination
/// order is identical everywhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatValue {
    pub base: f64,
    pub flat: f64,
    pub more: Vec<f64>,
}

impl StatValue {
    /// Create a new StatValue with the given base
    pub fn with_base(base: f64) -> Self {
        StatValue {
            base,
            flat: 0.0,
            more: Vec::new(),
        }
    }

    /// Calculate final value: (base + flat) × Π(more)
    pub fn compute(&self) -> f64 {
        self.total_flat() * self.total_more_multiplier()
    }

    /// Add a flat delta
    pub fn add_flat(&mut self, value: f64) {
        self.flat += value;
    }

    /// Add a multiplicative factor (e.g. 1.2 for 20% more)
    pub fn add_more(&mut self, factor: f64) {
        self.more.push(factor);
    }

    /// Reset to just the base value
    pub fn reset_to_base(&mut self) {
        self.flat = 0.0;
        self.more.clear();
    }

    /// Get the total flat value (base + flat additions)
    pub fn total_flat(&self) -> f64 {
        self.base + self.flat
    }

    /// Get the total more multiplier (product of all factors)
    pub fn total_more_multiplier(&self) -> f64 {
        self.more.iter().product()
    }
}
