//! Core identifier and element types shared across the engine

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a combatant (player, foe or summon)
///
/// Effects and summons refer to other entities only through this id, never
/// through a live reference, so a destroyed entity cannot leave anything
/// dangling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId(s)
    }
}

/// Elemental damage type carried by a combatant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    #[default]
    Generic,
    Fire,
    Ice,
    Lightning,
    Wind,
    Light,
    Dark,
}

impl DamageType {
    /// Get all damage types
    pub fn all() -> &'static [DamageType] {
        &[
            DamageType::Generic,
            DamageType::Fire,
            DamageType::Ice,
            DamageType::Lightning,
            DamageType::Wind,
            DamageType::Light,
            DamageType::Dark,
        ]
    }

    /// Pick a damage type uniformly at random
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> DamageType {
        *Self::all().choose(rng).unwrap_or(&DamageType::Generic)
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DamageType::Generic => "Generic",
            DamageType::Fire => "Fire",
            DamageType::Ice => "Ice",
            DamageType::Lightning => "Lightning",
            DamageType::Wind => "Wind",
            DamageType::Light => "Light",
            DamageType::Dark => "Dark",
        };
        f.write_str(name)
    }
}

/// Result of trying to attach a timed effect to an entity
///
/// Refusals are routine during concurrent battles, so they are values rather
/// than errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// Target hp was already at or below zero
    DeadTarget,
    /// Target already holds the maximum number of instances with this id
    StackLimit,
    /// Infliction roll failed, or the attacker's element has no effect
    Resisted,
}

impl AddOutcome {
    pub fn is_added(self) -> bool {
        self == AddOutcome::Added
    }
}
