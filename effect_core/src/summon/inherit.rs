//! What a summon takes from its summoner

use crate::combatant::Combatant;
use crate::effects::{HealingOverTime, StatModifier};
use crate::stat_block::{
    StatEffect, Stats, ATK, CRIT_DAMAGE, CRIT_RATE, DEFENSE, EFFECT_HIT_RATE, EFFECT_RESISTANCE,
    MAX_HP, MITIGATION, VITALITY,
};
use tracing::debug;

/// Base stats a summon derives from its summoner
pub const INHERITED_STATS: &[&str] = &[
    MAX_HP,
    ATK,
    DEFENSE,
    CRIT_RATE,
    CRIT_DAMAGE,
    EFFECT_HIT_RATE,
    EFFECT_RESISTANCE,
    MITIGATION,
    VITALITY,
];

/// Passive ids containing any of these are copied onto summons
pub const SHAREABLE_PASSIVES: &[&str] = &["critical_boost", "elemental_affinity"];

const PREFIX: &str = "summon_";

/// Summon base stats from the summoner's base values (never its buffed ones)
pub fn scaled_base_stats(summoner: &Stats, multiplier: f64) -> Vec<(&'static str, f64)> {
    INHERITED_STATS
        .iter()
        .map(|stat| {
            let base = summoner.base_stat(stat);
            let value = match *stat {
                MAX_HP | ATK | DEFENSE => (base * multiplier).floor(),
                _ => base * multiplier,
            };
            (*stat, value)
        })
        .collect()
}

pub fn shareable_passives(passives: &[String]) -> Vec<String> {
    passives
        .iter()
        .filter(|p| SHAREABLE_PASSIVES.iter().any(|s| p.contains(s)))
        .cloned()
        .collect()
}

/// Counts of what [`inherit_effects`] copied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inherited {
    pub effects: usize,
    pub hots: usize,
    pub mods: usize,
}

/// Copy the summoner's purely beneficial effects onto `summon`, scaled
///
/// Stat effects and modifiers qualify only when every contribution helps the
/// bearer. HoTs always qualify; DoTs never do. Durations are unchanged.
pub fn inherit_effects(summoner: &Combatant, summon: &mut Combatant, multiplier: f64) -> Inherited {
    let mut inherited = Inherited::default();

    for effect in summoner.stats.active_effects() {
        if !effect.is_beneficial() {
            continue;
        }
        let mut copy: StatEffect = effect.scaled(multiplier);
        copy.name = format!("{PREFIX}{}", effect.name);
        copy.source = format!("inherited_from_{}", effect.source);
        debug!(summon = %summon.id(), effect = %effect.name, "inherited stat effect");
        summon.stats.add_effect(copy);
        inherited.effects += 1;
    }

    for hot in summoner.effects.hots() {
        let mut copy: HealingOverTime = hot.scaled(multiplier);
        copy.id = format!("{PREFIX}{}", hot.id);
        copy.name = format!("{PREFIX}{}", hot.name);
        if summon.add_hot(copy).is_added() {
            inherited.hots += 1;
        }
    }

    for modifier in summoner.effects.mods() {
        if !modifier.is_beneficial() {
            continue;
        }
        let raw = modifier.to_effect().scaled(multiplier);
        let mut copy = StatModifier::new(
            format!("{PREFIX}{}", modifier.id),
            format!("{PREFIX}{}", modifier.name),
            modifier.turns,
        );
        copy.deltas = raw.stat_modifiers;
        copy.multipliers = raw.multipliers;
        copy.bypass_diminishing = modifier.bypass_diminishing;
        if summon.add_modifier(copy).is_added() {
            inherited.mods += 1;
        }
    }

    inherited
}
