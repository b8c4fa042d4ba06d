//! Effect Manager - per-entity owner of DoTs, HoTs and stat modifiers

mod hot;
mod modifier;

pub use hot::HealingOverTime;
pub use modifier::{create_stat_buff, StatModifier};

use crate::bus::{names, Event};
use crate::combatant::Combatant;
use crate::config::EffectConfig;
use crate::dot::{self, DamageOverTime, DotBehavior, DotHit, DotRegistry};
use crate::stat_block::Stats;
use crate::types::AddOutcome;
use rand::Rng;

const ATROPHY_MODIFIER_ID: &str = "celestial_atrophy_atk_down";
const ATROPHY_MODIFIER_NAME: &str = "Celestial Atrophy - Attack Down";

/// What happened during one [`EffectManager::tick`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub healed: i64,
    pub damage: i64,
    pub expired_hots: Vec<String>,
    pub expired_dots: Vec<String>,
    pub expired_mods: Vec<String>,
    /// DoT copies handed to other entities on death
    pub spread: usize,
    /// Whether the DoTs were resolved as a parallel batch
    pub batched: bool,
}

/// Remove one occurrence of `id` from a label list
fn remove_label(labels: &mut Vec<String>, id: &str) {
    if let Some(pos) = labels.iter().position(|l| l == id) {
        labels.remove(pos);
    }
}

/// Owns one entity's timed effects and drives their lifecycle
///
/// The manager never holds its entity; every operation takes the `Stats` it
/// manages explicitly, and label lists on `Stats` mirror the live effects.
#[derive(Debug, Clone)]
pub struct EffectManager {
    dots: Vec<DamageOverTime>,
    hots: Vec<HealingOverTime>,
    mods: Vec<StatModifier>,
    parallel_threshold: usize,
    frozen_chance_per_stack: f64,
}

impl Default for EffectManager {
    fn default() -> Self {
        Self::with_config(&EffectConfig::default())
    }
}

impl EffectManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &EffectConfig) -> Self {
        EffectManager {
            dots: Vec::new(),
            hots: Vec::new(),
            mods: Vec::new(),
            parallel_threshold: config.parallel_threshold.max(1),
            frozen_chance_per_stack: config.frozen_wound_chance_per_stack,
        }
    }

    /// DoT count at which ticks switch to the batched path
    pub fn parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    /// An empty manager with the same settings
    pub fn empty_like(&self) -> Self {
        EffectManager {
            dots: Vec::new(),
            hots: Vec::new(),
            mods: Vec::new(),
            parallel_threshold: self.parallel_threshold,
            frozen_chance_per_stack: self.frozen_chance_per_stack,
        }
    }

    // === Queries ===

    pub fn dots(&self) -> &[DamageOverTime] {
        &self.dots
    }

    pub fn hots(&self) -> &[HealingOverTime] {
        &self.hots
    }

    pub fn mods(&self) -> &[StatModifier] {
        &self.mods
    }

    /// Live DoT instances sharing `id`
    pub fn stack_count(&self, id: &str) -> usize {
        self.dots.iter().filter(|d| d.id == id).count()
    }

    pub fn hot_count(&self, id: &str) -> usize {
        self.hots.iter().filter(|h| h.id == id).count()
    }

    pub fn is_empty(&self) -> bool {
        self.dots.is_empty() && self.hots.is_empty() && self.mods.is_empty()
    }

    // === Adding effects ===

    /// Attach a DoT
    ///
    /// Instances with the same id stack independently. When a limit is set
    /// (on the call, else on the DoT) and already reached, nothing changes.
    pub fn add_dot(
        &mut self,
        stats: &mut Stats,
        dot: DamageOverTime,
        max_stacks: Option<u32>,
    ) -> AddOutcome {
        if !stats.is_alive() {
            tracing::debug!(entity = %stats.id, dot = %dot.id, "refused DoT on dead target");
            return AddOutcome::DeadTarget;
        }
        if let Some(limit) = max_stacks.or(dot.max_stacks) {
            if self.stack_count(&dot.id) >= limit as usize {
                return AddOutcome::StackLimit;
            }
        }
        self.push_dot(stats, dot);
        AddOutcome::Added
    }

    pub(crate) fn push_dot(&mut self, stats: &mut Stats, dot: DamageOverTime) {
        tracing::debug!(entity = %stats.id, dot = %dot.id, damage = dot.damage, turns = dot.turns, "added DoT");
        stats.dots.push(dot.id.clone());
        self.dots.push(dot);
    }

    /// Attach a HoT; refused on dead targets
    pub fn add_hot(&mut self, stats: &mut Stats, hot: HealingOverTime) -> AddOutcome {
        if !stats.is_alive() {
            tracing::debug!(entity = %stats.id, hot = %hot.id, "refused HoT on dead target");
            return AddOutcome::DeadTarget;
        }
        self.push_hot(stats, hot);
        AddOutcome::Added
    }

    pub(crate) fn push_hot(&mut self, stats: &mut Stats, hot: HealingOverTime) {
        tracing::debug!(entity = %stats.id, hot = %hot.id, healing = hot.healing, turns = hot.turns, "added HoT");
        stats.hots.push(hot.id.clone());
        self.hots.push(hot);
    }

    /// Apply a modifier now (unless it already is) and track it for removal
    pub fn add_modifier(&mut self, stats: &mut Stats, mut modifier: StatModifier) -> AddOutcome {
        if !modifier.is_applied() {
            modifier.apply(stats);
        }
        stats.mods.push(modifier.id.clone());
        self.mods.push(modifier);
        AddOutcome::Added
    }

    /// Roll to inflict the attacker's elemental DoT after a hit of `damage`
    ///
    /// Chance is `(hit_rate - resistance) × U(0.9, 1.1)` clamped to [0.01, 1].
    pub fn maybe_inflict_dot<R: Rng + ?Sized>(
        &mut self,
        stats: &mut Stats,
        attacker: &Stats,
        damage: f64,
        registry: &DotRegistry,
        rng: &mut R,
    ) -> AddOutcome {
        let Some(dot) = registry.create_dot(attacker.damage_type, damage, Some(&attacker.id)) else {
            return AddOutcome::Resisted;
        };
        let rate = (attacker.effect_hit_rate() - stats.effect_resistance()).max(0.0);
        let chance = (rate * rng.gen_range(0.9..=1.1)).clamp(0.01, 1.0);
        if rng.gen::<f64>() < chance {
            self.add_dot(stats, dot, None)
        } else {
            AddOutcome::Resisted
        }
    }

    // === Removing effects ===

    /// Remove every modifier with `id`, reversing its contribution
    pub fn remove_modifier(&mut self, stats: &mut Stats, id: &str) -> usize {
        let mut removed = 0;
        self.mods.retain_mut(|m| {
            if m.id != id {
                return true;
            }
            m.remove(stats);
            removed += 1;
            false
        });
        for _ in 0..removed {
            remove_label(&mut stats.mods, id);
        }
        removed
    }

    /// Remove every DoT with `id`
    pub fn remove_dots(&mut self, stats: &mut Stats, id: &str) -> usize {
        let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.dots)
            .into_iter()
            .partition(|d| d.id == id);
        self.dots = kept;
        for dot in &gone {
            remove_label(&mut stats.dots, &dot.id);
            self.detach_linked(stats, &dot.linked);
        }
        gone.len()
    }

    /// Remove every HoT with `id`
    pub fn remove_hots(&mut self, stats: &mut Stats, id: &str) -> usize {
        let before = self.hots.len();
        self.hots.retain(|h| h.id != id);
        let removed = before - self.hots.len();
        for _ in 0..removed {
            remove_label(&mut stats.hots, id);
        }
        removed
    }

    /// Drop everything: reverse every modifier and empty the label lists
    ///
    /// Called on battle end and on defeat so nothing outlives the battle.
    pub fn cleanup(&mut self, stats: &mut Stats) {
        for modifier in &mut self.mods {
            modifier.remove(stats);
        }
        tracing::debug!(
            entity = %stats.id,
            dots = self.dots.len(),
            hots = self.hots.len(),
            mods = self.mods.len(),
            "cleared effects"
        );
        self.dots.clear();
        self.hots.clear();
        self.mods.clear();
        stats.dots.clear();
        stats.hots.clear();
        stats.mods.clear();
    }

    // === Lifecycle ===

    /// Advance every effect by one turn
    ///
    /// HoTs resolve before any DoT, then DoTs, then modifiers. If the bearer
    /// dies during this tick and `others` is non-empty, every DoT that
    /// spreads on death hands a copy to each of them. A bearer that was
    /// already dead spreads nothing.
    pub fn tick(&mut self, stats: &mut Stats, others: &mut [&mut Combatant]) -> TickReport {
        let mut report = TickReport::default();
        let was_alive = stats.is_alive();

        // HoTs
        let mut expired_hots = Vec::new();
        self.hots.retain_mut(|hot| {
            let (healed, alive) = hot.tick(stats);
            report.healed += healed;
            if !alive {
                expired_hots.push(hot.id.clone());
            }
            alive
        });
        for id in &expired_hots {
            remove_label(&mut stats.hots, id);
        }
        report.expired_hots = expired_hots;

        // DoTs
        report.batched = dot::is_batchable(&self.dots, self.parallel_threshold);
        let hits: Vec<DotHit> = if report.batched {
            dot::tick_batch(stats, &mut self.dots)
        } else {
            let mut hits = Vec::with_capacity(self.dots.len());
            for index in 0..self.dots.len() {
                if self.dots[index].behavior == DotBehavior::CelestialAtrophy {
                    self.attach_atrophy(stats, index);
                }
                hits.push(dot::tick_dot(stats, &mut self.dots[index]));
            }
            hits
        };

        let mut survivors = Vec::with_capacity(self.dots.len());
        let mut expired = Vec::new();
        for (dot, hit) in self.dots.drain(..).zip(hits) {
            report.damage += hit.dealt;
            if hit.alive {
                survivors.push(dot);
            } else {
                expired.push(dot);
            }
        }
        self.dots = survivors;
        for dot in &expired {
            remove_label(&mut stats.dots, &dot.id);
            self.detach_linked(stats, &dot.linked);
            report.expired_dots.push(dot.id.clone());
        }

        // Modifiers
        let mut expired_mods = Vec::new();
        self.mods.retain_mut(|m| {
            let alive = m.tick(stats);
            if !alive {
                expired_mods.push(m.id.clone());
            }
            alive
        });
        for id in &expired_mods {
            remove_label(&mut stats.mods, id);
        }
        report.expired_mods = expired_mods;

        if was_alive && !stats.is_alive() && !others.is_empty() {
            report.spread = self.spread_on_death(stats, &expired, others);
        }

        if !report.expired_dots.is_empty() || !report.expired_hots.is_empty() {
            tracing::debug!(
                entity = %stats.id,
                expired_dots = report.expired_dots.len(),
                expired_hots = report.expired_hots.len(),
                expired_mods = report.expired_mods.len(),
                "effects expired"
            );
        }
        report
    }

    /// Per-action hook
    ///
    /// Blazing DoTs deal a bonus tick, then Frozen Wound stacks roll once to
    /// cancel the action. Returns `false` when the action is skipped.
    pub fn on_action<R: Rng + ?Sized>(&mut self, stats: &mut Stats, rng: &mut R) -> bool {
        for dot in self
            .dots
            .iter()
            .filter(|d| d.behavior == DotBehavior::BlazingTorment)
        {
            dot::tick::bonus_tick(stats, dot);
        }

        let stacks = self
            .dots
            .iter()
            .filter(|d| d.behavior == DotBehavior::FrozenWound)
            .count();
        if stacks == 0 {
            return true;
        }
        let chance = (stacks as f64 * self.frozen_chance_per_stack).min(1.0);
        if rng.gen::<f64>() < chance {
            tracing::debug!(entity = %stats.id, stacks, "action lost to frozen wound");
            return false;
        }
        true
    }

    // === Internals ===

    /// Celestial Atrophy: an attack-down modifier lasting the DoT's remaining turns
    fn attach_atrophy(&mut self, stats: &mut Stats, index: usize) {
        let turns = self.dots[index].turns;
        let modifier = create_stat_buff(
            stats,
            ATROPHY_MODIFIER_NAME,
            ATROPHY_MODIFIER_ID,
            turns,
            &[("atk", -1.0)],
        );
        if let Some(key) = modifier.layer_key() {
            self.dots[index].linked.push(key);
        }
        self.add_modifier(stats, modifier);
    }

    /// Remove the modifiers a DoT attached
    fn detach_linked(&mut self, stats: &mut Stats, linked: &[u64]) {
        if linked.is_empty() {
            return;
        }
        let mut removed = Vec::new();
        self.mods.retain_mut(|m| match m.layer_key() {
            Some(key) if linked.contains(&key) => {
                m.remove(stats);
                removed.push(m.id.clone());
                false
            }
            _ => true,
        });
        for id in &removed {
            remove_label(&mut stats.mods, id);
        }
    }

    fn spread_on_death(
        &self,
        stats: &mut Stats,
        expired: &[DamageOverTime],
        others: &mut [&mut Combatant],
    ) -> usize {
        let spreading: Vec<DamageOverTime> = self
            .dots
            .iter()
            .chain(expired.iter())
            .filter(|d| d.behavior.spreads_on_death())
            .map(DamageOverTime::spread_copy)
            .collect();

        let mut spread = 0;
        for dot in &spreading {
            for other in others.iter_mut() {
                if other.add_dot(dot.clone(), None).is_added() {
                    spread += 1;
                    stats.queue(
                        Event::new(names::DOT_SPREAD)
                            .for_entity(&stats.id)
                            .with_other(Some(&other.stats.id))
                            .with_detail("dot", dot.id.as_str()),
                    );
                }
            }
        }
        spread
    }
}
