//! Built-in passives

use super::{Passive, PassiveContext, StackDisplay};
use crate::bus::{names, Event};
use crate::combatant::Combatant;
use crate::stat_block::{StatEffect, Stats, ATK, CRIT_RATE, DEFENSE, MAX_HP, MITIGATION};

/// +5 atk per held instance at battle start
#[derive(Debug, Clone, Copy, Default)]
pub struct AttackUp;

impl AttackUp {
    pub const ID: &'static str = "attack_up";
    const ATK_PER_INSTANCE: f64 = 5.0;
}

impl Passive for AttackUp {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Attack Up"
    }

    fn triggers(&self) -> &[&'static str] {
        &[names::BATTLE_START]
    }

    // Rewrites a single effect from the instance count, so any number of
    // triggers (and battles) leaves the same bonus.
    fn apply(&self, target: &mut Combatant, _ctx: &PassiveContext) {
        let instances = target.stats.passive_count(Self::ID) as f64;
        target.stats.add_effect(
            StatEffect::new(Self::ID, Self::ID).with_modifier(ATK, Self::ATK_PER_INSTANCE * instances),
        );
    }
}

/// Small heal per instance when a battle ends
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomHeal;

impl RoomHeal {
    pub const ID: &'static str = "room_heal";
    const AMOUNT: f64 = 1.0;
}

impl Passive for RoomHeal {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Room Heal"
    }

    fn triggers(&self) -> &[&'static str] {
        &[names::BATTLE_END]
    }

    fn apply(&self, target: &mut Combatant, _ctx: &PassiveContext) {
        target.stats.apply_healing(Self::AMOUNT, None);
    }
}

/// Charge built by acting; more charge means more actions per turn
#[derive(Debug, Clone, Copy, Default)]
pub struct LunaLunarReservoir;

impl LunaLunarReservoir {
    pub const ID: &'static str = "luna_lunar_reservoir";
    pub const MAX_CHARGE: i64 = 200;
    /// Spent each time the reservoir overflows
    pub const BOOST_COST: i64 = 50;
    /// Charge needed for the top tier
    pub const TOP_TIER: i64 = 85;

    pub fn charge(stats: &Stats) -> i64 {
        stats.passive_counter(Self::ID)
    }

    /// Add charge from an outside effect, capped at the maximum
    pub fn add_charge(stats: &mut Stats, amount: i64) -> i64 {
        let charge = (Self::charge(stats) + amount).clamp(0, Self::MAX_CHARGE);
        stats.set_passive_counter(Self::ID, charge);
        charge
    }

    pub fn actions_for_charge(charge: i64) -> u32 {
        match charge {
            c if c < 35 => 2,
            c if c < 50 => 4,
            c if c < 70 => 8,
            c if c < Self::TOP_TIER => 16,
            _ => 32,
        }
    }
}

impl Passive for LunaLunarReservoir {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Lunar Reservoir"
    }

    fn triggers(&self) -> &[&'static str] {
        &[names::ACTION_TAKEN]
    }

    fn stacks(&self, stats: &Stats) -> i64 {
        Self::charge(stats)
    }

    fn display(&self, stats: &Stats) -> StackDisplay {
        if Self::charge(stats) >= Self::TOP_TIER {
            StackDisplay::Spinner
        } else {
            StackDisplay::Number
        }
    }

    fn apply(&self, target: &mut Combatant, _ctx: &PassiveContext) {
        let stats = &mut target.stats;
        let charge = Self::add_charge(stats, 1);
        stats.actions_per_turn = Self::actions_for_charge(charge);
        if charge >= Self::MAX_CHARGE {
            stats.set_passive_counter(Self::ID, charge - Self::BOOST_COST);
        }
    }
}

/// Answers every hit with a short buff and a counter attack
#[derive(Debug, Clone, Copy, Default)]
pub struct GraygrayCounterMaestro;

impl GraygrayCounterMaestro {
    pub const ID: &'static str = "graygray_counter_maestro";
    const MAX_STACKS: u32 = 50;
    const ATK_BONUS: f64 = 0.05;
    const MITIGATION_BONUS: f64 = 0.1;
    const COUNTER_FRACTION: f64 = 0.5;
}

impl Passive for GraygrayCounterMaestro {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Counter Maestro"
    }

    fn triggers(&self) -> &[&'static str] {
        &[names::DAMAGE_TAKEN]
    }

    fn max_stacks(&self) -> Option<u32> {
        Some(Self::MAX_STACKS)
    }

    /// Counters performed this battle
    fn stacks(&self, stats: &Stats) -> i64 {
        stats.passive_counter(Self::ID)
    }

    fn apply(&self, target: &mut Combatant, ctx: &PassiveContext) {
        let stats = &mut target.stats;
        if !stats.is_alive() {
            return;
        }
        let atk_bonus = (stats.atk() as f64 * Self::ATK_BONUS).floor();
        stats.add_effect(
            StatEffect::new(format!("{}_attack_buff", Self::ID), Self::ID)
                .with_modifier(ATK, atk_bonus)
                .with_duration(1),
        );
        stats.add_effect(
            StatEffect::new(format!("{}_mitigation_buff", Self::ID), Self::ID)
                .with_modifier(MITIGATION, Self::MITIGATION_BONUS)
                .with_duration(1),
        );

        let Some(attacker) = ctx.other.as_ref() else {
            return;
        };
        let counter = (ctx.amount as f64 * Self::COUNTER_FRACTION).floor() as i64;
        if counter <= 0 {
            return;
        }
        if stats.passive_counter(Self::ID) < i64::from(Self::MAX_STACKS) {
            stats.add_passive_counter(Self::ID, 1);
        }
        let event = Event::new(names::COUNTER_ATTACK)
            .for_entity(&stats.id)
            .with_other(Some(attacker))
            .with_amount(counter)
            .with_detail("source", Self::ID);
        stats.queue(event);
    }
}

/// Permanent 35% bonus on every level-up gain
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerLevelUpBonus;

impl PlayerLevelUpBonus {
    pub const ID: &'static str = "player_level_up_bonus";
    const BONUS: f64 = 0.35;
    const DEFAULT_GAINS: [(&'static str, f64); 3] = [(MAX_HP, 10.0), (ATK, 5.0), (DEFENSE, 3.0)];
}

impl Passive for PlayerLevelUpBonus {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Enhanced Growth"
    }

    fn triggers(&self) -> &[&'static str] {
        &[names::LEVEL_UP]
    }

    fn max_stacks(&self) -> Option<u32> {
        Some(1)
    }

    fn apply(&self, target: &mut Combatant, ctx: &PassiveContext) {
        let stats = &mut target.stats;
        let level = if ctx.amount > 0 { ctx.amount } else { i64::from(stats.level) };
        let mut effect = StatEffect::new(format!("{}_level_{}", Self::ID, level), Self::ID);
        for (stat, default) in Self::DEFAULT_GAINS {
            let gain = stats.level_up_gains.get(stat).copied().unwrap_or(default);
            effect = effect.with_modifier(stat, (gain * Self::BONUS).floor());
        }
        stats.add_effect(effect);
    }
}

/// Hardens with every hit taken and mends a little each turn
#[derive(Debug, Clone, Copy, Default)]
pub struct CarlyGuardiansAegis;

impl CarlyGuardiansAegis {
    pub const ID: &'static str = "carly_guardians_aegis";
    const MAX_STACKS: u32 = 50;
    const STACKS_PER_HIT: i64 = 2;
    const MITIGATION_PER_STACK: f64 = 0.005;
    const HEAL_FROM_DEFENSE: f64 = 0.1;
}

impl Passive for CarlyGuardiansAegis {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Guardian's Aegis"
    }

    fn triggers(&self) -> &[&'static str] {
        &[names::TURN_START, names::DAMAGE_TAKEN]
    }

    fn max_stacks(&self) -> Option<u32> {
        Some(Self::MAX_STACKS)
    }

    fn stacks(&self, stats: &Stats) -> i64 {
        stats.passive_counter(Self::ID)
    }

    fn apply(&self, target: &mut Combatant, ctx: &PassiveContext) {
        let stats = &mut target.stats;
        if ctx.event == names::TURN_START {
            let heal = (stats.defense() as f64 * Self::HEAL_FROM_DEFENSE).floor();
            let id = stats.id.clone();
            stats.apply_healing(heal, Some(&id));
            return;
        }

        let stacks = (stats.passive_counter(Self::ID) + Self::STACKS_PER_HIT)
            .min(i64::from(Self::MAX_STACKS));
        stats.set_passive_counter(Self::ID, stacks);
        stats.add_effect(
            StatEffect::new(format!("{}_mitigation_stacks", Self::ID), Self::ID)
                .with_modifier(MITIGATION, stacks as f64 * Self::MITIGATION_PER_STACK),
        );
    }
}

/// Builds up to three stacks of atk and crit from landed hits
#[derive(Debug, Clone, Copy, Default)]
pub struct AdvancedCombatSynergy;

impl AdvancedCombatSynergy {
    pub const ID: &'static str = "advanced_combat_synergy";
    const MAX_STACKS: u32 = 3;
    const ATK_PER_STACK: f64 = 3.0;
    const CRIT_PER_STACK: f64 = 0.01;
}

impl Passive for AdvancedCombatSynergy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Advanced Combat Synergy"
    }

    fn triggers(&self) -> &[&'static str] {
        &[names::HIT_LANDED]
    }

    fn max_stacks(&self) -> Option<u32> {
        Some(Self::MAX_STACKS)
    }

    fn stacks(&self, stats: &Stats) -> i64 {
        stats.passive_counter(Self::ID)
    }

    fn apply(&self, target: &mut Combatant, ctx: &PassiveContext) {
        if ctx.amount <= 0 {
            return;
        }
        let stats = &mut target.stats;
        let current = stats.passive_counter(Self::ID);
        if current >= i64::from(Self::MAX_STACKS) {
            return;
        }
        let stacks = stats.add_passive_counter(Self::ID, 1) as f64;
        stats.add_effect(
            StatEffect::new(format!("{}_persistent_buff", Self::ID), Self::ID)
                .with_modifier(ATK, stacks * Self::ATK_PER_STACK)
                .with_modifier(CRIT_RATE, stacks * Self::CRIT_PER_STACK),
        );
    }
}
