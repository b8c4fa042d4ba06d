//! DoT tick processing

use super::{DamageOverTime, DotBehavior};
use crate::stat_block::{mitigated_damage, Stats};
use rayon::prelude::*;

/// Outcome of one DoT tick on its bearer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DotHit {
    /// Damage that landed (0 if the bearer was already dead)
    pub dealt: i64,
    /// Whether the DoT survives the tick
    pub alive: bool,
}

/// Damage one tick of `dot` would deal before mitigation
pub fn tick_damage(stats: &Stats, dot: &DamageOverTime) -> f64 {
    match dot.behavior {
        DotBehavior::Echo { fraction } => (stats.last_damage_taken as f64 * fraction).floor(),
        _ => dot.damage as f64,
    }
}

/// Resolve one DoT tick: deal damage, then consume a turn
pub fn tick_dot(stats: &mut Stats, dot: &mut DamageOverTime) -> DotHit {
    if let DotBehavior::Echo { .. } = dot.behavior {
        dot.damage = tick_damage(stats, dot) as i64;
    }
    let amount = mitigated_damage(tick_damage(stats, dot), stats.mitigation());
    let dealt = stats.absorb_damage(amount, dot.source.as_ref());
    DotHit {
        dealt,
        alive: dot.consume_turn(),
    }
}

/// Deal one tick of damage without consuming a turn (bonus ticks)
pub fn bonus_tick(stats: &mut Stats, dot: &DamageOverTime) -> i64 {
    let amount = mitigated_damage(tick_damage(stats, dot), stats.mitigation());
    stats.absorb_damage(amount, dot.source.as_ref())
}

/// Whether `dots` may be resolved as a parallel batch
///
/// Every DoT must be independent of the others' intermediate state, and the
/// batch must be large enough to be worth splitting.
pub fn is_batchable(dots: &[DamageOverTime], threshold: usize) -> bool {
    dots.len() >= threshold && dots.iter().all(|d| d.behavior.is_independent())
}

/// Resolve a batch of independent DoTs
///
/// Mitigated amounts and turn consumption run in parallel; damage is then
/// folded onto the bearer strictly in insertion order, so hp, shields and
/// the event sequence match sequential processing exactly.
pub fn tick_batch(stats: &mut Stats, dots: &mut [DamageOverTime]) -> Vec<DotHit> {
    let mitigation = stats.mitigation();
    let pending: Vec<(i64, bool)> = dots
        .par_iter_mut()
        .map(|dot| {
            let amount = mitigated_damage(dot.damage as f64, mitigation);
            (amount, dot.consume_turn())
        })
        .collect();

    pending
        .into_iter()
        .zip(dots.iter())
        .map(|((amount, alive), dot)| DotHit {
            dealt: stats.absorb_damage(amount, dot.source.as_ref()),
            alive,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stat_block::{MAX_HP, MITIGATION};

    fn target(hp: f64) -> Stats {
        Stats::new("target").with_base(MAX_HP, hp)
    }

    #[test]
    fn test_tick_dot_applies_mitigation() {
        let mut stats = target(100.0);
        stats.set_base_stat(MITIGATION, 2.0);
        let mut dot = DamageOverTime::new("bleed", "Bleed", 10, 2);

        let hit = tick_dot(&mut stats, &mut dot);
        assert_eq!(hit.dealt, 5);
        assert!(hit.alive);
        assert_eq!(stats.hp, 95);
    }

    #[test]
    fn test_echo_uses_last_damage_taken() {
        let mut stats = target(1000.0);
        stats.apply_damage(40.0, None);
        let mut dot = DamageOverTime::new("echo", "Echo", 0, 3)
            .with_behavior(DotBehavior::Echo { fraction: 0.5 });

        let hit = tick_dot(&mut stats, &mut dot);
        assert_eq!(hit.dealt, 20);
        assert_eq!(dot.damage, 20);
        assert_eq!(stats.hp, 940);
    }

    #[test]
    fn test_batch_matches_sequential() {
        let make = || -> Vec<DamageOverTime> {
            (0..64)
                .map(|i| DamageOverTime::new("bleed", "Bleed", 3 + (i % 5), 1 + (i as i32 % 3)))
                .collect()
        };

        let mut seq_stats = target(500.0);
        seq_stats.shields = 17;
        let mut seq_dots = make();
        let seq: Vec<DotHit> = seq_dots
            .iter_mut()
            .map(|d| tick_dot(&mut seq_stats, d))
            .collect();

        let mut par_stats = target(500.0);
        par_stats.shields = 17;
        let mut par_dots = make();
        let par = tick_batch(&mut par_stats, &mut par_dots);

        assert_eq!(seq, par);
        assert_eq!(seq_stats.hp, par_stats.hp);
        assert_eq!(seq_stats.shields, par_stats.shields);
        assert_eq!(seq_stats.take_events(), par_stats.take_events());
        assert_eq!(seq_dots, par_dots);
    }

    #[test]
    fn test_batch_stops_dealing_damage_at_death() {
        let mut stats = target(10.0);
        let mut dots: Vec<DamageOverTime> = (0..30)
            .map(|_| DamageOverTime::new("bleed", "Bleed", 1, 2))
            .collect();
        let hits = tick_batch(&mut stats, &mut dots);
        assert_eq!(stats.hp, 0);
        assert_eq!(hits.iter().map(|h| h.dealt).sum::<i64>(), 10);
        assert!(hits.iter().all(|h| h.alive));
    }

    #[test]
    fn test_is_batchable() {
        let plain: Vec<DamageOverTime> = (0..20)
            .map(|_| DamageOverTime::new("bleed", "Bleed", 1, 2))
            .collect();
        assert!(is_batchable(&plain, 20));
        assert!(!is_batchable(&plain, 21));

        let mut mixed = plain.clone();
        mixed.push(
            DamageOverTime::new("celestial_atrophy", "Celestial Atrophy", 1, 2)
                .with_behavior(DotBehavior::CelestialAtrophy),
        );
        assert!(!is_batchable(&mixed, 1));
    }
}
