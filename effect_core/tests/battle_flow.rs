//! Integration test: build a session -> attach effects -> tick -> summon -> end battle
//!
//! Exercises the engine only through its public surface, the way a game
//! loop would drive it.

use effect_core::bus::names;
use effect_core::prelude::*;
use effect_core::stat_block::{ATK, DEFENSE, MAX_HP};
use rand::rngs::mock::StepRng;
use std::sync::{Arc, Mutex};

fn session() -> BattleSession {
    BattleSession::new(EngineConfig::default()).unwrap()
}

/// Record every event published under `name`
fn record(bus: &EventBus, name: &str) -> Arc<Mutex<Vec<Event>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(name, "recorder", move |e: &Event| {
        sink.lock().unwrap().push(e.clone());
        Ok(())
    });
    seen
}

#[test]
fn test_heal_published_before_damage() {
    let session = session();
    let hero = session.combatant(Stats::new("hero").with_base(MAX_HP, 100.0));
    {
        let mut hero = lock(&hero);
        hero.stats.hp = 95;
        hero.add_dot(DamageOverTime::new("bleed", "Bleed", 1, 3), None);
        hero.add_hot(HealingOverTime::new("regen", "Regen", 10, 3));
    }

    let order = Arc::new(Mutex::new(Vec::new()));
    for name in [names::HEAL_RECEIVED, names::DAMAGE_TAKEN] {
        let sink = Arc::clone(&order);
        session.bus().subscribe(name, "order", move |e: &Event| {
            sink.lock().unwrap().push(e.name.clone());
            Ok(())
        });
    }

    let report = session.tick(&hero, &[]);
    assert_eq!(report.healed, 5);
    assert_eq!(report.damage, 1);
    assert_eq!(lock(&hero).stats.hp, 99);
    assert_eq!(
        *order.lock().unwrap(),
        vec![names::HEAL_RECEIVED.to_string(), names::DAMAGE_TAKEN.to_string()]
    );
}

#[test]
fn test_same_id_dots_stack_until_limit() {
    let session = session();
    let target = session.combatant(Stats::new("target").with_base(MAX_HP, 1000.0));
    let mut target = lock(&target);

    for _ in 0..3 {
        assert_eq!(
            target.add_dot(DamageOverTime::new("poison", "Poison", 5, 2), None),
            AddOutcome::Added
        );
    }
    assert_eq!(target.effects.stack_count("poison"), 3);
    assert_eq!(
        target.add_dot(DamageOverTime::new("poison", "Poison", 5, 2), Some(3)),
        AddOutcome::StackLimit
    );

    let report = target.tick(&mut []);
    assert_eq!(report.damage, 15);
    assert_eq!(target.stats.hp, 985);
    assert_eq!(target.stats.dots.len(), 3);
}

#[test]
fn test_dead_target_refuses_effects() {
    let session = session();
    let corpse = session.combatant(Stats::new("corpse"));
    let mut corpse = lock(&corpse);
    corpse.stats.hp = 0;

    assert_eq!(
        corpse.add_dot(DamageOverTime::new("burn", "Burn", 10, 3), None),
        AddOutcome::DeadTarget
    );
    assert_eq!(
        corpse.add_hot(HealingOverTime::new("regen", "Regen", 10, 3)),
        AddOutcome::DeadTarget
    );
    assert_eq!(corpse.stats.apply_healing(50.0, None), 0);
    assert_eq!(corpse.stats.apply_damage(50.0, None), 0);
    assert!(corpse.effects.is_empty());
    assert!(corpse.stats.pending_events().is_empty());
}

#[test]
fn test_killed_by_effects_announced_after_locks_release() {
    let session = session();
    let victim = session.combatant(Stats::new("victim").with_base(MAX_HP, 10.0));
    lock(&victim).add_dot(DamageOverTime::new("burn", "Burn", 50, 3), None);

    // Locking the victim inside the handler would deadlock if the session
    // still held it while publishing.
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let probe = Arc::clone(&victim);
    session.bus().subscribe(names::ENTITY_KILLED, "probe", move |e: &Event| {
        let hp = lock(&probe).stats.hp;
        sink.lock().unwrap().push((e.entity.clone(), hp));
        Ok(())
    });

    session.tick(&victim, &[]);
    assert_eq!(*seen.lock().unwrap(), vec![(Some(EntityId::from("victim")), 0)]);
}

#[test]
fn test_summon_inherits_only_beneficial_effects() {
    let session = session();
    let hero = session.combatant(
        Stats::new("hero")
            .with_base(ATK, 400.0)
            .with_base(DEFENSE, 100.0)
            .with_damage_type(DamageType::Fire),
    );
    {
        let mut hero = lock(&hero);
        hero.stats
            .add_effect(StatEffect::new("rally", "card").with_modifier(ATK, 40.0));
        hero.stats.add_effect(
            StatEffect::new("reckless", "relic")
                .with_modifier(ATK, 80.0)
                .with_modifier(DEFENSE, -20.0),
        );
        hero.add_hot(HealingOverTime::new("regen", "Regen", 20, 3));
        hero.add_dot(DamageOverTime::new("burn", "Burn", 10, 3), None);
        hero.add_modifier(StatModifier::new("curse", "Curse", 3).with_delta(DEFENSE, -5.0));
    }

    let created = record(session.bus(), names::SUMMON_CREATED);
    let summon = session
        .summons()
        .create_summon(
            &hero,
            SummonRequest::new("phantom", "card").with_multiplier(0.5),
            &mut StepRng::new(0, 0),
        )
        .unwrap();

    let summon = lock(&summon);
    assert_eq!(summon.id().as_str(), "hero_phantom_summon");
    assert_eq!(summon.stats.base_stat(ATK), 200.0);
    assert!(summon.stats.find_effect("summon_rally").is_some());
    assert!(summon.stats.find_effect("summon_reckless").is_none());
    assert_eq!(summon.effects.hots().len(), 1);
    assert!(summon.effects.dots().is_empty());
    assert!(summon.effects.mods().is_empty());
    assert_eq!(created.lock().unwrap().len(), 1);

    // The summoner keeps everything it had
    let hero = lock(&hero);
    assert_eq!(hero.effects.dots().len(), 1);
    assert_eq!(hero.stats.active_effects().len(), 2);
}

#[test]
fn test_sessions_do_not_share_subscribers() {
    let first = session();
    let second = session();
    let seen_first = record(first.bus(), names::BATTLE_START);
    let seen_second = record(second.bus(), names::BATTLE_START);

    first.start_battle(&mut Party::new());
    first.start_battle(&mut Party::new());

    assert_eq!(seen_first.lock().unwrap().len(), 2);
    assert!(seen_second.lock().unwrap().is_empty());
}

#[test]
fn test_bulk_dots_expire_together() {
    let session = session();
    let target = session.combatant(Stats::new("target").with_base(MAX_HP, 1_000_000.0));
    {
        let mut target = lock(&target);
        for i in 0..800 {
            target.add_dot(DamageOverTime::new(format!("dot_{i}"), "Bulk", 1, 10), None);
        }
    }

    for turn in 1..=10 {
        let report = session.tick(&target, &[]);
        assert!(report.batched);
        assert_eq!(report.damage, 800);
        if turn < 10 {
            assert_eq!(lock(&target).effects.dots().len(), 800);
        } else {
            assert_eq!(report.expired_dots.len(), 800);
        }
    }

    let target = lock(&target);
    assert!(target.effects.dots().is_empty());
    assert!(target.stats.dots.is_empty());
    assert_eq!(target.stats.hp, 1_000_000 - 8_000);
}

#[test]
fn test_end_battle_clears_effects_and_temporary_summons() {
    let session = session();
    let hero = session.combatant(Stats::new("hero"));
    lock(&hero).add_modifier(StatModifier::new("haste", "Haste", 5).with_multiplier(ATK, 1.5));
    let before = lock(&hero).stats.base_stat(ATK);

    session
        .summons()
        .create_summon(&hero, SummonRequest::new("phantom", "card"), &mut StepRng::new(0, 0))
        .unwrap();
    let mut party = Party::from_members(vec![Arc::clone(&hero)]);
    assert_eq!(session.start_battle(&mut party), 1);
    assert_eq!(party.len(), 2);

    session.end_battle(&party);

    let hero = lock(&hero);
    assert!(hero.effects.is_empty());
    assert!((hero.stats.current(ATK) - before).abs() < 1e-9);
    assert!(session.summons().get_all_summons().is_empty());
}

#[test]
fn test_wired_passives_react_to_published_events() {
    let mut session = session();
    let luna = session.combatant(Stats::new("luna").with_passives(&["luna_lunar_reservoir"]));
    let roster = Party::from_members(vec![Arc::clone(&luna)]);
    assert!(session.wire_passives(&roster) > 0);

    for _ in 0..3 {
        session
            .bus()
            .emit(&Event::new(names::ACTION_TAKEN).for_entity(&EntityId::from("luna")));
    }
    assert_eq!(lock(&luna).stats.passive_counter("luna_lunar_reservoir"), 3);

    session.unwire_passives();
    session
        .bus()
        .emit(&Event::new(names::ACTION_TAKEN).for_entity(&EntityId::from("luna")));
    assert_eq!(lock(&luna).stats.passive_counter("luna_lunar_reservoir"), 3);
}

#[test]
fn test_corruption_spreads_to_allies_once() {
    let session = session();
    let bearer = session.combatant(Stats::new("bearer").with_base(MAX_HP, 5.0));
    let ally = session.combatant(Stats::new("ally"));
    lock(&bearer).add_dot(
        DamageOverTime::new("corruption", "Abyssal Corruption", 50, 5)
            .with_behavior(DotBehavior::AbyssalCorruption),
        None,
    );
    let spread = record(session.bus(), names::DOT_SPREAD);
    let killed = record(session.bus(), names::ENTITY_KILLED);
    let others = vec![Arc::clone(&ally)];

    let report = session.tick(&bearer, &others);
    assert_eq!(report.spread, 1);
    assert_eq!(killed.lock().unwrap().len(), 1);

    for _ in 0..3 {
        assert_eq!(session.tick(&bearer, &others).spread, 0);
    }
    assert_eq!(lock(&ally).effects.stack_count("corruption"), 1);
    assert_eq!(spread.lock().unwrap().len(), 1);
    assert_eq!(killed.lock().unwrap().len(), 1);
}

