//! Summon Manager - registry of summoned entities keyed by summoner
//!
//! The manager is a cheap handle over shared state. Its bus handlers hold a
//! weak reference to that state, so dropping every handle stops them without
//! touching the bus. No manager lock is held while an event is emitted.

mod inherit;

pub use inherit::{
    inherit_effects, scaled_base_stats, shareable_passives, Inherited, INHERITED_STATS,
    SHAREABLE_PASSIVES,
};

use crate::bus::{names, Event, EventBus, HandlerResult, Subscription};
use crate::combatant::{lock, Combatant, Party, SharedCombatant, SummonInfo};
use crate::config::SummonConfig;
use crate::stat_block::Stats;
use crate::types::{DamageType, EntityId};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tracing::{debug, info, warn};

/// Summons whose remaining turns are at or below this are expiring soon
const EXPIRING_SOON_TURNS: i32 = 2;

/// Parameters for [`SummonManager::create_summon`]
#[derive(Debug, Clone, PartialEq)]
pub struct SummonRequest {
    pub summon_type: String,
    /// Card, relic or passive creating the summon
    pub source: String,
    /// Falls back to the configured multiplier
    pub stat_multiplier: Option<f64>,
    /// -1 for no turn limit
    pub turns_remaining: i32,
    pub damage_type: Option<DamageType>,
    /// Falls back to the configured limit
    pub max_summons: Option<usize>,
    /// Temporary summons leave when the battle ends
    pub is_temporary: bool,
}

impl SummonRequest {
    pub fn new(summon_type: impl Into<String>, source: impl Into<String>) -> Self {
        SummonRequest {
            summon_type: summon_type.into(),
            source: source.into(),
            stat_multiplier: None,
            turns_remaining: -1,
            damage_type: None,
            max_summons: None,
            is_temporary: true,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.stat_multiplier = Some(multiplier);
        self
    }

    pub fn lasting(mut self, turns: i32) -> Self {
        self.turns_remaining = turns;
        self
    }

    pub fn with_damage_type(mut self, damage_type: DamageType) -> Self {
        self.damage_type = Some(damage_type);
        self
    }

    pub fn with_max_summons(mut self, max_summons: usize) -> Self {
        self.max_summons = Some(max_summons);
        self
    }

    /// Keep the summon across battles
    pub fn permanent(mut self) -> Self {
        self.is_temporary = false;
        self
    }
}

/// Health and time assessment of one summon
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummonViability {
    pub viable: bool,
    pub health_good: bool,
    pub time_remaining: i32,
    pub expiring_soon: bool,
    pub recommendation: String,
}

/// Whether a summoner should replace what it has
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResummonDecision {
    pub should_resummon: bool,
    pub reason: String,
    pub viable_count: usize,
    pub evaluations: Vec<(EntityId, SummonViability)>,
}

#[derive(Debug, Clone)]
struct Tracked {
    id: EntityId,
    combatant: SharedCombatant,
}

type SummonMap = HashMap<EntityId, Vec<Tracked>>;

struct Inner {
    bus: Arc<EventBus>,
    config: SummonConfig,
    summons: RwLock<SummonMap>,
    subscriptions: Mutex<Vec<Subscription>>,
}

/// Tracks live summons per summoner and tears them down on battle events
#[derive(Clone)]
pub struct SummonManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SummonManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummonManager")
            .field("summoners", &self.read().len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl SummonManager {
    pub fn new(bus: Arc<EventBus>, config: SummonConfig) -> Self {
        SummonManager {
            inner: Arc::new(Inner {
                bus,
                config,
                summons: RwLock::new(HashMap::new()),
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &SummonConfig {
        &self.inner.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.inner.bus
    }

    fn read(&self) -> RwLockReadGuard<'_, SummonMap> {
        self.inner.summons.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SummonMap> {
        self.inner.summons.write().unwrap_or_else(PoisonError::into_inner)
    }

    // === Lifecycle wiring ===

    /// Subscribe the battle lifecycle handlers; a second call does nothing
    pub fn attach(&self) {
        let mut subscriptions = self
            .inner
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !subscriptions.is_empty() {
            return;
        }
        let handlers: [(&str, fn(&SummonManager, &Event)); 5] = [
            (names::BATTLE_START, |_, _| debug!("battle started, summon tracking active")),
            (names::BATTLE_END, |m, _| {
                m.on_battle_end();
            }),
            (names::TURN_START, |m, e| {
                if let Some(entity) = &e.entity {
                    m.on_turn_start(entity);
                }
            }),
            (names::ENTITY_DEFEAT, |m, e| {
                if let Some(entity) = &e.entity {
                    m.remove_all_summons(entity, "summoner_defeated");
                }
            }),
            (names::ENTITY_KILLED, |m, e| {
                if let Some(entity) = &e.entity {
                    m.on_entity_killed(entity);
                }
            }),
        ];
        for (event, handler) in handlers {
            let weak: Weak<Inner> = Arc::downgrade(&self.inner);
            let id = self.inner.bus.subscribe(event, "summon_manager", move |e: &Event| -> HandlerResult {
                if let Some(inner) = weak.upgrade() {
                    handler(&SummonManager { inner }, e);
                }
                Ok(())
            });
            subscriptions.push(Subscription {
                event: event.to_string(),
                id,
            });
        }
    }

    /// Remove the lifecycle handlers from the bus
    pub fn detach(&self) -> usize {
        let subscriptions: Vec<Subscription> = std::mem::take(
            &mut *self
                .inner
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        self.inner.bus.unsubscribe_all(&subscriptions)
    }

    /// Forget every tracked summon without events, for a new session
    pub fn reset(&self) {
        self.write().clear();
        debug!("summon tracking reset");
    }

    // === Creation ===

    /// Create a summon for `summoner`
    ///
    /// Refused (None) when the summoner is itself a summon or already has
    /// its limit of live summons. The limit check, id choice and insert
    /// share one write guard, so concurrent calls cannot overshoot.
    pub fn create_summon<R: Rng + ?Sized>(
        &self,
        summoner: &SharedCombatant,
        request: SummonRequest,
        rng: &mut R,
    ) -> Option<SharedCombatant> {
        let config = &self.inner.config;
        let multiplier = request.stat_multiplier.unwrap_or(config.stat_multiplier);
        let max_summons = request.max_summons.unwrap_or(config.max_summons);

        let (summoner_id, summon_id, shared) = {
            let owner = lock(summoner);
            if owner.is_summon() {
                warn!(summoner = %owner.id(), "summon attempted to create another summon");
                return None;
            }
            let summoner_id = owner.id().clone();
            let mut summons = self.write();
            let live = summons.get(&summoner_id).map_or(&[][..], Vec::as_slice);
            if live.len() >= max_summons {
                debug!(summoner = %summoner_id, max_summons, "summon limit reached");
                return None;
            }
            let summon_id = next_summon_id(live, &summoner_id, &request.summon_type);
            let damage_type = match request.damage_type {
                Some(damage_type) => damage_type,
                None if rng.gen::<f64>() < config.element_match_chance => owner.stats.damage_type,
                None => DamageType::random(rng),
            };
            let shared =
                build_summon(&owner, summon_id.clone(), damage_type, multiplier, &request).shared();
            summons.entry(summoner_id.clone()).or_default().push(Tracked {
                id: summon_id.clone(),
                combatant: Arc::clone(&shared),
            });
            (summoner_id, summon_id, shared)
        };

        info!(
            summoner = %summoner_id,
            summon = %summon_id,
            summon_type = %request.summon_type,
            source = %request.source,
            "created summon"
        );
        self.inner.bus.emit(
            &Event::new(names::SUMMON_CREATED)
                .for_entity(&summoner_id)
                .with_other(Some(&summon_id))
                .with_detail("summon_type", request.summon_type.as_str())
                .with_detail("source", request.source.as_str()),
        );
        Some(shared)
    }

    // === Queries ===

    pub fn get_summons(&self, summoner_id: &EntityId) -> Vec<SharedCombatant> {
        self.read()
            .get(summoner_id)
            .map(|list| list.iter().map(|t| Arc::clone(&t.combatant)).collect())
            .unwrap_or_default()
    }

    pub fn get_all_summons(&self) -> Vec<SharedCombatant> {
        self.read()
            .values()
            .flatten()
            .map(|t| Arc::clone(&t.combatant))
            .collect()
    }

    pub fn is_summon(&self, id: &EntityId) -> bool {
        self.summoner_of(id).is_some()
    }

    pub fn summoner_of(&self, summon_id: &EntityId) -> Option<EntityId> {
        self.read()
            .iter()
            .find(|(_, list)| list.iter().any(|t| &t.id == summon_id))
            .map(|(summoner, _)| summoner.clone())
    }

    /// Add every live summon whose summoner is in `party`
    pub fn add_summons_to_party(&self, party: &mut Party) -> usize {
        let roster = party.ids();
        let candidates: Vec<SharedCombatant> = {
            let summons = self.read();
            roster
                .iter()
                .filter_map(|id| summons.get(id))
                .flatten()
                .map(|t| Arc::clone(&t.combatant))
                .collect()
        };
        let mut added = 0;
        for summon in candidates {
            if !party.contains_member(&summon) {
                party.push(summon);
                added += 1;
            }
        }
        if added > 0 {
            debug!(added, "added summons to party");
        }
        added
    }

    // === Removal ===

    /// Stop tracking a summon and cancel its effects
    ///
    /// The caller must not hold the summon's lock.
    pub fn remove_summon(&self, summon_id: &EntityId, reason: &str) -> bool {
        let removed = {
            let mut summons = self.write();
            let mut found = None;
            for (summoner, list) in summons.iter_mut() {
                if let Some(pos) = list.iter().position(|t| &t.id == summon_id) {
                    found = Some((summoner.clone(), list.remove(pos)));
                    break;
                }
            }
            if let Some((summoner, _)) = &found {
                if summons.get(summoner).is_some_and(Vec::is_empty) {
                    summons.remove(summoner);
                }
            }
            found
        };
        let Some((summoner_id, tracked)) = removed else {
            return false;
        };

        lock(&tracked.combatant).cleanup();
        debug!(summon = %summon_id, reason, "removed summon");
        self.inner.bus.emit(
            &Event::new(names::SUMMON_REMOVED)
                .for_entity(summon_id)
                .with_other(Some(&summoner_id))
                .with_detail("reason", reason),
        );
        true
    }

    pub fn remove_all_summons(&self, summoner_id: &EntityId, reason: &str) -> usize {
        let ids: Vec<EntityId> = self
            .read()
            .get(summoner_id)
            .map(|list| list.iter().map(|t| t.id.clone()).collect())
            .unwrap_or_default();
        let removed = ids
            .iter()
            .filter(|id| self.remove_summon(id, reason))
            .count();
        if removed > 0 {
            debug!(summoner = %summoner_id, removed, reason, "removed summons");
        }
        removed
    }

    // === Viability ===

    pub fn evaluate_viability(summon: &Combatant, min_health: f64) -> SummonViability {
        let time_remaining = summon.summon.as_ref().map_or(-1, |s| s.turns_remaining);
        if !summon.stats.is_alive() {
            return SummonViability {
                viable: false,
                health_good: false,
                time_remaining: 0,
                expiring_soon: true,
                recommendation: "Summon is dead".to_string(),
            };
        }
        let max_hp = summon.stats.max_hp();
        let health = if max_hp > 0 {
            summon.stats.hp as f64 / max_hp as f64
        } else {
            0.0
        };
        let health_good = health >= min_health;
        let expiring_soon = time_remaining > 0 && time_remaining <= EXPIRING_SOON_TURNS;
        let viable = health_good && !expiring_soon;
        let recommendation = if !health_good {
            format!("Low health ({:.1}%), consider replacing", health * 100.0)
        } else if expiring_soon {
            format!("Expiring in {time_remaining} turn(s), prepare replacement")
        } else {
            format!("Healthy ({:.1}%), keep current summon", health * 100.0)
        };
        SummonViability {
            viable,
            health_good,
            time_remaining,
            expiring_soon,
            recommendation,
        }
    }

    pub fn should_resummon(&self, summoner_id: &EntityId) -> ResummonDecision {
        let min_health = self.inner.config.min_health_threshold;
        let evaluations: Vec<(EntityId, SummonViability)> = self
            .get_summons(summoner_id)
            .iter()
            .map(|s| {
                let summon = lock(s);
                (summon.id().clone(), Self::evaluate_viability(&summon, min_health))
            })
            .collect();

        if evaluations.is_empty() {
            return ResummonDecision {
                should_resummon: true,
                reason: "No existing summons".to_string(),
                viable_count: 0,
                evaluations,
            };
        }
        let viable_count = evaluations.iter().filter(|(_, v)| v.viable).count();
        if viable_count > 0 {
            return ResummonDecision {
                should_resummon: false,
                reason: format!("Have {viable_count} viable summon(s)"),
                viable_count,
                evaluations,
            };
        }
        let low_health = evaluations.iter().any(|(_, v)| !v.health_good);
        let expiring = evaluations.iter().any(|(_, v)| v.expiring_soon);
        let reason = match (low_health, expiring) {
            (true, true) => "Existing summons are low health and expiring soon",
            (true, false) => "Existing summons have low health",
            (false, true) => "Existing summons are expiring soon",
            (false, false) => "Existing summons are not viable",
        };
        ResummonDecision {
            should_resummon: true,
            reason: reason.to_string(),
            viable_count,
            evaluations,
        }
    }

    // === Event handlers ===

    fn on_battle_end(&self) -> usize {
        let temporary: Vec<EntityId> = self
            .get_all_summons()
            .iter()
            .filter_map(|s| {
                let summon = lock(s);
                let temporary = summon.summon.as_ref().is_some_and(|info| info.is_temporary);
                temporary.then(|| summon.id().clone())
            })
            .collect();
        let removed = temporary
            .iter()
            .filter(|id| self.remove_summon(id, "battle_end"))
            .count();
        if removed > 0 {
            debug!(removed, "cleaned up temporary summons at battle end");
        }
        removed
    }

    fn on_turn_start(&self, entity: &EntityId) {
        let expired: Vec<EntityId> = self
            .get_summons(entity)
            .iter()
            .filter_map(|s| {
                let mut summon = lock(s);
                let alive = summon.summon.as_mut().map_or(true, SummonInfo::tick_turn);
                (!alive).then(|| summon.id().clone())
            })
            .collect();
        for id in expired {
            self.remove_summon(&id, "expired");
        }
    }

    fn on_entity_killed(&self, victim: &EntityId) {
        let Some(summoner_id) = self.summoner_of(victim) else {
            return;
        };
        self.remove_summon(victim, "defeated");
        self.inner.bus.emit(
            &Event::new(names::SUMMON_DEFEATED)
                .for_entity(&summoner_id)
                .with_other(Some(victim)),
        );
    }
}

/// `{summoner}_{type}_summon`, numbered from 2 when taken
fn next_summon_id(live: &[Tracked], summoner_id: &EntityId, summon_type: &str) -> EntityId {
    let base = format!("{summoner_id}_{summon_type}_summon");
    let taken = |candidate: &str| live.iter().any(|t| t.id.as_str() == candidate);
    if !taken(&base) {
        return EntityId(base);
    }
    let mut n = 2;
    while taken(&format!("{base}_{n}")) {
        n += 1;
    }
    EntityId(format!("{base}_{n}"))
}

/// Build the summon's combatant from its (locked) summoner
fn build_summon(
    owner: &Combatant,
    id: EntityId,
    damage_type: DamageType,
    multiplier: f64,
    request: &SummonRequest,
) -> Combatant {
    let mut stats = Stats::new(id)
        .with_plugin_type("summon")
        .with_damage_type(damage_type);
    stats.set_curves(owner.stats.shared_curves());
    for (stat, value) in scaled_base_stats(&owner.stats, multiplier) {
        stats.set_base_stat(stat, value);
    }
    stats.level = owner.stats.level;
    stats.passives = shareable_passives(&owner.stats.passives);
    stats.hp = stats.max_hp();

    let mut summon = Combatant::new(stats).with_effects(owner.effects.empty_like());
    summon.summon = Some(SummonInfo {
        summoner_id: owner.id().clone(),
        summon_type: request.summon_type.clone(),
        summon_source: request.source.clone(),
        is_temporary: request.is_temporary,
        turns_remaining: request.turns_remaining,
    });
    let inherited = inherit_effects(owner, &mut summon, multiplier);
    debug!(
        summon = %summon.id(),
        effects = inherited.effects,
        hots = inherited.hots,
        mods = inherited.mods,
        "summon inherited effects"
    );
    summon
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dot::DamageOverTime;
    use crate::stat_block::{StatEffect, ATK, MAX_HP};
    use rand::rngs::mock::StepRng;

    fn setup() -> (Arc<EventBus>, SummonManager) {
        let bus = Arc::new(EventBus::new());
        let manager = SummonManager::new(Arc::clone(&bus), SummonConfig::default());
        manager.attach();
        (bus, manager)
    }

    fn recorder(bus: &EventBus, event: &str) -> Arc<Mutex<Vec<Event>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(event, "recorder", move |e: &Event| {
            sink.lock().unwrap().push(e.clone());
            Ok(())
        });
        seen
    }

    fn always_match() -> StepRng {
        StepRng::new(0, 0)
    }

    #[test]
    fn test_create_summon_from_base_stats() {
        let (bus, manager) = setup();
        let created = recorder(&bus, names::SUMMON_CREATED);
        let hero = Combatant::new(Stats::new("hero").with_damage_type(DamageType::Fire)).shared();
        lock(&hero)
            .stats
            .add_effect(StatEffect::new("curse", "foe").with_modifier(ATK, -100.0));

        let summon = manager
            .create_summon(&hero, SummonRequest::new("phantom", "card"), &mut always_match())
            .unwrap();
        let summon = lock(&summon);

        assert_eq!(summon.id().as_str(), "hero_phantom_summon");
        assert_eq!(summon.stats.plugin_type, "summon");
        assert_eq!(summon.stats.atk(), 100);
        assert_eq!(summon.stats.max_hp(), 500);
        assert_eq!(summon.stats.hp, 500);
        assert_eq!(summon.stats.damage_type, DamageType::Fire);
        assert!(summon.stats.find_effect("summon_curse").is_none());
        let info = summon.summon.as_ref().unwrap();
        assert_eq!(info.summoner_id, EntityId::from("hero"));
        assert!(info.is_temporary);

        let created = created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].other, Some(EntityId::from("hero_phantom_summon")));
    }

    #[test]
    fn test_summon_limit_refuses() {
        let (_bus, manager) = setup();
        let hero = Combatant::new(Stats::new("hero")).shared();
        let mut rng = always_match();

        assert!(manager.create_summon(&hero, SummonRequest::new("a", "card"), &mut rng).is_some());
        assert!(manager.create_summon(&hero, SummonRequest::new("b", "card"), &mut rng).is_none());

        let second = SummonRequest::new("a", "card").with_max_summons(2);
        let summon = manager.create_summon(&hero, second, &mut rng).unwrap();
        assert_eq!(lock(&summon).id().as_str(), "hero_a_summon_2");
        assert_eq!(manager.get_summons(&EntityId::from("hero")).len(), 2);
    }

    #[test]
    fn test_concurrent_creation_respects_limit() {
        for _ in 0..20 {
            let (bus, manager) = setup();
            let created = recorder(&bus, names::SUMMON_CREATED);
            let hero = Combatant::new(Stats::new("hero")).shared();
            let barrier = std::sync::Barrier::new(8);

            let granted: usize = std::thread::scope(|scope| {
                let handles: Vec<_> = (0..8)
                    .map(|_| {
                        scope.spawn(|| {
                            barrier.wait();
                            manager
                                .create_summon(&hero, SummonRequest::new("a", "card"), &mut always_match())
                                .is_some() as usize
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).sum()
            });

            assert_eq!(granted, 1);
            assert_eq!(manager.get_summons(&EntityId::from("hero")).len(), 1);
            assert_eq!(created.lock().unwrap().len(), 1);
        }
    }

    #[test]
    fn test_summons_cannot_summon() {
        let (_bus, manager) = setup();
        let hero = Combatant::new(Stats::new("hero")).shared();
        let mut rng = always_match();
        let summon = manager
            .create_summon(&hero, SummonRequest::new("a", "card"), &mut rng)
            .unwrap();
        assert!(manager
            .create_summon(&summon, SummonRequest::new("b", "card"), &mut rng)
            .is_none());
    }

    #[test]
    fn test_damage_type_override() {
        let (_bus, manager) = setup();
        let hero = Combatant::new(Stats::new("hero").with_damage_type(DamageType::Fire)).shared();
        let request = SummonRequest::new("a", "card").with_damage_type(DamageType::Ice);
        let summon = manager.create_summon(&hero, request, &mut always_match()).unwrap();
        assert_eq!(lock(&summon).stats.damage_type, DamageType::Ice);
    }

    #[test]
    fn test_dots_never_inherited() {
        let (_bus, manager) = setup();
        let hero = Combatant::new(Stats::new("hero")).shared();
        lock(&hero).add_dot(DamageOverTime::new("burn", "Burn", 10, 3), None);

        let summon = manager
            .create_summon(&hero, SummonRequest::new("a", "card"), &mut always_match())
            .unwrap();
        assert!(lock(&summon).effects.dots().is_empty());
    }

    #[test]
    fn test_battle_end_removes_temporary_only() {
        let (bus, manager) = setup();
        let removed = recorder(&bus, names::SUMMON_REMOVED);
        let a = Combatant::new(Stats::new("a")).shared();
        let b = Combatant::new(Stats::new("b")).shared();
        let mut rng = always_match();
        manager.create_summon(&a, SummonRequest::new("x", "card"), &mut rng);
        manager.create_summon(&b, SummonRequest::new("x", "relic").permanent(), &mut rng);

        bus.emit(&Event::new(names::BATTLE_END));

        assert!(manager.get_summons(&EntityId::from("a")).is_empty());
        assert_eq!(manager.get_summons(&EntityId::from("b")).len(), 1);
        let removed = removed.lock().unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].detail_str("reason"), Some("battle_end"));
    }

    #[test]
    fn test_turn_start_expires_limited_summons() {
        let (bus, manager) = setup();
        let hero = Combatant::new(Stats::new("hero")).shared();
        let request = SummonRequest::new("x", "card").lasting(2).with_max_summons(2);
        manager.create_summon(&hero, request, &mut always_match());
        manager.create_summon(&hero, SummonRequest::new("y", "card").with_max_summons(2), &mut always_match());
        let turn = Event::new(names::TURN_START).for_entity(&EntityId::from("hero"));

        bus.emit(&turn);
        assert_eq!(manager.get_summons(&EntityId::from("hero")).len(), 2);
        bus.emit(&turn);
        let left = manager.get_summons(&EntityId::from("hero"));
        assert_eq!(left.len(), 1);
        assert_eq!(lock(&left[0]).id().as_str(), "hero_y_summon");

        // another entity's turn does not count down
        bus.emit(&Event::new(names::TURN_START).for_entity(&EntityId::from("foe")));
        assert_eq!(manager.get_summons(&EntityId::from("hero")).len(), 1);
    }

    #[test]
    fn test_summoner_defeat_removes_summons() {
        let (bus, manager) = setup();
        let hero = Combatant::new(Stats::new("hero")).shared();
        let summon = manager
            .create_summon(&hero, SummonRequest::new("x", "card"), &mut always_match())
            .unwrap();
        lock(&summon).add_hot(crate::effects::HealingOverTime::new("regen", "Regen", 5, 3));

        bus.emit(&Event::new(names::ENTITY_DEFEAT).for_entity(&EntityId::from("hero")));

        assert!(manager.get_all_summons().is_empty());
        assert!(lock(&summon).effects.is_empty());
    }

    #[test]
    fn test_killed_summon_notifies_summoner() {
        let (bus, manager) = setup();
        let defeated = recorder(&bus, names::SUMMON_DEFEATED);
        let hero = Combatant::new(Stats::new("hero")).shared();
        manager.create_summon(&hero, SummonRequest::new("x", "card"), &mut always_match());

        bus.emit(&Event::new(names::ENTITY_KILLED).for_entity(&EntityId::from("hero_x_summon")));
        // killing a non-summon changes nothing
        bus.emit(&Event::new(names::ENTITY_KILLED).for_entity(&EntityId::from("hero")));

        assert!(manager.get_all_summons().is_empty());
        let defeated = defeated.lock().unwrap();
        assert_eq!(defeated.len(), 1);
        assert_eq!(defeated[0].entity, Some(EntityId::from("hero")));
    }

    #[test]
    fn test_add_summons_to_party() {
        let (_bus, manager) = setup();
        let hero = Combatant::new(Stats::new("hero")).shared();
        let stranger = Combatant::new(Stats::new("stranger")).shared();
        let mut rng = always_match();
        manager.create_summon(&hero, SummonRequest::new("x", "card"), &mut rng);
        manager.create_summon(&stranger, SummonRequest::new("x", "card"), &mut rng);

        let mut party = Party::from_members(vec![Arc::clone(&hero)]);
        assert_eq!(manager.add_summons_to_party(&mut party), 1);
        assert_eq!(manager.add_summons_to_party(&mut party), 0);
        assert!(party.contains(&EntityId::from("hero_x_summon")));
        assert!(!party.contains(&EntityId::from("stranger_x_summon")));
    }

    #[test]
    fn test_viability() {
        let mut summon = Combatant::new(Stats::new("s").with_base(MAX_HP, 100.0));
        summon.summon = Some(SummonInfo {
            summoner_id: EntityId::from("hero"),
            summon_type: "x".to_string(),
            summon_source: "card".to_string(),
            is_temporary: true,
            turns_remaining: 5,
        });
        assert!(SummonManager::evaluate_viability(&summon, 0.25).viable);

        summon.stats.hp = 20;
        let low = SummonManager::evaluate_viability(&summon, 0.25);
        assert!(!low.viable);
        assert!(!low.health_good);

        summon.stats.hp = 100;
        summon.summon.as_mut().unwrap().turns_remaining = 2;
        assert!(SummonManager::evaluate_viability(&summon, 0.25).expiring_soon);

        summon.stats.hp = 0;
        assert!(!SummonManager::evaluate_viability(&summon, 0.25).viable);
    }

    #[test]
    fn test_should_resummon() {
        let (_bus, manager) = setup();
        let hero = Combatant::new(Stats::new("hero")).shared();
        let hero_id = EntityId::from("hero");
        assert!(manager.should_resummon(&hero_id).should_resummon);

        let summon = manager
            .create_summon(&hero, SummonRequest::new("x", "card"), &mut always_match())
            .unwrap();
        let decision = manager.should_resummon(&hero_id);
        assert!(!decision.should_resummon);
        assert_eq!(decision.viable_count, 1);

        lock(&summon).stats.hp = 10;
        let decision = manager.should_resummon(&hero_id);
        assert!(decision.should_resummon);
        assert_eq!(decision.reason, "Existing summons have low health");
    }

    #[test]
    fn test_detach_and_reset() {
        let (bus, manager) = setup();
        assert_eq!(bus.subscriber_count(names::BATTLE_END), 1);
        manager.attach();
        assert_eq!(bus.subscriber_count(names::BATTLE_END), 1);

        let hero = Combatant::new(Stats::new("hero")).shared();
        manager.create_summon(&hero, SummonRequest::new("x", "card"), &mut always_match());
        assert_eq!(manager.detach(), 5);
        bus.emit(&Event::new(names::BATTLE_END));
        assert_eq!(manager.get_all_summons().len(), 1);

        manager.reset();
        assert!(manager.get_all_summons().is_empty());
    }

    #[test]
    fn test_handlers_stop_when_manager_dropped() {
        let (bus, manager) = setup();
        drop(manager);
        bus.emit(&Event::new(names::BATTLE_END));
        assert_eq!(bus.subscriber_count(names::BATTLE_END), 1);
    }
}
