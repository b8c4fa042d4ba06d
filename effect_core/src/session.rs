//! BattleSession - one battle's bus, registries and publication rules
//!
//! Entities queue events while locked; the session publishes them only after
//! every lock it took has been released, so subscribers are free to lock any
//! entity they like.

use crate::bus::{names, Event, EventBus, HandlerResult, Subscription};
use crate::combatant::{lock, Combatant, EntitySnapshot, Party, SharedCombatant};
use crate::config::{ConfigError, EngineConfig};
use crate::dot::DotRegistry;
use crate::effects::{EffectManager, TickReport};
use crate::passive::PassiveRegistry;
use crate::source::EffectSource;
use crate::stat_block::{DiminishingReturns, Stats};
use crate::summon::SummonManager;
use std::sync::{Arc, MutexGuard, Weak};
use tracing::{debug, info};

/// Owns the services a battle needs and wires them together
#[derive(Debug)]
pub struct BattleSession {
    config: EngineConfig,
    bus: Arc<EventBus>,
    summons: SummonManager,
    passives: Arc<PassiveRegistry>,
    dots: Arc<DotRegistry>,
    curves: Arc<DiminishingReturns>,
    passive_subscriptions: Vec<Subscription>,
}

impl BattleSession {
    /// Build a session from validated configuration
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let curves = Arc::new(DiminishingReturns::from_config(&config.diminishing)?);
        let bus = Arc::new(EventBus::with_config(&config.bus));
        let summons = SummonManager::new(Arc::clone(&bus), config.summons.clone());
        summons.attach();
        Ok(BattleSession {
            config,
            bus,
            summons,
            passives: Arc::new(PassiveRegistry::with_builtins()),
            dots: Arc::new(DotRegistry::with_defaults()),
            curves,
            passive_subscriptions: Vec::new(),
        })
    }

    pub fn with_passives(mut self, passives: PassiveRegistry) -> Self {
        self.passives = Arc::new(passives);
        self
    }

    pub fn with_dot_registry(mut self, dots: DotRegistry) -> Self {
        self.dots = Arc::new(dots);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn summons(&self) -> &SummonManager {
        &self.summons
    }

    pub fn passives(&self) -> &PassiveRegistry {
        &self.passives
    }

    pub fn dot_registry(&self) -> &DotRegistry {
        &self.dots
    }

    /// Wrap `stats` as a combatant using this session's curves and settings
    pub fn combatant(&self, mut stats: Stats) -> SharedCombatant {
        stats.set_curves(Arc::clone(&self.curves));
        Combatant::new(stats)
            .with_effects(EffectManager::with_config(&self.config.effects))
            .shared()
    }

    /// Rebuild a saved combatant under this session's curves and settings
    pub fn restore(&self, snapshot: EntitySnapshot) -> SharedCombatant {
        Combatant::restore_with(snapshot, Arc::clone(&self.curves), &self.config.effects).shared()
    }

    /// Drop every subscription and tracked summon, for a fresh session
    pub fn reset(&mut self) {
        self.summons.detach();
        self.bus.clear();
        self.summons.reset();
        self.summons.attach();
        self.passive_subscriptions.clear();
        debug!("battle session reset");
    }

    // === Publication ===

    /// Publish whatever `entity` has queued. The caller must not hold its lock.
    pub fn flush(&self, entity: &SharedCombatant) -> usize {
        let events = lock(entity).stats.take_events();
        let published = events.len();
        self.bus.emit_all(events);
        published
    }

    /// [`flush`](Self::flush), awaiting async subscribers for each event
    pub async fn flush_async(&self, entity: &SharedCombatant) -> usize {
        let events = lock(entity).stats.take_events();
        for event in &events {
            self.bus.emit_async(event).await;
        }
        events.len()
    }

    // === Turn processing ===

    /// Tick `entity`'s effects, with `others` as its allies for spreading
    ///
    /// Locks are taken in address order and all released before any event is
    /// published. A bearer killed by its effects is announced as
    /// `entity_killed`.
    pub fn tick(&self, entity: &SharedCombatant, others: &[SharedCombatant]) -> TickReport {
        let mut members: Vec<&SharedCombatant> = others
            .iter()
            .filter(|o| !Arc::ptr_eq(o, entity))
            .collect();
        members.push(entity);
        members.sort_by_key(|m| Arc::as_ptr(m) as usize);
        members.dedup_by(|a, b| Arc::ptr_eq(*a, *b));

        let (report, died, events) = {
            let mut guards: Vec<MutexGuard<'_, Combatant>> = members.iter().map(|m| lock(m)).collect();
            let Some(pos) = members.iter().position(|m| Arc::ptr_eq(m, entity)) else {
                return TickReport::default();
            };
            let mut target = guards.remove(pos);
            let was_alive = target.stats.is_alive();
            let report = {
                let mut allies: Vec<&mut Combatant> = guards.iter_mut().map(|g| &mut **g).collect();
                target.tick(&mut allies)
            };
            let died = was_alive && !target.stats.is_alive();
            let mut events = target.stats.take_events();
            if died {
                events.push(Event::new(names::ENTITY_KILLED).for_entity(target.id()));
            }
            for guard in guards.iter_mut() {
                events.extend(guard.stats.take_events());
            }
            (report, died, events)
        };

        if died {
            debug!(spread = report.spread, "bearer killed by its effects");
        }
        self.bus.emit_all(events);
        report
    }

    /// Cancel every effect on `entity` and announce its defeat
    pub fn defeat(&self, entity: &SharedCombatant) {
        let (id, events) = {
            let mut combatant = lock(entity);
            combatant.cleanup();
            (combatant.id().clone(), combatant.stats.take_events())
        };
        info!(entity = %id, "entity defeated");
        self.bus.emit_all(events);
        self.bus.emit(&Event::new(names::ENTITY_DEFEAT).for_entity(&id));
    }

    // === Battle lifecycle ===

    /// Bring tracked summons into `party` and announce the battle
    pub fn start_battle(&self, party: &mut Party) -> usize {
        let added = self.summons.add_summons_to_party(party);
        self.bus.emit(&Event::new(names::BATTLE_START));
        added
    }

    /// Announce the end of the battle, then clear every member's effects
    pub fn end_battle(&self, party: &Party) {
        self.bus.emit(&Event::new(names::BATTLE_END));
        for member in &party.members {
            lock(member).cleanup();
            self.flush(member);
        }
    }

    pub fn attach_source(&self, source: &dyn EffectSource, party: &Party) -> Vec<Subscription> {
        let subscriptions = source.attach(party, &self.bus);
        debug!(source = source.id(), subscriptions = subscriptions.len(), "attached effect source");
        subscriptions
    }

    // === Passive wiring ===

    /// Route passive-relevant events to the passives of `roster`
    ///
    /// Events naming an entity reach that entity only; events without one
    /// (battle start and end) reach everyone. Counter attacks are resolved
    /// against the roster too. Returns the number of subscriptions made.
    pub fn wire_passives(&mut self, roster: &Party) -> usize {
        self.unwire_passives();

        for event in self.passives.trigger_events() {
            let registry = Arc::clone(&self.passives);
            let roster = roster.clone();
            let weak_bus: Weak<EventBus> = Arc::downgrade(&self.bus);
            let id = self.bus.subscribe(event, "passive_registry", move |e: &Event| -> HandlerResult {
                let targets: Vec<SharedCombatant> = match &e.entity {
                    Some(id) => roster.find(id).into_iter().collect(),
                    None => roster.members.clone(),
                };
                for target in &targets {
                    let events = {
                        let mut combatant = lock(target);
                        registry.trigger_event(&mut combatant, e);
                        combatant.stats.take_events()
                    };
                    if let Some(bus) = weak_bus.upgrade() {
                        bus.emit_all(events);
                    }
                }
                Ok(())
            });
            self.passive_subscriptions.push(Subscription {
                event: event.to_string(),
                id,
            });
        }

        let roster = roster.clone();
        let weak_bus: Weak<EventBus> = Arc::downgrade(&self.bus);
        let id = self.bus.subscribe(names::COUNTER_ATTACK, "counter_resolver", move |e: &Event| {
            let (Some(attacker), Some(target)) = (&e.entity, &e.other) else {
                return Ok(());
            };
            let Some(target) = roster.find(target) else {
                return Ok(());
            };
            let events = {
                let mut combatant = lock(&target);
                combatant
                    .stats
                    .apply_damage(e.amount.unwrap_or(0) as f64, Some(attacker));
                combatant.stats.take_events()
            };
            if let Some(bus) = weak_bus.upgrade() {
                bus.emit_all(events);
            }
            Ok(())
        });
        self.passive_subscriptions.push(Subscription {
            event: names::COUNTER_ATTACK.to_string(),
            id,
        });

        self.passive_subscriptions.len()
    }

    pub fn unwire_passives(&mut self) -> usize {
        let subscriptions = std::mem::take(&mut self.passive_subscriptions);
        self.bus.unsubscribe_all(&subscriptions)
    }
}
