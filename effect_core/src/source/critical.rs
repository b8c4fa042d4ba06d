//! Critical Boost and the Critical Overdrive card that feeds on it

use super::EffectSource;
use crate::bus::{names, Event, EventBus, HandlerResult, Subscription};
use crate::combatant::{lock, Party, SharedCombatant};
use crate::effects::StatModifier;
use crate::stat_block::{StatEffect, ATK, CRIT_DAMAGE, CRIT_RATE};
use crate::types::EntityId;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

fn critical_boost_change(entity: &EntityId, stacks: u32) -> Event {
    Event::new(names::CRITICAL_BOOST_CHANGE)
        .for_entity(entity)
        .with_amount(i64::from(stacks))
}

#[derive(Debug, Default)]
struct BoostState {
    stacks: u32,
    subscription: Option<Subscription>,
}

/// Stacking crit buff on one entity, lost the moment the bearer is hurt
///
/// Every change in stacks is announced as `critical_boost_change` with the
/// new count as the amount.
#[derive(Debug, Clone)]
pub struct CriticalBoost {
    target: SharedCombatant,
    target_id: EntityId,
    state: Arc<Mutex<BoostState>>,
    pub crit_rate_per_stack: f64,
    pub crit_damage_per_stack: f64,
}

impl CriticalBoost {
    pub const ID: &'static str = "critical_boost";

    pub fn new(target: &SharedCombatant) -> Self {
        let target_id = lock(target).id().clone();
        CriticalBoost {
            target: Arc::clone(target),
            target_id,
            state: Arc::new(Mutex::new(BoostState::default())),
            crit_rate_per_stack: 0.005,
            crit_damage_per_stack: 0.05,
        }
    }

    fn state(&self) -> MutexGuard<'_, BoostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stacks(&self) -> u32 {
        self.state().stacks
    }

    /// Add one stack, returning the new count
    ///
    /// The caller must not hold the target's lock.
    pub fn apply(&self, bus: &Arc<EventBus>) -> u32 {
        self.subscribe(bus);
        let stacks = {
            let mut state = self.state();
            state.stacks += 1;
            state.stacks
        };
        let n = f64::from(stacks);
        lock(&self.target).stats.add_effect(
            StatEffect::new(Self::ID, Self::ID)
                .with_modifier(CRIT_RATE, self.crit_rate_per_stack * n)
                .with_modifier(CRIT_DAMAGE, self.crit_damage_per_stack * n),
        );
        bus.emit(&critical_boost_change(&self.target_id, stacks));
        stacks
    }

    /// Listen for the bearer taking damage, once
    fn subscribe(&self, bus: &Arc<EventBus>) -> Subscription {
        if let Some(existing) = &self.state().subscription {
            return existing.clone();
        }
        let target = Arc::clone(&self.target);
        let target_id = self.target_id.clone();
        let state = Arc::clone(&self.state);
        let weak_bus: Weak<EventBus> = Arc::downgrade(bus);

        let id = bus.subscribe(names::DAMAGE_TAKEN, Self::ID, move |e: &Event| -> HandlerResult {
            if !e.is_about(&target_id) {
                return Ok(());
            }
            let subscription = {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if state.stacks == 0 {
                    return Ok(());
                }
                state.stacks = 0;
                state.subscription.take()
            };
            lock(&target).stats.remove_effect_by_name(CriticalBoost::ID);
            debug!(entity = %target_id, "critical boost lost");
            if let Some(bus) = weak_bus.upgrade() {
                bus.emit(&critical_boost_change(&target_id, 0));
                if let Some(subscription) = subscription {
                    bus.unsubscribe(&subscription.event, subscription.id);
                }
            }
            Ok(())
        });
        let subscription = Subscription {
            event: names::DAMAGE_TAKEN.to_string(),
            id,
        };
        self.state().subscription = Some(subscription.clone());
        subscription
    }
}

impl EffectSource for CriticalBoost {
    fn id(&self) -> &str {
        Self::ID
    }

    fn attach(&self, _party: &Party, bus: &Arc<EventBus>) -> Vec<Subscription> {
        vec![self.subscribe(bus)]
    }
}

/// Card: big atk bonus, plus crit for any member holding Critical Boost
///
/// Crit rate pushed past 100% turns into crit damage at 2:1. Everything the
/// card added, and both subscriptions, go away when the battle ends.
#[derive(Debug, Clone)]
pub struct CriticalOverdrive {
    pub atk_bonus: f64,
    pub extra_crit_rate: f64,
}

impl Default for CriticalOverdrive {
    fn default() -> Self {
        CriticalOverdrive {
            atk_bonus: 2.55,
            extra_crit_rate: 0.10,
        }
    }
}

impl CriticalOverdrive {
    pub const ID: &'static str = "critical_overdrive";
    const NAME: &'static str = "Critical Overdrive";
    /// Lasts until removed at battle end
    const MODIFIER_TURNS: i32 = 9999;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn modifier_id(entity: &EntityId) -> String {
        format!("{}_{}", Self::ID, entity)
    }

    fn on_change(&self, party: &Party, event: &Event) {
        let Some(member) = event.entity.as_ref().and_then(|id| party.find(id)) else {
            return;
        };
        let stacks = event.amount.unwrap_or(0);
        let mut member = lock(&member);
        let modifier_id = Self::modifier_id(member.id());
        member.remove_modifier(&modifier_id);
        if stacks <= 0 {
            return;
        }
        let excess = (member.stats.crit_rate() + self.extra_crit_rate - 1.0).max(0.0);
        let mut modifier = StatModifier::new(modifier_id, Self::NAME, Self::MODIFIER_TURNS)
            .with_delta(CRIT_RATE, self.extra_crit_rate);
        if excess > 0.0 {
            modifier = modifier.with_delta(CRIT_DAMAGE, excess * 2.0);
        }
        member.add_modifier(modifier);
    }
}

impl EffectSource for CriticalOverdrive {
    fn id(&self) -> &str {
        Self::ID
    }

    fn attach(&self, party: &Party, bus: &Arc<EventBus>) -> Vec<Subscription> {
        for member in &party.members {
            lock(member).stats.add_effect(
                StatEffect::new(Self::ID, Self::ID).with_multiplier(ATK, 1.0 + self.atk_bonus),
            );
        }

        let owned: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        let card = self.clone();
        let roster = party.clone();
        let change = bus.subscribe(names::CRITICAL_BOOST_CHANGE, Self::ID, move |e: &Event| {
            card.on_change(&roster, e);
            Ok(())
        });

        let roster = party.clone();
        let teardown = Arc::clone(&owned);
        let weak_bus: Weak<EventBus> = Arc::downgrade(bus);
        let end = bus.subscribe(names::BATTLE_END, Self::ID, move |_: &Event| {
            for member in &roster.members {
                let mut member = lock(member);
                let modifier_id = Self::modifier_id(member.id());
                member.remove_modifier(&modifier_id);
                member.stats.remove_effect_by_name(Self::ID);
            }
            let subscriptions =
                std::mem::take(&mut *teardown.lock().unwrap_or_else(PoisonError::into_inner));
            if let Some(bus) = weak_bus.upgrade() {
                bus.unsubscribe_all(&subscriptions);
            }
            debug!(card = Self::ID, "torn down at battle end");
            Ok(())
        });

        let subscriptions = vec![
            Subscription {
                event: names::CRITICAL_BOOST_CHANGE.to_string(),
                id: change,
            },
            Subscription {
                event: names::BATTLE_END.to_string(),
                id: end,
            },
        ];
        *owned.lock().unwrap_or_else(PoisonError::into_inner) = subscriptions.clone();
        subscriptions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::Combatant;
    use crate::stat_block::Stats;

    fn hero() -> SharedCombatant {
        Combatant::new(Stats::new("hero")).shared()
    }

    fn changes(bus: &EventBus) -> Arc<Mutex<Vec<i64>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(names::CRITICAL_BOOST_CHANGE, "recorder", move |e: &Event| {
            sink.lock().unwrap().push(e.amount.unwrap_or(-1));
            Ok(())
        });
        seen
    }

    #[test]
    fn test_boost_stacks_and_clears_on_damage() {
        let bus = Arc::new(EventBus::new());
        let seen = changes(&bus);
        let hero = hero();
        let boost = CriticalBoost::new(&hero);

        boost.apply(&bus);
        boost.apply(&bus);
        assert_eq!(boost.stacks(), 2);
        assert!((lock(&hero).stats.crit_rate() - 0.06).abs() < 1e-9);
        assert!((lock(&hero).stats.crit_damage() - 2.1).abs() < 1e-9);
        assert_eq!(bus.subscriber_count(names::DAMAGE_TAKEN), 1);

        // someone else's damage is ignored
        bus.emit(&Event::new(names::DAMAGE_TAKEN).for_entity(&EntityId::from("foe")));
        assert_eq!(boost.stacks(), 2);

        bus.emit(&Event::new(names::DAMAGE_TAKEN).for_entity(&EntityId::from("hero")));
        assert_eq!(boost.stacks(), 0);
        assert!((lock(&hero).stats.crit_rate() - 0.05).abs() < 1e-9);
        assert_eq!(bus.subscriber_count(names::DAMAGE_TAKEN), 0);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn test_boost_resubscribes_after_clearing() {
        let bus = Arc::new(EventBus::new());
        let hero = hero();
        let boost = CriticalBoost::new(&hero);

        boost.apply(&bus);
        bus.emit(&Event::new(names::DAMAGE_TAKEN).for_entity(&EntityId::from("hero")));
        boost.apply(&bus);
        assert_eq!(boost.stacks(), 1);
        assert_eq!(bus.subscriber_count(names::DAMAGE_TAKEN), 1);
    }

    #[test]
    fn test_overdrive_follows_boost() {
        let bus = Arc::new(EventBus::new());
        let hero = hero();
        let party = Party::from_members(vec![Arc::clone(&hero)]);
        let card = CriticalOverdrive::new();
        let subscriptions = card.attach(&party, &bus);
        assert_eq!(subscriptions.len(), 2);
        assert!((lock(&hero).stats.current(ATK) - 710.0).abs() < 1e-9);

        let boost = CriticalBoost::new(&hero);
        boost.apply(&bus);
        let modifier_id = CriticalOverdrive::modifier_id(&EntityId::from("hero"));
        assert!(lock(&hero).stats.mods.contains(&modifier_id));

        bus.emit(&Event::new(names::DAMAGE_TAKEN).for_entity(&EntityId::from("hero")));
        assert!(!lock(&hero).stats.mods.contains(&modifier_id));
    }

    #[test]
    fn test_overdrive_ignores_outsiders() {
        let bus = Arc::new(EventBus::new());
        let hero = hero();
        let outsider = Combatant::new(Stats::new("outsider")).shared();
        let card = CriticalOverdrive::new();
        card.attach(&Party::from_members(vec![Arc::clone(&hero)]), &bus);

        CriticalBoost::new(&outsider).apply(&bus);
        assert!(lock(&outsider).stats.mods.is_empty());
    }

    #[test]
    fn test_overdrive_torn_down_at_battle_end() {
        let bus = Arc::new(EventBus::new());
        let hero = hero();
        let card = CriticalOverdrive::new();
        card.attach(&Party::from_members(vec![Arc::clone(&hero)]), &bus);
        CriticalBoost::new(&hero).apply(&bus);

        bus.emit(&Event::new(names::BATTLE_END));

        assert!(lock(&hero).stats.mods.is_empty());
        assert!((lock(&hero).stats.current(ATK) - 200.0).abs() < 1e-9);
        assert_eq!(bus.subscriber_count(names::CRITICAL_BOOST_CHANGE), 0);
        assert_eq!(bus.subscriber_count(names::BATTLE_END), 0);
    }

    #[test]
    fn test_detach() {
        let bus = Arc::new(EventBus::new());
        let card = CriticalOverdrive::new();
        let subscriptions = card.attach(&Party::from_members(vec![hero()]), &bus);
        assert_eq!(card.detach(&bus, &subscriptions), 2);
        assert_eq!(bus.subscriber_count(names::BATTLE_END), 0);
    }
}
