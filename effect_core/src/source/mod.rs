//! EffectSource - Plugins that react to bus events by producing effects
//!
//! Cards, relics and standalone effects all attach the same way: subscribe
//! handlers for a party, mutate members through their effect managers from
//! inside those handlers, and hand back the subscriptions so the owner can
//! tear them down.

mod critical;

pub use critical::{CriticalBoost, CriticalOverdrive};

use crate::bus::{EventBus, Subscription};
use crate::combatant::Party;
use std::sync::Arc;

/// Anything that hooks into the event bus on behalf of a party
pub trait EffectSource: Send + Sync {
    /// Unique identifier for this source
    fn id(&self) -> &str;

    /// Subscribe this source's handlers for `party`
    fn attach(&self, party: &Party, bus: &Arc<EventBus>) -> Vec<Subscription>;

    /// Undo [`attach`](Self::attach); returns how many subscriptions went
    fn detach(&self, bus: &EventBus, subscriptions: &[Subscription]) -> usize {
        bus.unsubscribe_all(subscriptions)
    }
}
