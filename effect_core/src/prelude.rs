//! Prelude module for convenient imports
//!
//! ```rust
//! use effect_core::prelude::*;
//! ```

// Entities
pub use crate::combatant::{lock, Combatant, Party, SharedCombatant};
pub use crate::stat_block::{StatEffect, Stats};
pub use crate::types::{AddOutcome, DamageType, EntityId};

// Effects
pub use crate::dot::{DamageOverTime, DotBehavior, DotRegistry};
pub use crate::effects::{create_stat_buff, EffectManager, HealingOverTime, StatModifier};

// Events
pub use crate::bus::{names, Event, EventBus, HandlerError, HandlerResult};

// Plugins
pub use crate::passive::{Passive, PassiveContext, PassiveRegistry};
pub use crate::source::{CriticalBoost, CriticalOverdrive, EffectSource};
pub use crate::summon::{SummonManager, SummonRequest};

// Session and config
pub use crate::config::EngineConfig;
pub use crate::session::BattleSession;
