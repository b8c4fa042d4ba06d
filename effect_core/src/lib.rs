//! effect_core - Combat effect and stat-modification engine
//!
//! This library provides:
//! - Stats: Entity stat model with soft-capped buff scaling
//! - EffectManager: Per-entity DoTs, HoTs and timed stat modifiers
//! - EventBus: Named publish/subscribe channel between plugins
//! - PassiveRegistry: Event-triggered passive abilities
//! - SummonManager: Summon creation, inheritance and lifecycle
//! - BattleSession: Wiring of the above for one battle

pub mod bus;
pub mod combatant;
pub mod config;
pub mod dot;
pub mod effects;
pub mod passive;
pub mod prelude;
pub mod session;
pub mod source;
pub mod stat_block;
pub mod summon;
pub mod types;

// Re-export core types for convenience
pub use bus::{Event, EventBus, HandlerError, HandlerResult, Subscription, SubscriptionId};
pub use combatant::{Combatant, EntitySnapshot, Party, SharedCombatant, SummonInfo};
pub use config::{ConfigError, EngineConfig};
pub use dot::{DamageOverTime, DotBehavior, DotRegistry};
pub use effects::{EffectManager, HealingOverTime, StatModifier, TickReport};
pub use passive::{Passive, PassiveRegistry, StackDisplay};
pub use session::BattleSession;
pub use source::EffectSource;
pub use stat_block::{DiminishingReturns, StatEffect, Stats};
pub use summon::{SummonManager, SummonRequest};
pub use types::{AddOutcome, DamageType, EntityId};
