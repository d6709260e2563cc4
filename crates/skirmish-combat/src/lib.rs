//! # Skirmish Combat
//!
//! Real-time combat resolution for Project Skirmish.
//!
//! This crate provides:
//! - Hitbox-based melee collision with at-most-once hits per swing
//! - A layered damage pipeline (combo, momentum, block, critical, backstab, riposte)
//! - Dodge, parry and block state machines gated by stamina
//! - Combo patterns and the momentum meter
//! - Timed status effects
//! - Boss phases, telegraphed abilities and minions
//! - [`CombatDirector`](director::CombatDirector), which owns one combat session
//!
//! Everything runs on a single thread from one `tick` per frame. Timers are
//! stored expiry timestamps read from an injected [`Clock`](skirmish_common::Clock).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod abilities;
pub mod boss;
pub mod combatant;
pub mod combo;
pub mod config;
pub mod damage;
pub mod defense;
pub mod director;
pub mod error;
pub mod events;
pub mod hitbox;
pub mod momentum;
pub mod status;
pub mod telegraph;
pub mod tick;
pub mod weapons;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::abilities::{AbilityCatalog, AbilityDef, AbilityKind};
    pub use crate::boss::{BossCommand, BossPhaseController, BossProfile, BossStatus, PhaseDef};
    pub use crate::combatant::{
        Combatant, CombatantProfile, CombatStats, Pose, PoseSource, SharedPose, Team,
    };
    pub use crate::combo::{ComboAction, ComboPattern, ComboTracker};
    pub use crate::config::CombatConfig;
    pub use crate::damage::{DamageOutcome, DamagePipeline, DamageReport};
    pub use crate::defense::{DefenseRejection, DefenseState, DefenseStateMachine, Stamina};
    pub use crate::director::CombatDirector;
    pub use crate::error::{CombatError, CombatResult};
    pub use crate::events::{CombatEvent, EventSink, NullSink, RecordingSink};
    pub use crate::hitbox::{Hitbox, HitboxResolver};
    pub use crate::momentum::{Momentum, MomentumTier};
    pub use crate::status::{StatusEffectRegistry, StatusKind, StatusSnapshot};
    pub use crate::telegraph::{Telegraph, TelegraphScheduler};
    pub use crate::tick::Tickable;
    pub use crate::weapons::{AttackType, WeaponCatalog, WeaponTemplate, WeaponType};
}

pub use prelude::*;
