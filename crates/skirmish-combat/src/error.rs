//! Error types for the combat core.
//!
//! Errors never escape the per-tick loop: the director turns them into a
//! log line and a `None`/`false` return at the public boundary.

use skirmish_common::CombatantId;
use std::path::PathBuf;
use thiserror::Error;

/// Combat system error types.
#[derive(Debug, Error)]
pub enum CombatError {
    /// Weapon template not in the catalog
    #[error("unknown weapon template: {0}")]
    UnknownWeapon(String),

    /// Boss ability not in the catalog
    #[error("unknown boss ability: {0}")]
    UnknownAbility(String),

    /// Boss profile not in the configuration
    #[error("unknown boss profile: {0}")]
    UnknownBossProfile(String),

    /// Combatant is not registered
    #[error("combatant not registered: {0}")]
    UnknownCombatant(CombatantId),

    /// Combatant id already in use
    #[error("combatant already registered: {0}")]
    DuplicateCombatant(CombatantId),

    /// Boss already has an outstanding telegraph
    #[error("telegraph already pending for boss {0}")]
    TelegraphPending(CombatantId),

    /// Configuration failed validation
    #[error("invalid combat config: {0}")]
    InvalidConfig(String),

    /// Failed to read a configuration file
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// File that could not be read
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration TOML
    #[error("failed to parse config TOML: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Failed to serialize configuration TOML
    #[error("failed to serialize config TOML: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Failed to write a configuration file
    #[error("failed to write config: {0}")]
    ConfigWrite(#[from] std::io::Error),
}

/// Result type for combat operations.
pub type CombatResult<T> = Result<T, CombatError>;
