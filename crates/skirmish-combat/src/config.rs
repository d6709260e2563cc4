//! Combat configuration.
//!
//! Every tunable constant of the combat core lives in [`CombatConfig`].
//! Sections default individually, so a TOML file only needs to name the
//! values it overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::abilities::{default_abilities, AbilityCatalog, AbilityDef};
use crate::boss::{default_boss_profiles, BossProfile};
use crate::combo::{default_patterns, ComboPattern};
use crate::error::{CombatError, CombatResult};
use crate::weapons::{default_weapons, is_extent, AttackType, WeaponTemplate, WeaponType};

/// Per-weapon-type damage multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponTypeMultipliers {
    /// Unarmed.
    pub fists: f32,
    /// Dagger.
    pub dagger: f32,
    /// Sword.
    pub sword: f32,
    /// Axe.
    pub axe: f32,
    /// Spear.
    pub spear: f32,
    /// Greatsword.
    pub greatsword: f32,
    /// Boss claw.
    pub boss_claw: f32,
}

impl Default for WeaponTypeMultipliers {
    fn default() -> Self {
        Self {
            fists: 0.6,
            dagger: 0.8,
            sword: 1.0,
            axe: 1.2,
            spear: 1.1,
            greatsword: 1.4,
            boss_claw: 1.0,
        }
    }
}

impl WeaponTypeMultipliers {
    /// Multiplier for a weapon type.
    #[must_use]
    pub fn for_type(&self, weapon_type: WeaponType) -> f32 {
        match weapon_type {
            WeaponType::Fists => self.fists,
            WeaponType::Dagger => self.dagger,
            WeaponType::Sword => self.sword,
            WeaponType::Axe => self.axe,
            WeaponType::Spear => self.spear,
            WeaponType::Greatsword => self.greatsword,
            WeaponType::BossClaw => self.boss_claw,
        }
    }
}

/// Per-attack-type damage multipliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackTypeMultipliers {
    /// Light attacks.
    pub light: f32,
    /// Heavy attacks.
    pub heavy: f32,
    /// Boss telegraph resolution.
    pub telegraph: f32,
}

impl Default for AttackTypeMultipliers {
    fn default() -> Self {
        Self {
            light: 1.0,
            heavy: 1.5,
            telegraph: 2.0,
        }
    }
}

impl AttackTypeMultipliers {
    /// Multiplier for an attack type.
    #[must_use]
    pub fn for_type(&self, attack_type: AttackType) -> f32 {
        match attack_type {
            AttackType::Light => self.light,
            AttackType::Heavy => self.heavy,
            AttackType::Telegraph => self.telegraph,
        }
    }
}

/// Damage formula constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageConfig {
    /// Critical hit multiplier.
    pub crit_multiplier: f32,
    /// Base critical chance before weapon and combatant bonuses.
    pub base_crit_chance: f32,
    /// Damage bonus per combo step.
    pub combo_bonus_per_hit: f32,
    /// Momentum is divided by this to get its damage bonus.
    pub momentum_divisor: f32,
    /// Fraction of damage removed by a frontal block.
    pub block_reduction: f32,
    /// Minimum facing dot for a block to cover the attacker.
    pub block_arc_dot: f32,
    /// Backstab multiplier.
    pub backstab_multiplier: f32,
    /// Minimum rear-facing dot for a backstab.
    pub backstab_dot: f32,
    /// Riposte counter multiplier.
    pub counter_multiplier: f32,
    /// Weapon type multipliers.
    pub weapon_types: WeaponTypeMultipliers,
    /// Attack type multipliers.
    pub attack_types: AttackTypeMultipliers,
}

impl Default for DamageConfig {
    fn default() -> Self {
        Self {
            crit_multiplier: 2.0,
            base_crit_chance: 0.05,
            combo_bonus_per_hit: 0.05,
            momentum_divisor: 200.0,
            block_reduction: 0.7,
            block_arc_dot: 0.5,
            backstab_multiplier: 1.5,
            backstab_dot: 0.5,
            counter_multiplier: 2.0,
            weapon_types: WeaponTypeMultipliers::default(),
            attack_types: AttackTypeMultipliers::default(),
        }
    }
}

/// Dodge, parry, block and stamina constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefenseConfig {
    /// Stamina cost of a dodge.
    pub dodge_cost: f32,
    /// Dodge duration (ms).
    pub dodge_duration_ms: u64,
    /// Leading fraction of the dodge that is invulnerable.
    pub dodge_iframe_fraction: f32,
    /// Distance covered by a dodge.
    pub dodge_distance: f32,
    /// Cooldown after a dodge ends (ms).
    pub dodge_cooldown_ms: u64,
    /// Stamina cost of a parry.
    pub parry_cost: f32,
    /// Active parry window (ms).
    pub parry_window_ms: u64,
    /// Recovery after the parry window (ms).
    pub parry_recovery_ms: u64,
    /// Cooldown after a parry ends (ms).
    pub parry_cooldown_ms: u64,
    /// Stun applied to a parried attacker (ms).
    pub parry_stun_ms: u64,
    /// Riposte window opened by a parry (ms).
    pub riposte_window_ms: u64,
    /// Stamina drained per second while blocking.
    pub block_drain_per_sec: f32,
    /// Stamina lost per blocked hit.
    pub block_hit_stamina_cost: f32,
    /// Window after raising a block in which a blocked hit is perfect (ms).
    pub perfect_block_window_ms: u64,
    /// Stamina regenerated per second while neutral.
    pub stamina_regen_per_sec: f32,
}

impl Default for DefenseConfig {
    fn default() -> Self {
        Self {
            dodge_cost: 20.0,
            dodge_duration_ms: 400,
            dodge_iframe_fraction: 0.6,
            dodge_distance: 4.0,
            dodge_cooldown_ms: 600,
            parry_cost: 15.0,
            parry_window_ms: 200,
            parry_recovery_ms: 250,
            parry_cooldown_ms: 800,
            parry_stun_ms: 1000,
            riposte_window_ms: 1500,
            block_drain_per_sec: 10.0,
            block_hit_stamina_cost: 10.0,
            perfect_block_window_ms: 150,
            stamina_regen_per_sec: 15.0,
        }
    }
}

/// Combo window and patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComboConfig {
    /// Maximum gap between actions that keeps a combo alive (ms).
    pub window_ms: u64,
    /// Registered patterns.
    pub patterns: Vec<ComboPattern>,
}

impl Default for ComboConfig {
    fn default() -> Self {
        Self {
            window_ms: 1000,
            patterns: default_patterns(),
        }
    }
}

/// Momentum gains, decay and tier buffs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    /// Gain per landed hit.
    pub gain_hit: f32,
    /// Extra gain per critical hit.
    pub gain_crit: f32,
    /// Gain per completed combo.
    pub gain_combo: f32,
    /// Gain per dodge.
    pub gain_dodge: f32,
    /// Gain per perfect block.
    pub gain_perfect_block: f32,
    /// Linear decay per second.
    pub decay_per_sec: f32,
    /// Attack speed multiplier at the Flow tier.
    pub flow_attack_speed: f32,
    /// Damage multiplier at the Fury tier.
    pub fury_damage: f32,
    /// Critical chance multiplier at the Frenzy tier.
    pub frenzy_crit: f32,
    /// Invulnerability granted on reaching Peak (ms).
    pub peak_invulnerability_ms: u64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            gain_hit: 5.0,
            gain_crit: 8.0,
            gain_combo: 15.0,
            gain_dodge: 4.0,
            gain_perfect_block: 10.0,
            decay_per_sec: 5.0,
            flow_attack_speed: 1.2,
            fury_damage: 1.15,
            frenzy_crit: 1.5,
            peak_invulnerability_ms: 1000,
        }
    }
}

/// Status effect limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Stack cap per effect.
    pub max_stacks: u32,
    /// Upper bound on slow strength.
    pub slow_cap: f32,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            max_stacks: 3,
            slow_cap: 0.9,
        }
    }
}

/// Complete combat configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Seed for critical rolls and ability selection.
    pub rng_seed: u64,
    /// Damage formula.
    pub damage: DamageConfig,
    /// Defense state machine.
    pub defense: DefenseConfig,
    /// Combo tracking.
    pub combo: ComboConfig,
    /// Momentum.
    pub momentum: MomentumConfig,
    /// Status effects.
    pub status: StatusConfig,
    /// Weapon templates.
    pub weapons: Vec<WeaponTemplate>,
    /// Boss abilities.
    pub abilities: Vec<AbilityDef>,
    /// Boss profiles.
    pub bosses: Vec<BossProfile>,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            rng_seed: 0x5EED_C0DE,
            damage: DamageConfig::default(),
            defense: DefenseConfig::default(),
            combo: ComboConfig::default(),
            momentum: MomentumConfig::default(),
            status: StatusConfig::default(),
            weapons: default_weapons(),
            abilities: default_abilities(),
            bosses: default_boss_profiles(),
        }
    }
}

impl CombatConfig {
    /// Load configuration from a file, falling back to defaults if the file
    /// is missing, unreadable or invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Combat config {} not found, using defaults", path.display());
            return Self::default();
        }

        match Self::try_load_from(path) {
            Ok(config) => {
                info!("Loaded combat config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("{e}; using default combat config");
                Self::default()
            },
        }
    }

    /// Load and validate configuration from a file.
    pub fn try_load_from<P: AsRef<Path>>(path: P) -> CombatResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| CombatError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> CombatResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML text.
    pub fn to_toml_string(&self) -> CombatResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> CombatResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.to_toml_string()?)?;
        info!("Saved combat config to {}", path.display());
        Ok(())
    }

    /// Check ranges and cross-references.
    pub fn validate(&self) -> CombatResult<()> {
        let d = &self.damage;
        check(d.crit_multiplier >= 1.0, "damage.crit_multiplier must be >= 1")?;
        check(
            (0.0..=1.0).contains(&d.base_crit_chance),
            "damage.base_crit_chance must be within [0, 1]",
        )?;
        check(d.momentum_divisor > 0.0, "damage.momentum_divisor must be > 0")?;
        check(
            (0.0..=1.0).contains(&d.block_reduction),
            "damage.block_reduction must be within [0, 1]",
        )?;

        let def = &self.defense;
        check(
            (0.0..=1.0).contains(&def.dodge_iframe_fraction),
            "defense.dodge_iframe_fraction must be within [0, 1]",
        )?;
        check(def.dodge_duration_ms > 0, "defense.dodge_duration_ms must be > 0")?;
        check(
            def.dodge_cost >= 0.0 && def.parry_cost >= 0.0,
            "defense costs must not be negative",
        )?;

        check(self.combo.window_ms > 0, "combo.window_ms must be > 0")?;
        for pattern in &self.combo.patterns {
            check(
                !pattern.sequence.is_empty(),
                &format!("combo pattern '{}' has no actions", pattern.name),
            )?;
        }

        check(self.status.max_stacks >= 1, "status.max_stacks must be >= 1")?;
        check(
            (0.0..1.0).contains(&self.status.slow_cap),
            "status.slow_cap must be within [0, 1)",
        )?;

        for weapon in &self.weapons {
            check(
                weapon.duration_ms > 0,
                &format!("weapon '{}' has zero hitbox duration", weapon.name),
            )?;
            check(
                weapon.shape.is_well_formed() && weapon.offset.is_finite(),
                &format!("weapon '{}' has a negative or non-finite hitbox extent", weapon.name),
            )?;
        }
        for ability in &self.abilities {
            check(
                ability.kind.is_well_formed() && is_extent(ability.knockback),
                &format!("ability '{}' has a negative or non-finite area", ability.name),
            )?;
        }

        let abilities = AbilityCatalog::new(self.abilities.iter().cloned());
        for boss in &self.bosses {
            boss.validate(&abilities)?;
        }

        Ok(())
    }

    /// Look up a boss profile by name.
    pub fn boss_profile(&self, name: &str) -> CombatResult<&BossProfile> {
        self.bosses
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| CombatError::UnknownBossProfile(name.to_string()))
    }
}

fn check(ok: bool, message: &str) -> CombatResult<()> {
    if ok {
        Ok(())
    } else {
        Err(CombatError::InvalidConfig(message.to_string()))
    }
}
