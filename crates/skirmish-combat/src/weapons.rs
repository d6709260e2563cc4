//! Weapon templates and attack types.
//!
//! This module provides:
//! - Weapon types and attack types used by the damage formula
//! - Hitbox shapes relative to the attacker's facing
//! - Named weapon templates and the catalog they are looked up in

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{CombatError, CombatResult};

// ============================================================================
// Weapon Types
// ============================================================================

/// Type of weapon, selecting the weapon-type damage multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponType {
    /// Unarmed combat.
    Fists,
    /// Dagger/knife.
    Dagger,
    /// One-handed sword.
    Sword,
    /// Axe.
    Axe,
    /// Spear/polearm.
    Spear,
    /// Two-handed greatsword.
    Greatsword,
    /// Boss natural weapon.
    BossClaw,
}

/// Kind of attack being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackType {
    /// Quick attack.
    Light,
    /// Slow, heavy attack with knockback.
    Heavy,
    /// Resolved boss telegraph.
    Telegraph,
}

impl AttackType {
    /// Whether this attack can knock the target back.
    #[must_use]
    pub fn is_heavy(&self) -> bool {
        matches!(self, Self::Heavy | Self::Telegraph)
    }

    /// Stamina cost multiplier relative to the weapon's base cost.
    #[must_use]
    pub fn stamina_factor(&self) -> f32 {
        match self {
            Self::Light => 1.0,
            Self::Heavy => 1.5,
            Self::Telegraph => 0.0,
        }
    }
}

// ============================================================================
// Hitbox Shapes
// ============================================================================

/// Shape of a weapon's hitbox, in the attacker's facing frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HitShape {
    /// Disc around the hitbox anchor.
    Circle {
        /// Radius in world units.
        radius: f32,
    },
    /// Rectangle centred on the anchor, long axis along the facing.
    Box {
        /// Half extent along the facing.
        half_length: f32,
        /// Half extent across the facing.
        half_width: f32,
    },
    /// Thick segment from the anchor along the facing.
    Line {
        /// Segment length.
        length: f32,
        /// Half thickness.
        half_width: f32,
    },
}

impl HitShape {
    /// Whether every extent is finite and non-negative.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        match *self {
            Self::Circle { radius } => is_extent(radius),
            Self::Box {
                half_length,
                half_width,
            } => is_extent(half_length) && is_extent(half_width),
            Self::Line { length, half_width } => is_extent(length) && is_extent(half_width),
        }
    }
}

/// Finite and non-negative.
pub(crate) fn is_extent(value: f32) -> bool {
    value.is_finite() && value >= 0.0
}

// ============================================================================
// Weapon Templates
// ============================================================================

/// Statistics and hitbox geometry for a named weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponTemplate {
    /// Lookup name.
    pub name: String,
    /// Weapon type.
    pub weapon_type: WeaponType,
    /// Hitbox shape.
    pub shape: HitShape,
    /// Anchor offset from the attacker: x along facing, y to the left.
    pub offset: Vec2,
    /// How long the hitbox stays live (ms).
    pub duration_ms: u64,
    /// Stamina cost of a light attack.
    pub stamina_cost: f32,
    /// Time before the wielder may attack again (ms).
    pub recovery_ms: u64,
    /// Knockback force for heavy attacks.
    pub knockback: f32,
    /// Critical chance bonus.
    pub crit_bonus: f32,
}

impl WeaponTemplate {
    /// Create a template with default timing for a weapon type.
    #[must_use]
    pub fn new(name: impl Into<String>, weapon_type: WeaponType, shape: HitShape) -> Self {
        Self {
            name: name.into(),
            weapon_type,
            shape,
            offset: Vec2::new(1.0, 0.0),
            duration_ms: 200,
            stamina_cost: 10.0,
            recovery_ms: 400,
            knockback: 3.0,
            crit_bonus: 0.0,
        }
    }

    /// Set anchor offset.
    #[must_use]
    pub fn with_offset(mut self, forward: f32, left: f32) -> Self {
        self.offset = Vec2::new(forward, left);
        self
    }

    /// Set hitbox duration.
    #[must_use]
    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    /// Set stamina cost.
    #[must_use]
    pub fn with_stamina_cost(mut self, cost: f32) -> Self {
        self.stamina_cost = cost.max(0.0);
        self
    }

    /// Set recovery time.
    #[must_use]
    pub fn with_recovery(mut self, ms: u64) -> Self {
        self.recovery_ms = ms;
        self
    }

    /// Set knockback.
    #[must_use]
    pub fn with_knockback(mut self, knockback: f32) -> Self {
        self.knockback = knockback.max(0.0);
        self
    }

    /// Set critical bonus.
    #[must_use]
    pub fn with_crit_bonus(mut self, bonus: f32) -> Self {
        self.crit_bonus = bonus;
        self
    }

    /// Stamina cost for an attack of the given type.
    #[must_use]
    pub fn stamina_cost_for(&self, attack_type: AttackType) -> f32 {
        self.stamina_cost * attack_type.stamina_factor()
    }
}

/// The stock weapon set.
#[must_use]
pub fn default_weapons() -> Vec<WeaponTemplate> {
    vec![
        WeaponTemplate::new("fists", WeaponType::Fists, HitShape::Circle { radius: 0.6 })
            .with_offset(0.7, 0.0)
            .with_duration(150)
            .with_stamina_cost(5.0)
            .with_recovery(250)
            .with_knockback(1.0),
        WeaponTemplate::new("dagger", WeaponType::Dagger, HitShape::Circle { radius: 0.7 })
            .with_offset(0.8, 0.0)
            .with_duration(150)
            .with_stamina_cost(8.0)
            .with_recovery(250)
            .with_knockback(1.0)
            .with_crit_bonus(0.1),
        WeaponTemplate::new(
            "sword",
            WeaponType::Sword,
            HitShape::Box {
                half_length: 0.9,
                half_width: 0.6,
            },
        )
        .with_stamina_cost(12.0),
        WeaponTemplate::new(
            "axe",
            WeaponType::Axe,
            HitShape::Box {
                half_length: 0.8,
                half_width: 0.8,
            },
        )
        .with_duration(250)
        .with_stamina_cost(15.0)
        .with_recovery(500)
        .with_knockback(4.0),
        WeaponTemplate::new(
            "spear",
            WeaponType::Spear,
            HitShape::Line {
                length: 2.5,
                half_width: 0.3,
            },
        )
        .with_offset(0.3, 0.0)
        .with_stamina_cost(14.0)
        .with_recovery(450)
        .with_knockback(2.5),
        WeaponTemplate::new(
            "greatsword",
            WeaponType::Greatsword,
            HitShape::Box {
                half_length: 1.2,
                half_width: 1.0,
            },
        )
        .with_offset(1.3, 0.0)
        .with_duration(300)
        .with_stamina_cost(25.0)
        .with_recovery(700)
        .with_knockback(6.0),
        WeaponTemplate::new("boss_claw", WeaponType::BossClaw, HitShape::Circle { radius: 1.5 })
            .with_offset(1.5, 0.0)
            .with_duration(250)
            .with_stamina_cost(0.0)
            .with_recovery(600)
            .with_knockback(5.0),
    ]
}

// ============================================================================
// Weapon Catalog
// ============================================================================

/// Weapon templates by name.
#[derive(Debug, Clone, Default)]
pub struct WeaponCatalog {
    templates: ahash::AHashMap<String, WeaponTemplate>,
}

impl WeaponCatalog {
    /// Build a catalog. Later templates replace earlier ones of the same name.
    #[must_use]
    pub fn new(templates: impl IntoIterator<Item = WeaponTemplate>) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|t| (t.name.clone(), t))
                .collect(),
        }
    }

    /// Look up a template.
    pub fn get(&self, name: &str) -> CombatResult<&WeaponTemplate> {
        self.templates
            .get(name)
            .ok_or_else(|| CombatError::UnknownWeapon(name.to_string()))
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
