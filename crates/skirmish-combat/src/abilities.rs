//! Boss abilities.
//!
//! An ability is either a telegraphed area attack whose geometry is frozen
//! when it is announced, or a summon that spawns minions immediately.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use skirmish_common::{unit_or, HitArea};

use crate::error::{CombatError, CombatResult};
use crate::weapons::is_extent;

/// Shape and parameters of a boss ability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbilityKind {
    /// Rush toward the target along a line.
    Charge {
        /// Maximum charge distance.
        length: f32,
        /// Half width of the charge lane.
        half_width: f32,
    },
    /// Fixed-length beam aimed at the target.
    Beam {
        /// Beam length.
        length: f32,
        /// Half width of the beam.
        half_width: f32,
    },
    /// Circular slam centred on the target, damage falls off with distance.
    Slam {
        /// Blast radius.
        radius: f32,
    },
    /// Cone sweep in front of the boss.
    Sweep {
        /// Reach of the sweep.
        radius: f32,
        /// Half opening angle in radians.
        half_angle: f32,
    },
    /// Summon minions around the boss.
    Summon {
        /// Minions requested per cast.
        count: u32,
    },
}

impl AbilityKind {
    /// Whether the geometry is finite and non-negative.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        match *self {
            Self::Charge { length, half_width } | Self::Beam { length, half_width } => {
                is_extent(length) && is_extent(half_width)
            },
            Self::Slam { radius } => is_extent(radius),
            Self::Sweep { radius, half_angle } => is_extent(radius) && is_extent(half_angle),
            Self::Summon { .. } => true,
        }
    }
}

/// A named boss ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityDef {
    /// Lookup name.
    pub name: String,
    /// Geometry and behavior.
    pub kind: AbilityKind,
    /// Warning time before the ability resolves (ms).
    pub telegraph_ms: u64,
    /// Damage multiplier applied on resolution.
    pub damage_multiplier: f32,
    /// Knockback force applied to a target caught in the area.
    #[serde(default = "default_knockback")]
    pub knockback: f32,
}

fn default_knockback() -> f32 {
    4.0
}

impl AbilityDef {
    /// Create an ability.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: AbilityKind, telegraph_ms: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            telegraph_ms,
            damage_multiplier: 1.0,
            knockback: default_knockback(),
        }
    }

    /// Set knockback force.
    #[must_use]
    pub fn with_knockback(mut self, knockback: f32) -> Self {
        self.knockback = knockback.max(0.0);
        self
    }

    /// Set damage multiplier.
    #[must_use]
    pub fn with_damage_multiplier(mut self, multiplier: f32) -> Self {
        self.damage_multiplier = multiplier.max(0.0);
        self
    }

    /// Whether the ability is announced before it resolves.
    #[must_use]
    pub fn is_telegraphed(&self) -> bool {
        !matches!(self.kind, AbilityKind::Summon { .. })
    }

    /// Freeze the ability's area for a boss at `origin` facing `facing`,
    /// aimed at `target`. Summons have no area.
    #[must_use]
    pub fn plan_area(&self, origin: Vec2, facing: Vec2, target: Vec2) -> Option<HitArea> {
        let aim = unit_or(target - origin, unit_or(facing, Vec2::X));
        match self.kind {
            AbilityKind::Charge { length, half_width } => {
                let reach = origin.distance(target).min(length);
                Some(HitArea::segment(origin, origin + aim * reach, half_width))
            },
            AbilityKind::Beam { length, half_width } => {
                Some(HitArea::segment(origin, origin + aim * length, half_width))
            },
            AbilityKind::Slam { radius } => Some(HitArea::circle(target, radius)),
            AbilityKind::Sweep { radius, half_angle } => {
                Some(HitArea::cone(origin, aim, radius, half_angle))
            },
            AbilityKind::Summon { .. } => None,
        }
    }
}

/// The stock ability set.
#[must_use]
pub fn default_abilities() -> Vec<AbilityDef> {
    vec![
        AbilityDef::new(
            "charge",
            AbilityKind::Charge {
                length: 12.0,
                half_width: 1.0,
            },
            1200,
        )
        .with_damage_multiplier(1.2)
        .with_knockback(6.0),
        AbilityDef::new(
            "beam",
            AbilityKind::Beam {
                length: 20.0,
                half_width: 0.75,
            },
            1500,
        ),
        AbilityDef::new("slam", AbilityKind::Slam { radius: 5.0 }, 1000)
            .with_damage_multiplier(1.5)
            .with_knockback(5.0),
        AbilityDef::new(
            "sweep",
            AbilityKind::Sweep {
                radius: 6.0,
                half_angle: 0.8,
            },
            900,
        )
        .with_damage_multiplier(1.1)
        .with_knockback(3.0),
        AbilityDef::new("summon", AbilityKind::Summon { count: 2 }, 0).with_knockback(0.0),
    ]
}

/// Boss abilities by name.
#[derive(Debug, Clone, Default)]
pub struct AbilityCatalog {
    abilities: ahash::AHashMap<String, AbilityDef>,
}

impl AbilityCatalog {
    /// Build a catalog. Later abilities replace earlier ones of the same name.
    #[must_use]
    pub fn new(abilities: impl IntoIterator<Item = AbilityDef>) -> Self {
        Self {
            abilities: abilities
                .into_iter()
                .map(|a| (a.name.clone(), a))
                .collect(),
        }
    }

    /// Look up an ability.
    pub fn get(&self, name: &str) -> CombatResult<&AbilityDef> {
        self.abilities
            .get(name)
            .ok_or_else(|| CombatError::UnknownAbility(name.to_string()))
    }

    /// Whether an ability exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.abilities.contains_key(name)
    }
}
