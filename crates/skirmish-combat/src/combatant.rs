//! Combatants and their presentation-layer poses.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use skirmish_common::{unit_or, CombatantId, Timestamp};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::combo::ComboTracker;
use crate::config::CombatConfig;
use crate::defense::{DefenseStateMachine, Stamina};
use crate::momentum::MomentumTier;
use crate::status::{StatusEffectRegistry, StatusKind, StatusSnapshot};

// ============================================================================
// Pose
// ============================================================================

/// Position and facing on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// World position.
    pub position: Vec2,
    /// Unit facing.
    pub forward: Vec2,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            forward: Vec2::X,
        }
    }
}

impl Pose {
    /// Create a pose; a zero facing becomes +X.
    #[must_use]
    pub fn new(position: Vec2, forward: Vec2) -> Self {
        Self {
            position,
            forward: unit_or(forward, Vec2::X),
        }
    }

    /// Wrap in a shared handle.
    #[must_use]
    pub fn shared(self) -> SharedPose {
        Rc::new(RefCell::new(self))
    }
}

/// Pose shared between the presentation layer and the combat core.
pub type SharedPose = Rc<RefCell<Pose>>;

/// Where the combat core reads an actor's transform.
pub trait PoseSource: std::fmt::Debug {
    /// Current position.
    fn position(&self) -> Vec2;
    /// Current unit facing.
    fn forward(&self) -> Vec2;
    /// Move by `delta` (dodges).
    fn translate(&mut self, delta: Vec2);
}

impl PoseSource for Pose {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn forward(&self) -> Vec2 {
        self.forward
    }

    fn translate(&mut self, delta: Vec2) {
        self.position += delta;
    }
}

impl PoseSource for SharedPose {
    fn position(&self) -> Vec2 {
        self.borrow().position
    }

    fn forward(&self) -> Vec2 {
        self.borrow().forward
    }

    fn translate(&mut self, delta: Vec2) {
        self.borrow_mut().position += delta;
    }
}

// ============================================================================
// Profile
// ============================================================================

/// Allegiance. Hitboxes never hit allies on a non-neutral team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// The player side.
    Player,
    /// Enemies of the player.
    Hostile,
    /// Hits and is hit by everyone.
    #[default]
    Neutral,
}

impl Team {
    /// Whether two teams are allied.
    #[must_use]
    pub fn is_allied(self, other: Self) -> bool {
        self == other && self != Self::Neutral
    }
}

/// Registration stats for a combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatantProfile {
    /// Maximum hp.
    pub max_hp: f32,
    /// Maximum stamina.
    pub max_stamina: f32,
    /// Base attack stat.
    pub base_attack: f32,
    /// Critical chance bonus.
    pub crit_chance: f32,
    /// Collision radius.
    pub collision_radius: f32,
    /// Allegiance.
    pub team: Team,
}

impl Default for CombatantProfile {
    fn default() -> Self {
        Self {
            max_hp: 100.0,
            max_stamina: 100.0,
            base_attack: 10.0,
            crit_chance: 0.0,
            collision_radius: 0.5,
            team: Team::Neutral,
        }
    }
}

impl CombatantProfile {
    /// Create a default profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max hp.
    #[must_use]
    pub fn with_hp(mut self, hp: f32) -> Self {
        self.max_hp = hp.max(1.0);
        self
    }

    /// Set max stamina.
    #[must_use]
    pub fn with_stamina(mut self, stamina: f32) -> Self {
        self.max_stamina = stamina.max(0.0);
        self
    }

    /// Set base attack.
    #[must_use]
    pub fn with_base_attack(mut self, attack: f32) -> Self {
        self.base_attack = attack.max(0.0);
        self
    }

    /// Set critical chance bonus.
    #[must_use]
    pub fn with_crit_chance(mut self, chance: f32) -> Self {
        self.crit_chance = chance.clamp(0.0, 1.0);
        self
    }

    /// Set collision radius.
    #[must_use]
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.collision_radius = radius.max(0.0);
        self
    }

    /// Set team.
    #[must_use]
    pub fn with_team(mut self, team: Team) -> Self {
        self.team = team;
        self
    }
}

// ============================================================================
// Combatant
// ============================================================================

/// An actor registered with a combat session.
#[derive(Debug)]
pub struct Combatant {
    /// Id.
    pub id: CombatantId,
    /// Transform source.
    pub pose: Box<dyn PoseSource>,
    /// Allegiance.
    pub team: Team,
    /// Current hp.
    pub hp: f32,
    /// Maximum hp.
    pub max_hp: f32,
    /// Stamina pool.
    pub stamina: Stamina,
    /// Base attack stat.
    pub base_attack: f32,
    /// Critical chance bonus.
    pub crit_chance: f32,
    /// Collision radius.
    pub collision_radius: f32,
    /// Dodge, parry and block.
    pub defense: DefenseStateMachine,
    /// Combo counter and momentum.
    pub combo: ComboTracker,
    /// Timed effects.
    pub status: StatusEffectRegistry,
    /// Explicit invulnerability (boss transitions).
    pub invulnerable: bool,
    /// Earliest time the next attack may start.
    pub attack_ready_at: Timestamp,
    /// Riposte window end after a successful parry.
    pub riposte_until: Option<Timestamp>,
    /// Movement multiplier set by boss phases.
    pub move_speed: f32,
    /// Spawned by a boss.
    pub is_minion: bool,
}

impl Combatant {
    /// Create a combatant from a profile.
    pub fn new(
        id: CombatantId,
        pose: Box<dyn PoseSource>,
        profile: &CombatantProfile,
        config: &CombatConfig,
    ) -> Self {
        Self {
            id,
            pose,
            team: profile.team,
            hp: profile.max_hp,
            max_hp: profile.max_hp,
            stamina: Stamina::new(profile.max_stamina),
            base_attack: profile.base_attack,
            crit_chance: profile.crit_chance,
            collision_radius: profile.collision_radius,
            defense: DefenseStateMachine::new(),
            combo: ComboTracker::new(),
            status: StatusEffectRegistry::new(&config.status),
            invulnerable: false,
            attack_ready_at: Timestamp::ZERO,
            riposte_until: None,
            move_speed: 1.0,
            is_minion: false,
        }
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.pose.position()
    }

    /// Current facing.
    #[must_use]
    pub fn forward(&self) -> Vec2 {
        unit_or(self.pose.forward(), Vec2::X)
    }

    /// Whether hp is above zero.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    /// Hp as a fraction of max.
    #[must_use]
    pub fn hp_ratio(&self) -> f32 {
        if self.max_hp > 0.0 {
            self.hp / self.max_hp
        } else {
            0.0
        }
    }

    /// Whether a stun is active.
    #[must_use]
    pub fn is_stunned(&self, now: Timestamp) -> bool {
        self.status.has(StatusKind::Stun, now)
    }

    /// Whether direct damage is ignored at `now`.
    #[must_use]
    pub fn is_invulnerable(&self, now: Timestamp) -> bool {
        self.invulnerable
            || self.defense.dodge_invulnerable(now)
            || self.status.has(StatusKind::Invulnerable, now)
            || self.combo.momentum().peak_invulnerable(now)
    }

    /// Whether the riposte window is open.
    #[must_use]
    pub fn riposte_ready(&self, now: Timestamp) -> bool {
        self.riposte_until.is_some_and(|until| now < until)
    }

    /// Whether the combatant may take actions.
    #[must_use]
    pub fn can_act(&self, now: Timestamp) -> bool {
        self.is_alive() && !self.is_stunned(now)
    }

    /// Whether an attack may start now (stamina is checked per weapon).
    #[must_use]
    pub fn can_attack(&self, now: Timestamp) -> bool {
        self.can_act(now) && self.defense.is_neutral() && now >= self.attack_ready_at
    }

    /// Subtract damage; returns the hp actually removed.
    pub fn take_damage(&mut self, amount: f32) -> f32 {
        let before = self.hp;
        self.hp = (self.hp - amount.max(0.0)).max(0.0);
        before - self.hp
    }

    /// Snapshot for callers.
    #[must_use]
    pub fn stats(&self, now: Timestamp) -> CombatStats {
        CombatStats {
            hp: self.hp,
            max_hp: self.max_hp,
            stamina: self.stamina.current(),
            max_stamina: self.stamina.max(),
            momentum: self.combo.momentum().value(),
            momentum_tier: self.combo.momentum().tier(),
            combo: self.combo.count(),
            status_effects: self.status.active(now),
            is_blocking: self.defense.is_blocking(),
            is_dodging: self.defense.is_dodging(),
            is_parrying: self.defense.is_parrying(),
            is_invulnerable: self.is_invulnerable(now),
            riposte_ready: self.riposte_ready(now),
        }
    }
}

/// Registered combatants in id order.
pub type Roster = BTreeMap<CombatantId, Combatant>;

/// Snapshot returned by `combat_stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombatStats {
    /// Current hp.
    pub hp: f32,
    /// Maximum hp.
    pub max_hp: f32,
    /// Current stamina.
    pub stamina: f32,
    /// Maximum stamina.
    pub max_stamina: f32,
    /// Momentum in [0, 100].
    pub momentum: f32,
    /// Active momentum tier.
    pub momentum_tier: MomentumTier,
    /// Combo counter.
    pub combo: u32,
    /// Active status effects.
    pub status_effects: Vec<StatusSnapshot>,
    /// Holding a block.
    pub is_blocking: bool,
    /// Dodging.
    pub is_dodging: bool,
    /// Parrying.
    pub is_parrying: bool,
    /// Direct damage ignored.
    pub is_invulnerable: bool,
    /// Riposte window open.
    pub riposte_ready: bool,
}
