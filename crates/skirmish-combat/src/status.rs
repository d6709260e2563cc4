//! Timed status effects.
//!
//! Effects are keyed by kind: applying a kind that is already active
//! refreshes its expiry to `now + duration` and adds a stack up to the cap.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use skirmish_common::Timestamp;

use crate::config::StatusConfig;
use crate::tick::Tickable;

/// Kind of status effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Cannot act.
    Stun,
    /// Damage over time; magnitude is damage per second.
    DamageOverTime,
    /// Reduced movement; magnitude is the fraction removed.
    Slow,
    /// Increased damage taken; magnitude is the added fraction.
    Vulnerable,
    /// Immune to direct damage.
    Invulnerable,
}

impl StatusKind {
    /// Effect that this kind cancels on application.
    #[must_use]
    pub fn conflicts_with(self) -> Option<Self> {
        match self {
            Self::Invulnerable => Some(Self::Vulnerable),
            Self::Vulnerable => Some(Self::Invulnerable),
            _ => None,
        }
    }
}

/// An applied status effect.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEffect {
    /// Effect kind.
    pub kind: StatusKind,
    /// Magnitude of a single stack.
    pub base_magnitude: f32,
    /// Current stack count.
    pub stacks: u32,
    /// Last application time.
    pub applied_at: Timestamp,
    /// Expiry time.
    pub expires_at: Timestamp,
    dot_paid_until: Timestamp,
    dot_owed: f32,
}

impl StatusEffect {
    /// Base magnitude scaled by stacks.
    #[must_use]
    pub fn magnitude(&self) -> f32 {
        self.base_magnitude * self.stacks as f32
    }

    /// Whether the effect is still running.
    #[must_use]
    pub fn is_active(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }

    /// Milliseconds left.
    #[must_use]
    pub fn remaining_ms(&self, now: Timestamp) -> u64 {
        self.expires_at.millis_since(now)
    }

    /// Book damage-over-time accrued up to `now` at the current stacks.
    fn settle_dot(&mut self, now: Timestamp) {
        if self.kind != StatusKind::DamageOverTime {
            return;
        }
        let until = now.min(self.expires_at);
        if until > self.dot_paid_until {
            self.dot_owed += self.magnitude() * until.seconds_since(self.dot_paid_until);
            self.dot_paid_until = until;
        }
    }
}

/// Snapshot of an active effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusSnapshot {
    /// Effect kind.
    pub kind: StatusKind,
    /// Milliseconds left.
    pub remaining_ms: u64,
    /// Effective magnitude.
    pub magnitude: f32,
    /// Stack count.
    pub stacks: u32,
}

/// Result of an application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusApplication {
    /// Stacks after application.
    pub stacks: u32,
    /// Expiry time.
    pub expires_at: Timestamp,
    /// Conflicting effect that was removed.
    pub cancelled: Option<StatusKind>,
}

/// Result of a registry tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusTick {
    /// Damage-over-time accrued since the previous tick.
    pub dot_damage: f32,
    /// Effects removed this tick, in kind order.
    pub expired: Vec<StatusKind>,
}

/// Per-combatant bag of timed effects.
#[derive(Debug, Clone, Default)]
pub struct StatusEffectRegistry {
    effects: AHashMap<StatusKind, StatusEffect>,
    max_stacks: u32,
}

impl StatusEffectRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(config: &StatusConfig) -> Self {
        Self {
            effects: AHashMap::new(),
            max_stacks: config.max_stacks.max(1),
        }
    }

    /// Apply or refresh an effect.
    pub fn apply(
        &mut self,
        kind: StatusKind,
        duration_ms: u64,
        magnitude: f32,
        now: Timestamp,
    ) -> StatusApplication {
        let cancelled = kind
            .conflicts_with()
            .and_then(|other| self.effects.remove(&other))
            .filter(|effect| effect.is_active(now))
            .map(|effect| effect.kind);

        let expires_at = now.after(duration_ms);
        let max_stacks = self.max_stacks.max(1);
        let effect = self
            .effects
            .entry(kind)
            .and_modify(|effect| {
                // Accrual so far is owed at the old magnitude
                effect.settle_dot(now);
                if effect.is_active(now) {
                    effect.stacks = (effect.stacks + 1).min(max_stacks);
                } else {
                    effect.stacks = 1;
                    effect.dot_paid_until = now;
                }
                effect.base_magnitude = magnitude;
                effect.applied_at = now;
                effect.expires_at = expires_at;
            })
            .or_insert_with(|| StatusEffect {
                kind,
                base_magnitude: magnitude,
                stacks: 1,
                applied_at: now,
                expires_at,
                dot_paid_until: now,
                dot_owed: 0.0,
            });

        StatusApplication {
            stacks: effect.stacks,
            expires_at,
            cancelled,
        }
    }

    /// Active effect of a kind.
    #[must_use]
    pub fn get(&self, kind: StatusKind, now: Timestamp) -> Option<&StatusEffect> {
        self.effects.get(&kind).filter(|e| e.is_active(now))
    }

    /// Whether an effect of `kind` is active.
    #[must_use]
    pub fn has(&self, kind: StatusKind, now: Timestamp) -> bool {
        self.get(kind, now).is_some()
    }

    /// Effective magnitude of `kind`, zero if inactive.
    #[must_use]
    pub fn magnitude(&self, kind: StatusKind, now: Timestamp) -> f32 {
        self.get(kind, now).map_or(0.0, StatusEffect::magnitude)
    }

    /// Movement multiplier from `Slow`.
    #[must_use]
    pub fn slow_multiplier(&self, now: Timestamp, cap: f32) -> f32 {
        1.0 - self.magnitude(StatusKind::Slow, now).min(cap).max(0.0)
    }

    /// Damage-taken multiplier from `Vulnerable`.
    #[must_use]
    pub fn vulnerability_multiplier(&self, now: Timestamp) -> f32 {
        1.0 + self.magnitude(StatusKind::Vulnerable, now).max(0.0)
    }

    /// Snapshots of active effects, in kind order.
    #[must_use]
    pub fn active(&self, now: Timestamp) -> Vec<StatusSnapshot> {
        let mut out: Vec<StatusSnapshot> = self
            .effects
            .values()
            .filter(|e| e.is_active(now))
            .map(|e| StatusSnapshot {
                kind: e.kind,
                remaining_ms: e.remaining_ms(now),
                magnitude: e.magnitude(),
                stacks: e.stacks,
            })
            .collect();
        out.sort_by_key(|s| s.kind);
        out
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.effects.clear();
    }
}

impl Tickable for StatusEffectRegistry {
    type Context<'a> = ();
    type Output = StatusTick;

    fn tick(&mut self, now: Timestamp, _ctx: ()) -> StatusTick {
        let mut out = StatusTick::default();

        for effect in self.effects.values_mut() {
            effect.settle_dot(now);
            out.dot_damage += effect.dot_owed;
            effect.dot_owed = 0.0;
            if !effect.is_active(now) {
                out.expired.push(effect.kind);
            }
        }

        for kind in &out.expired {
            self.effects.remove(kind);
        }
        out.expired.sort();
        out
    }
}
