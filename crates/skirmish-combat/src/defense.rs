//! Dodge, parry and block state machine.
//!
//! The states are mutually exclusive by construction: a combatant holds
//! exactly one [`DefenseState`]. Dodge and parry run to completion; only a
//! block can be dropped early.

use glam::Vec2;
use skirmish_common::{unit_or, Timestamp};

use crate::config::DefenseConfig;
use crate::tick::Tickable;

// ============================================================================
// Stamina
// ============================================================================

/// Stamina pool, always within `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stamina {
    current: f32,
    max: f32,
}

impl Stamina {
    /// Full pool of `max`.
    #[must_use]
    pub fn new(max: f32) -> Self {
        let max = max.max(0.0);
        Self { current: max, max }
    }

    /// Pool with a specific current value.
    #[must_use]
    pub fn with_current(mut self, current: f32) -> Self {
        self.current = current.clamp(0.0, self.max);
        self
    }

    /// Current stamina.
    #[must_use]
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Maximum stamina.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Whether at least `amount` is available.
    #[must_use]
    pub fn can_afford(&self, amount: f32) -> bool {
        self.current >= amount
    }

    /// Spend `amount` if available.
    pub fn consume(&mut self, amount: f32) -> bool {
        if !self.can_afford(amount) {
            return false;
        }
        self.current = (self.current - amount.max(0.0)).clamp(0.0, self.max);
        true
    }

    /// Remove up to `amount`; returns true if the pool is now empty.
    pub fn drain(&mut self, amount: f32) -> bool {
        self.current = (self.current - amount.max(0.0)).clamp(0.0, self.max);
        self.current <= 0.0
    }

    /// Restore up to `amount`.
    pub fn regen(&mut self, amount: f32) {
        self.current = (self.current + amount.max(0.0)).clamp(0.0, self.max);
    }
}

// ============================================================================
// States
// ============================================================================

/// Current defensive state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DefenseState {
    /// Free to act.
    #[default]
    Neutral,
    /// Moving through a dodge.
    Dodging {
        /// Start time.
        started: Timestamp,
        /// End of invulnerability.
        iframes_until: Timestamp,
        /// End of the dodge.
        until: Timestamp,
        /// Unit movement direction.
        direction: Vec2,
    },
    /// Parry stance.
    Parrying {
        /// End of the active window.
        window_until: Timestamp,
        /// End of recovery.
        until: Timestamp,
    },
    /// Holding a block.
    Blocking {
        /// When the block was raised.
        since: Timestamp,
    },
}

/// Why a defensive action was refused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefenseRejection {
    /// Not enough stamina.
    InsufficientStamina {
        /// Stamina required.
        required: f32,
        /// Stamina available.
        available: f32,
    },
    /// Action on cooldown.
    OnCooldown {
        /// Milliseconds until ready.
        remaining_ms: u64,
    },
    /// Another dodge or parry is running.
    Busy,
}

/// Context for a defense tick.
#[derive(Debug)]
pub struct DefenseContext<'a> {
    /// Defense tuning.
    pub config: &'a DefenseConfig,
    /// The combatant's stamina.
    pub stamina: &'a mut Stamina,
}

/// Result of a defense tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DefenseTick {
    /// Dodge movement to apply to the combatant's pose.
    pub displacement: Vec2,
    /// A dodge completed this tick.
    pub dodge_finished: bool,
    /// A parry completed this tick.
    pub parry_finished: bool,
    /// The block broke from stamina exhaustion.
    pub block_broken: bool,
}

/// Per-combatant defense state machine.
#[derive(Debug, Clone, Default)]
pub struct DefenseStateMachine {
    state: DefenseState,
    dodge_ready_at: Timestamp,
    parry_ready_at: Timestamp,
    last_tick: Option<Timestamp>,
}

impl DefenseStateMachine {
    /// Creates a machine in `Neutral`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> DefenseState {
        self.state
    }

    /// Whether the machine is neutral.
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        matches!(self.state, DefenseState::Neutral)
    }

    /// Whether a dodge is running.
    #[must_use]
    pub fn is_dodging(&self) -> bool {
        matches!(self.state, DefenseState::Dodging { .. })
    }

    /// Whether a parry (window or recovery) is running.
    #[must_use]
    pub fn is_parrying(&self) -> bool {
        matches!(self.state, DefenseState::Parrying { .. })
    }

    /// Whether a block is held.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self.state, DefenseState::Blocking { .. })
    }

    /// Whether the parry window is open at `now`.
    #[must_use]
    pub fn parry_active(&self, now: Timestamp) -> bool {
        matches!(self.state, DefenseState::Parrying { window_until, .. } if now < window_until)
    }

    /// Whether dodge i-frames cover `now`.
    #[must_use]
    pub fn dodge_invulnerable(&self, now: Timestamp) -> bool {
        matches!(self.state, DefenseState::Dodging { started, iframes_until, .. }
            if now >= started && now < iframes_until)
    }

    /// Whether a hit at `now` counts as a perfect block.
    #[must_use]
    pub fn perfect_block(&self, now: Timestamp, config: &DefenseConfig) -> bool {
        matches!(self.state, DefenseState::Blocking { since }
            if now.millis_since(since) <= config.perfect_block_window_ms)
    }

    fn check_ready(&self, now: Timestamp, ready_at: Timestamp) -> Result<(), DefenseRejection> {
        if self.is_dodging() || self.is_parrying() {
            return Err(DefenseRejection::Busy);
        }
        if now < ready_at {
            return Err(DefenseRejection::OnCooldown {
                remaining_ms: ready_at.millis_since(now),
            });
        }
        Ok(())
    }

    /// Start a dodge along `direction` (`fallback` if zero).
    pub fn attempt_dodge(
        &mut self,
        now: Timestamp,
        direction: Vec2,
        fallback: Vec2,
        stamina: &mut Stamina,
        config: &DefenseConfig,
    ) -> Result<(), DefenseRejection> {
        self.check_ready(now, self.dodge_ready_at)?;
        if !stamina.consume(config.dodge_cost) {
            return Err(DefenseRejection::InsufficientStamina {
                required: config.dodge_cost,
                available: stamina.current(),
            });
        }

        let iframe_ms = (config.dodge_duration_ms as f32 * config.dodge_iframe_fraction) as u64;
        self.state = DefenseState::Dodging {
            started: now,
            iframes_until: now.after(iframe_ms),
            until: now.after(config.dodge_duration_ms),
            direction: unit_or(direction, unit_or(fallback, Vec2::X)),
        };
        Ok(())
    }

    /// Enter a parry stance.
    pub fn attempt_parry(
        &mut self,
        now: Timestamp,
        stamina: &mut Stamina,
        config: &DefenseConfig,
    ) -> Result<(), DefenseRejection> {
        self.check_ready(now, self.parry_ready_at)?;
        if !stamina.consume(config.parry_cost) {
            return Err(DefenseRejection::InsufficientStamina {
                required: config.parry_cost,
                available: stamina.current(),
            });
        }

        self.state = DefenseState::Parrying {
            window_until: now.after(config.parry_window_ms),
            until: now.after(config.parry_window_ms + config.parry_recovery_ms),
        };
        Ok(())
    }

    /// Raise or lower a block.
    pub fn set_blocking(
        &mut self,
        raised: bool,
        now: Timestamp,
        stamina: &Stamina,
    ) -> Result<(), DefenseRejection> {
        if !raised {
            if self.is_blocking() {
                self.state = DefenseState::Neutral;
            }
            return Ok(());
        }
        match self.state {
            DefenseState::Blocking { .. } => Ok(()),
            DefenseState::Neutral => {
                if stamina.current() <= 0.0 {
                    return Err(DefenseRejection::InsufficientStamina {
                        required: f32::MIN_POSITIVE,
                        available: stamina.current(),
                    });
                }
                self.state = DefenseState::Blocking { since: now };
                Ok(())
            },
            DefenseState::Dodging { .. } | DefenseState::Parrying { .. } => {
                Err(DefenseRejection::Busy)
            },
        }
    }

    /// Drop a held block (stun, death). Dodges and parries are unaffected.
    pub fn interrupt_block(&mut self) {
        if self.is_blocking() {
            self.state = DefenseState::Neutral;
        }
    }
}

impl Tickable for DefenseStateMachine {
    type Context<'a> = DefenseContext<'a>;
    type Output = DefenseTick;

    fn tick(&mut self, now: Timestamp, ctx: DefenseContext<'_>) -> DefenseTick {
        let config = ctx.config;
        let last = self.last_tick.unwrap_or(now);
        let dt = now.seconds_since(last);
        self.last_tick = Some(now);
        let mut out = DefenseTick::default();

        match self.state {
            DefenseState::Neutral => ctx.stamina.regen(config.stamina_regen_per_sec * dt),
            DefenseState::Dodging {
                started,
                until,
                direction,
                ..
            } => {
                let from = last.max(started);
                let to = now.min(until);
                if to > from && config.dodge_duration_ms > 0 {
                    let fraction = to.millis_since(from) as f32 / config.dodge_duration_ms as f32;
                    out.displacement = direction * config.dodge_distance * fraction;
                }
                if now >= until {
                    self.state = DefenseState::Neutral;
                    self.dodge_ready_at = until.after(config.dodge_cooldown_ms);
                    out.dodge_finished = true;
                }
            },
            DefenseState::Parrying { until, .. } => {
                if now >= until {
                    self.state = DefenseState::Neutral;
                    self.parry_ready_at = until.after(config.parry_cooldown_ms);
                    out.parry_finished = true;
                }
            },
            DefenseState::Blocking { .. } => {
                if ctx.stamina.drain(config.block_drain_per_sec * dt) {
                    self.state = DefenseState::Neutral;
                    out.block_broken = true;
                }
            },
        }
        out
    }
}
