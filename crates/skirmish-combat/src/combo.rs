//! Combo tracking.
//!
//! This module provides:
//! - A rolling, time-stamped action history per combatant
//! - Suffix matching against registered combo patterns
//! - The momentum meter fed by combat events

use serde::{Deserialize, Serialize};
use skirmish_common::Timestamp;

use crate::config::CombatConfig;
use crate::momentum::{Momentum, TierChange};
use crate::tick::Tickable;
use crate::weapons::AttackType;

// ============================================================================
// Patterns
// ============================================================================

/// An action that participates in combos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComboAction {
    /// Light attack.
    Light,
    /// Heavy attack.
    Heavy,
    /// Dodge.
    Dodge,
}

impl ComboAction {
    /// Combo action for an attack, if the attack type counts toward combos.
    #[must_use]
    pub fn from_attack(attack_type: AttackType) -> Option<Self> {
        match attack_type {
            AttackType::Light => Some(Self::Light),
            AttackType::Heavy => Some(Self::Heavy),
            AttackType::Telegraph => None,
        }
    }
}

/// A named action sequence with a damage multiplier for its finisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboPattern {
    /// Display name.
    pub name: String,
    /// Actions in order, oldest first.
    pub sequence: Vec<ComboAction>,
    /// Damage scale for the completing attack.
    pub multiplier: f32,
}

impl ComboPattern {
    /// Create a pattern.
    #[must_use]
    pub fn new(name: impl Into<String>, sequence: Vec<ComboAction>, multiplier: f32) -> Self {
        Self {
            name: name.into(),
            sequence,
            multiplier,
        }
    }

    /// Whether `history` ends with this pattern.
    #[must_use]
    pub fn matches(&self, history: &[ComboAction]) -> bool {
        !self.sequence.is_empty() && history.ends_with(&self.sequence)
    }
}

/// The stock combo patterns.
#[must_use]
pub fn default_patterns() -> Vec<ComboPattern> {
    use ComboAction::{Dodge, Heavy, Light};
    vec![
        ComboPattern::new("Triple Slash", vec![Light, Light, Light], 1.3),
        ComboPattern::new("Crushing Blow", vec![Light, Light, Heavy], 1.6),
        ComboPattern::new("Whirlwind", vec![Dodge, Light, Heavy], 1.8),
    ]
}

// ============================================================================
// Tracker
// ============================================================================

/// A pattern that fired.
#[derive(Debug, Clone, PartialEq)]
pub struct ComboCompletion {
    /// Pattern name.
    pub name: String,
    /// Damage scale for the completing attack.
    pub multiplier: f32,
}

/// Result of recording one action.
#[derive(Debug, Clone, PartialEq)]
pub struct ComboRecord {
    /// Combo counter after the action.
    pub count: u32,
    /// Completed pattern, if any.
    pub completed: Option<ComboCompletion>,
    /// Momentum tier change caused by the action.
    pub tier_change: Option<TierChange>,
}

/// Result of a tracker tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComboTick {
    /// The combo window lapsed this tick.
    pub combo_expired: bool,
    /// Momentum decay crossed a tier boundary.
    pub tier_change: Option<TierChange>,
}

/// Per-combatant action history, combo counter and momentum.
#[derive(Debug, Clone, Default)]
pub struct ComboTracker {
    history: Vec<(ComboAction, Timestamp)>,
    count: u32,
    last_action: Option<Timestamp>,
    momentum: Momentum,
}

impl ComboTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current combo counter.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Time of the last recorded action.
    #[must_use]
    pub fn last_action(&self) -> Option<Timestamp> {
        self.last_action
    }

    /// Momentum meter.
    #[must_use]
    pub fn momentum(&self) -> &Momentum {
        &self.momentum
    }

    /// Actions currently buffered, oldest first.
    pub fn history(&self) -> impl Iterator<Item = ComboAction> + '_ {
        self.history.iter().map(|(action, _)| *action)
    }

    /// Record an action and match patterns.
    pub fn record(&mut self, action: ComboAction, now: Timestamp, config: &CombatConfig) -> ComboRecord {
        let window = config.combo.window_ms;
        self.history
            .retain(|(_, at)| now.millis_since(*at) <= window);

        let within_window = self
            .last_action
            .is_some_and(|last| now.millis_since(last) <= window);
        self.count = if within_window {
            self.count.saturating_add(1)
        } else {
            1
        };
        self.last_action = Some(now);
        self.history.push((action, now));

        let actions: Vec<ComboAction> = self.history().collect();
        let completed = config
            .combo
            .patterns
            .iter()
            .filter(|p| p.matches(&actions))
            .fold(None::<&ComboPattern>, |best, p| match best {
                Some(b) if b.sequence.len() >= p.sequence.len() => Some(b),
                _ => Some(p),
            })
            .map(|p| ComboCompletion {
                name: p.name.clone(),
                multiplier: p.multiplier,
            });

        let mut tier_change = None;
        if completed.is_some() {
            self.history.clear();
            tier_change = self.momentum.gain(config.momentum.gain_combo, now, &config.momentum);
        }
        if action == ComboAction::Dodge {
            tier_change = merge(
                tier_change,
                self.momentum.gain(config.momentum.gain_dodge, now, &config.momentum),
            );
        }

        ComboRecord {
            count: self.count,
            completed,
            tier_change,
        }
    }

    /// Credit momentum for a landed hit.
    pub fn register_hit(&mut self, critical: bool, now: Timestamp, config: &CombatConfig) -> Option<TierChange> {
        let mut gain = config.momentum.gain_hit;
        if critical {
            gain += config.momentum.gain_crit;
        }
        self.momentum.gain(gain, now, &config.momentum)
    }

    /// Credit momentum for a perfect block.
    pub fn register_perfect_block(&mut self, now: Timestamp, config: &CombatConfig) -> Option<TierChange> {
        self.momentum
            .gain(config.momentum.gain_perfect_block, now, &config.momentum)
    }
}

impl Tickable for ComboTracker {
    type Context<'a> = &'a CombatConfig;
    type Output = ComboTick;

    fn tick(&mut self, now: Timestamp, config: &CombatConfig) -> ComboTick {
        let mut out = ComboTick::default();
        if self.count > 0
            && self
                .last_action
                .is_some_and(|last| now.millis_since(last) > config.combo.window_ms)
        {
            self.count = 0;
            self.history.clear();
            out.combo_expired = true;
        }
        out.tier_change = self.momentum.update(now, &config.momentum);
        out
    }
}

/// Combine two sequential tier changes into one.
fn merge(first: Option<TierChange>, second: Option<TierChange>) -> Option<TierChange> {
    match (first, second) {
        (Some(a), Some(b)) if a.from == b.to => None,
        (Some(a), Some(b)) => Some(TierChange {
            from: a.from,
            to: b.to,
        }),
        (a, b) => b.or(a),
    }
}
