//! Momentum: a decaying combat-heat resource with tiered buffs.

use serde::{Deserialize, Serialize};
use skirmish_common::Timestamp;

use crate::config::MomentumConfig;

/// Upper bound of the momentum meter.
pub const MAX_MOMENTUM: f32 = 100.0;

/// Highest momentum threshold currently crossed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MomentumTier {
    /// Below the first threshold.
    #[default]
    None,
    /// 25+: faster attack recovery.
    Flow,
    /// 50+: damage buff.
    Fury,
    /// 75+: critical chance buff.
    Frenzy,
    /// 100: brief invulnerability.
    Peak,
}

impl MomentumTier {
    /// Tier for a momentum value.
    #[must_use]
    pub fn from_value(value: f32) -> Self {
        if value >= 100.0 {
            Self::Peak
        } else if value >= 75.0 {
            Self::Frenzy
        } else if value >= 50.0 {
            Self::Fury
        } else if value >= 25.0 {
            Self::Flow
        } else {
            Self::None
        }
    }

    /// Momentum needed to enter the tier.
    #[must_use]
    pub fn threshold(self) -> f32 {
        match self {
            Self::None => 0.0,
            Self::Flow => 25.0,
            Self::Fury => 50.0,
            Self::Frenzy => 75.0,
            Self::Peak => 100.0,
        }
    }
}

/// Tier transition produced by a gain or decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierChange {
    /// Previous tier.
    pub from: MomentumTier,
    /// New tier.
    pub to: MomentumTier,
}

/// Momentum meter for one combatant.
#[derive(Debug, Clone, Default)]
pub struct Momentum {
    value: f32,
    tier: MomentumTier,
    last_update: Option<Timestamp>,
    peak_until: Option<Timestamp>,
}

impl Momentum {
    /// Creates an empty meter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value in [0, 100].
    #[must_use]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Active tier.
    #[must_use]
    pub fn tier(&self) -> MomentumTier {
        self.tier
    }

    /// Add momentum after decaying up to `now`.
    pub fn gain(&mut self, amount: f32, now: Timestamp, config: &MomentumConfig) -> Option<TierChange> {
        let before = self.tier;
        self.decay_to(now, config);
        self.value = (self.value + amount.max(0.0)).clamp(0.0, MAX_MOMENTUM);
        self.retier(before, now, config)
    }

    /// Apply linear decay up to `now`.
    pub fn update(&mut self, now: Timestamp, config: &MomentumConfig) -> Option<TierChange> {
        let before = self.tier;
        self.decay_to(now, config);
        self.retier(before, now, config)
    }

    fn decay_to(&mut self, now: Timestamp, config: &MomentumConfig) {
        if let Some(last) = self.last_update {
            let dt = now.seconds_since(last);
            self.value = (self.value - config.decay_per_sec * dt).clamp(0.0, MAX_MOMENTUM);
        }
        self.last_update = Some(now);
    }

    fn retier(
        &mut self,
        before: MomentumTier,
        now: Timestamp,
        config: &MomentumConfig,
    ) -> Option<TierChange> {
        self.tier = MomentumTier::from_value(self.value);
        if self.tier == before {
            return None;
        }
        // An open window is never extended by decaying and climbing back
        if self.tier == MomentumTier::Peak && !self.peak_invulnerable(now) {
            self.peak_until = Some(now.after(config.peak_invulnerability_ms));
        }
        Some(TierChange {
            from: before,
            to: self.tier,
        })
    }

    /// Weapon recovery is divided by this.
    #[must_use]
    pub fn attack_speed_multiplier(&self, config: &MomentumConfig) -> f32 {
        if self.tier == MomentumTier::Flow {
            config.flow_attack_speed
        } else {
            1.0
        }
    }

    /// Outgoing damage multiplier.
    #[must_use]
    pub fn damage_multiplier(&self, config: &MomentumConfig) -> f32 {
        if self.tier == MomentumTier::Fury {
            config.fury_damage
        } else {
            1.0
        }
    }

    /// Critical chance multiplier.
    #[must_use]
    pub fn crit_multiplier(&self, config: &MomentumConfig) -> f32 {
        if self.tier == MomentumTier::Frenzy {
            config.frenzy_crit
        } else {
            1.0
        }
    }

    /// Whether the Peak invulnerability window is open.
    ///
    /// The window outlives the tier: decay drops the meter below 100 on the
    /// next tick, but the grant runs for `peak_invulnerability_ms`.
    #[must_use]
    pub fn peak_invulnerable(&self, now: Timestamp) -> bool {
        self.peak_until.is_some_and(|until| now < until)
    }
}
