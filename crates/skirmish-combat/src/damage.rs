//! Damage calculation pipeline.
//!
//! This module provides:
//! - Base damage from attacker stat, weapon type, attack type, combo and momentum
//! - Parry, immunity and block resolution
//! - Critical and backstab multipliers
//! - Knockback for heavy attacks
//!
//! The steps always run in the same order so outcomes are reproducible for a
//! given random seed.

use glam::Vec2;
use skirmish_common::{facing_dot, unit_or, Timestamp};

use crate::combatant::Combatant;
use crate::config::{CombatConfig, DamageConfig};
use crate::weapons::AttackType;

// ============================================================================
// Inputs
// ============================================================================

/// Attacker values that feed the formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackerState {
    /// Base attack stat.
    pub base_attack: f32,
    /// Combo counter.
    pub combo: u32,
    /// Momentum in [0, 100].
    pub momentum: f32,
    /// Critical chance bonus of the combatant.
    pub crit_chance: f32,
    /// Multiplier on total critical chance.
    pub crit_scale: f32,
    /// Outgoing damage multiplier (momentum tier, enrage).
    pub damage_multiplier: f32,
    /// Riposte window is open.
    pub riposte_ready: bool,
    /// World position.
    pub position: Vec2,
}

impl AttackerState {
    /// Plain attacker with only a base stat.
    #[must_use]
    pub fn new(base_attack: f32, position: Vec2) -> Self {
        Self {
            base_attack,
            combo: 0,
            momentum: 0.0,
            crit_chance: 0.0,
            crit_scale: 1.0,
            damage_multiplier: 1.0,
            riposte_ready: false,
            position,
        }
    }

    /// Snapshot a combatant; `extra_multiplier` carries boss enrage.
    #[must_use]
    pub fn of(c: &Combatant, now: Timestamp, config: &CombatConfig, extra_multiplier: f32) -> Self {
        let momentum = c.combo.momentum();
        Self {
            base_attack: c.base_attack,
            combo: c.combo.count(),
            momentum: momentum.value(),
            crit_chance: c.crit_chance,
            crit_scale: momentum.crit_multiplier(&config.momentum),
            damage_multiplier: momentum.damage_multiplier(&config.momentum) * extra_multiplier,
            riposte_ready: c.riposte_ready(now),
            position: c.position(),
        }
    }
}

/// Defender values that feed the formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefenderState {
    /// World position.
    pub position: Vec2,
    /// Unit facing.
    pub forward: Vec2,
    /// Parry window is open.
    pub parry_active: bool,
    /// Direct damage is ignored.
    pub invulnerable: bool,
    /// Holding a block.
    pub blocking: bool,
    /// Block was raised just now.
    pub perfect_block: bool,
    /// Damage-taken multiplier.
    pub vulnerability: f32,
}

impl DefenderState {
    /// Defender with no active defense.
    #[must_use]
    pub fn new(position: Vec2, forward: Vec2) -> Self {
        Self {
            position,
            forward: unit_or(forward, Vec2::X),
            parry_active: false,
            invulnerable: false,
            blocking: false,
            perfect_block: false,
            vulnerability: 1.0,
        }
    }

    /// Snapshot a combatant.
    #[must_use]
    pub fn of(c: &Combatant, now: Timestamp, config: &CombatConfig) -> Self {
        Self {
            position: c.position(),
            forward: c.forward(),
            parry_active: c.defense.parry_active(now),
            invulnerable: c.is_invulnerable(now),
            blocking: c.defense.is_blocking(),
            perfect_block: c.defense.perfect_block(now, &config.defense),
            vulnerability: c.status.vulnerability_multiplier(now),
        }
    }
}

/// The strike being resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strike {
    /// Attack type.
    pub attack_type: AttackType,
    /// Weapon type multiplier (or ability multiplier for telegraphs).
    pub weapon_multiplier: f32,
    /// Combo finisher and falloff scale.
    pub scale: f32,
    /// Weapon critical bonus.
    pub crit_bonus: f32,
    /// Knockback force.
    pub knockback: f32,
}

impl Strike {
    /// Strike with unit scale and no bonuses.
    #[must_use]
    pub fn new(attack_type: AttackType, weapon_multiplier: f32) -> Self {
        Self {
            attack_type,
            weapon_multiplier,
            scale: 1.0,
            crit_bonus: 0.0,
            knockback: 0.0,
        }
    }

    /// Set damage scale.
    #[must_use]
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale.max(0.0);
        self
    }

    /// Set critical bonus.
    #[must_use]
    pub fn with_crit_bonus(mut self, bonus: f32) -> Self {
        self.crit_bonus = bonus;
        self
    }

    /// Set knockback force.
    #[must_use]
    pub fn with_knockback(mut self, knockback: f32) -> Self {
        self.knockback = knockback.max(0.0);
        self
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// A landed hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageReport {
    /// Final damage.
    pub damage: f32,
    /// Critical roll succeeded.
    pub is_critical: bool,
    /// Struck from behind.
    pub is_backstab: bool,
    /// Reduced by a frontal block.
    pub blocked: bool,
    /// Block was perfect.
    pub perfect_block: bool,
    /// Riposte counter applied.
    pub riposte: bool,
    /// Knockback impulse for heavy attacks.
    pub knockback: Option<Vec2>,
}

/// Result of resolving a strike.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    /// Defender parried: no damage, attacker is stunned.
    Parried,
    /// Defender is invulnerable.
    Immune,
    /// Damage landed.
    Hit(DamageReport),
}

// ============================================================================
// Pipeline
// ============================================================================

/// Seeded damage calculator.
#[derive(Debug, Clone)]
pub struct DamagePipeline {
    rng: fastrand::Rng,
}

impl DamagePipeline {
    /// Create a pipeline with a fixed seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Damage before defense, critical and backstab.
    #[must_use]
    pub fn base_damage(config: &DamageConfig, attacker: &AttackerState, strike: &Strike) -> f32 {
        let divisor = if config.momentum_divisor > 0.0 {
            config.momentum_divisor
        } else {
            1.0
        };
        attacker.base_attack
            * strike.weapon_multiplier
            * config.attack_types.for_type(strike.attack_type)
            * (1.0 + config.combo_bonus_per_hit * attacker.combo as f32)
            * (1.0 + attacker.momentum / divisor)
    }

    /// Total critical chance for a strike.
    #[must_use]
    pub fn crit_chance(config: &DamageConfig, attacker: &AttackerState, strike: &Strike) -> f32 {
        ((config.base_crit_chance + attacker.crit_chance + strike.crit_bonus) * attacker.crit_scale)
            .clamp(0.0, 1.0)
    }

    /// Run the full pipeline.
    pub fn resolve(
        &mut self,
        config: &DamageConfig,
        attacker: &AttackerState,
        defender: &DefenderState,
        strike: &Strike,
    ) -> DamageOutcome {
        let mut damage = Self::base_damage(config, attacker, strike);

        if defender.parry_active {
            return DamageOutcome::Parried;
        }
        if defender.invulnerable {
            return DamageOutcome::Immune;
        }

        let blocked = defender.blocking
            && facing_dot(defender.forward, defender.position, attacker.position)
                > config.block_arc_dot;
        if blocked {
            damage *= 1.0 - config.block_reduction;
        }

        let is_critical = self.rng.f32() < Self::crit_chance(config, attacker, strike);
        if is_critical {
            damage *= config.crit_multiplier;
        }

        let is_backstab = facing_dot(-defender.forward, defender.position, attacker.position)
            > config.backstab_dot;
        if is_backstab {
            damage *= config.backstab_multiplier;
        }

        if attacker.riposte_ready {
            damage *= config.counter_multiplier;
        }
        damage *= attacker.damage_multiplier * strike.scale * defender.vulnerability;

        let knockback = (strike.attack_type.is_heavy() && strike.knockback > 0.0).then(|| {
            unit_or(defender.position - attacker.position, -defender.forward) * strike.knockback
        });

        DamageOutcome::Hit(DamageReport {
            damage: damage.max(0.0),
            is_critical,
            is_backstab,
            blocked,
            perfect_block: blocked && defender.perfect_block,
            riposte: attacker.riposte_ready,
            knockback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_crit() -> DamageConfig {
        DamageConfig {
            base_crit_chance: 0.0,
            ..DamageConfig::default()
        }
    }

    fn sword_light() -> Strike {
        Strike::new(AttackType::Light, 1.0)
    }

    fn hit(outcome: DamageOutcome) -> DamageReport {
        match outcome {
            DamageOutcome::Hit(report) => report,
            other => panic!("expected hit, got {other:?}"),
        }
    }

    fn resolve(
        config: &DamageConfig,
        attacker: AttackerState,
        defender: DefenderState,
        strike: Strike,
    ) -> DamageOutcome {
        DamagePipeline::new(1).resolve(config, &attacker, &defender, &strike)
    }

    #[test]
    fn test_base_damage_scenario() {
        let config = DamageConfig::default();
        let attacker = AttackerState::new(10.0, Vec2::new(1.0, 0.0));
        assert!((DamagePipeline::base_damage(&config, &attacker, &sword_light()) - 10.0).abs() < 1e-5);

        let outcome = resolve(
            &no_crit(),
            attacker,
            DefenderState::new(Vec2::ZERO, Vec2::X),
            sword_light(),
        );
        assert!((hit(outcome).damage - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_combo_and_momentum_scale_base() {
        let config = DamageConfig::default();
        let mut attacker = AttackerState::new(10.0, Vec2::X);
        attacker.combo = 2;
        attacker.momentum = 50.0;
        let strike = Strike::new(AttackType::Heavy, 1.2);
        // 10 * 1.2 * 1.5 * 1.1 * 1.25
        let expected = 10.0 * 1.2 * 1.5 * 1.1 * 1.25;
        assert!((DamagePipeline::base_damage(&config, &attacker, &strike) - expected).abs() < 1e-3);
    }

    #[test]
    fn test_parry_negates_everything() {
        let mut defender = DefenderState::new(Vec2::ZERO, Vec2::X);
        defender.parry_active = true;
        defender.invulnerable = true;
        let outcome = resolve(
            &no_crit(),
            AttackerState::new(50.0, Vec2::X),
            defender,
            sword_light(),
        );
        assert_eq!(outcome, DamageOutcome::Parried);
    }

    #[test]
    fn test_invulnerable_is_immune() {
        let mut defender = DefenderState::new(Vec2::ZERO, Vec2::X);
        defender.invulnerable = true;
        let outcome = resolve(
            &no_crit(),
            AttackerState::new(50.0, Vec2::X),
            defender,
            sword_light(),
        );
        assert_eq!(outcome, DamageOutcome::Immune);
    }

    #[test]
    fn test_block_only_covers_front() {
        let mut defender = DefenderState::new(Vec2::ZERO, Vec2::X);
        defender.blocking = true;

        let front = hit(resolve(
            &no_crit(),
            AttackerState::new(10.0, Vec2::new(2.0, 0.0)),
            defender,
            sword_light(),
        ));
        assert!(front.blocked);
        assert!((front.damage - 3.0).abs() < 1e-4);

        let side = hit(resolve(
            &no_crit(),
            AttackerState::new(10.0, Vec2::new(0.0, 2.0)),
            defender,
            sword_light(),
        ));
        assert!(!side.blocked);
        assert!((side.damage - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_backstab_behind_not_front() {
        let defender = DefenderState::new(Vec2::ZERO, Vec2::X);

        let behind = hit(resolve(
            &no_crit(),
            AttackerState::new(10.0, Vec2::new(-2.0, 0.0)),
            defender,
            sword_light(),
        ));
        assert!(behind.is_backstab);
        assert!((behind.damage - 15.0).abs() < 1e-4);

        let front = hit(resolve(
            &no_crit(),
            AttackerState::new(10.0, Vec2::new(2.0, 0.0)),
            defender,
            sword_light(),
        ));
        assert!(!front.is_backstab);
        assert!((front.damage - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_guaranteed_critical() {
        let config = DamageConfig {
            base_crit_chance: 1.0,
            ..DamageConfig::default()
        };
        let report = hit(resolve(
            &config,
            AttackerState::new(10.0, Vec2::X),
            DefenderState::new(Vec2::ZERO, Vec2::X),
            sword_light(),
        ));
        assert!(report.is_critical);
        assert!((report.damage - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_riposte_and_vulnerable_multiply() {
        let mut attacker = AttackerState::new(10.0, Vec2::X);
        attacker.riposte_ready = true;
        let mut defender = DefenderState::new(Vec2::ZERO, Vec2::X);
        defender.vulnerability = 1.5;
        let report = hit(resolve(&no_crit(), attacker, defender, sword_light()));
        assert!(report.riposte);
        assert!((report.damage - 30.0).abs() < 1e-4);
    }

    #[test]
    fn test_heavy_attack_knocks_back() {
        let strike = Strike::new(AttackType::Heavy, 1.0).with_knockback(4.0);
        let report = hit(resolve(
            &no_crit(),
            AttackerState::new(10.0, Vec2::new(2.0, 0.0)),
            DefenderState::new(Vec2::ZERO, Vec2::X),
            strike,
        ));
        let impulse = report.knockback.expect("knockback");
        assert!((impulse - Vec2::new(-4.0, 0.0)).length() < 1e-4);

        let light = hit(resolve(
            &no_crit(),
            AttackerState::new(10.0, Vec2::new(2.0, 0.0)),
            DefenderState::new(Vec2::ZERO, Vec2::X),
            sword_light().with_knockback(4.0),
        ));
        assert!(light.knockback.is_none());
    }
}
