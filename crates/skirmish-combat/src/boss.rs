//! Boss encounter mechanics.
//!
//! This module provides:
//! - Boss profiles: phase thresholds, per-phase abilities and cadence
//! - Phase transitions with invulnerability and a final enrage
//! - Ability selection that never repeats the previous ability
//! - Minion summoning at fixed slots and defeat cleanup
//!
//! The controller only reads combatants. Everything it wants changed is
//! returned as a [`BossCommand`] for the director to apply.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use skirmish_common::{CombatantId, Timestamp};
use std::collections::BTreeMap;
use std::f32::consts::TAU;
use tracing::warn;

use crate::abilities::{AbilityCatalog, AbilityDef, AbilityKind};
use crate::combatant::{Combatant, CombatantProfile, Roster, Team};
use crate::error::{CombatError, CombatResult};
use crate::telegraph::TelegraphScheduler;
use crate::tick::Tickable;

// ============================================================================
// Profiles
// ============================================================================

/// Stats and abilities for one boss phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDef {
    /// Movement multiplier.
    pub move_speed: f32,
    /// Time between abilities (ms).
    pub ability_interval_ms: u64,
    /// Ability names available in the phase.
    pub abilities: Vec<String>,
}

impl PhaseDef {
    /// Create a phase.
    #[must_use]
    pub fn new(move_speed: f32, ability_interval_ms: u64, abilities: &[&str]) -> Self {
        Self {
            move_speed,
            ability_interval_ms,
            abilities: abilities.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Encounter definition for a kind of boss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossProfile {
    /// Lookup name.
    pub name: String,
    /// Hp ratios that end each phase, descending.
    pub thresholds: Vec<f32>,
    /// One entry per phase.
    pub phases: Vec<PhaseDef>,
    /// Transition duration (ms).
    pub transition_ms: u64,
    /// Maximum live minions.
    pub max_minions: u32,
    /// Minion hp.
    pub minion_hp: f32,
    /// Minion base attack.
    pub minion_base_attack: f32,
    /// Distance of minion slots from the boss.
    pub minion_spawn_radius: f32,
    /// Periodic summon interval from phase 2 on (ms).
    pub summon_interval_ms: u64,
    /// Enrage damage growth per second.
    pub enrage_rate_per_sec: f32,
    /// Enrage damage cap.
    pub enrage_max_multiplier: f32,
}

impl BossProfile {
    /// Number of phases.
    #[must_use]
    pub fn phase_count(&self) -> u32 {
        self.thresholds.len() as u32 + 1
    }

    /// Definition of a 1-based phase.
    #[must_use]
    pub fn phase(&self, phase: u32) -> Option<&PhaseDef> {
        let index = phase.saturating_sub(1) as usize;
        self.phases.get(index).or_else(|| self.phases.last())
    }

    /// Registration profile for this boss's minions.
    #[must_use]
    pub fn minion_profile(&self) -> CombatantProfile {
        CombatantProfile::new()
            .with_hp(self.minion_hp)
            .with_base_attack(self.minion_base_attack)
            .with_team(Team::Hostile)
    }

    /// Check thresholds, phase table and ability cadence.
    pub fn validate(&self, abilities: &AbilityCatalog) -> CombatResult<()> {
        let invalid = |msg: String| Err(CombatError::InvalidConfig(format!("boss '{}': {msg}", self.name)));

        if self.thresholds.iter().any(|t| !(0.0..1.0).contains(t) || *t <= 0.0) {
            return invalid("thresholds must be within (0, 1)".into());
        }
        if self.thresholds.windows(2).any(|w| w[1] >= w[0]) {
            return invalid("thresholds must be strictly descending".into());
        }
        if self.phases.len() != self.thresholds.len() + 1 {
            return invalid(format!(
                "{} thresholds need {} phases, found {}",
                self.thresholds.len(),
                self.thresholds.len() + 1,
                self.phases.len()
            ));
        }
        if self.enrage_max_multiplier < 1.0 {
            return invalid("enrage_max_multiplier must be >= 1".into());
        }

        for (i, phase) in self.phases.iter().enumerate() {
            let mut longest = 0;
            for name in &phase.abilities {
                match abilities.get(name) {
                    Ok(ability) => longest = longest.max(ability.telegraph_ms),
                    Err(e) => warn!("Boss '{}' phase {}: {e}", self.name, i + 1),
                }
            }
            if phase.ability_interval_ms <= longest {
                return invalid(format!(
                    "phase {} ability interval {}ms must exceed its longest telegraph {}ms",
                    i + 1,
                    phase.ability_interval_ms,
                    longest
                ));
            }
        }
        Ok(())
    }
}

/// The stock boss profiles.
#[must_use]
pub fn default_boss_profiles() -> Vec<BossProfile> {
    vec![BossProfile {
        name: "warden".to_string(),
        thresholds: vec![0.66, 0.33],
        phases: vec![
            PhaseDef::new(1.0, 3000, &["slam", "sweep", "charge"]),
            PhaseDef::new(1.2, 2500, &["slam", "sweep", "charge", "summon"]),
            PhaseDef::new(1.4, 2000, &["slam", "beam", "charge", "sweep", "summon"]),
        ],
        transition_ms: 2000,
        max_minions: 4,
        minion_hp: 60.0,
        minion_base_attack: 5.0,
        minion_spawn_radius: 3.0,
        summon_interval_ms: 15_000,
        enrage_rate_per_sec: 0.02,
        enrage_max_multiplier: 2.0,
    }]
}

// ============================================================================
// Mechanics
// ============================================================================

/// Phase state of a boss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BossState {
    /// Fighting in the current phase.
    Active,
    /// Invulnerable between phases.
    Transitioning {
        /// End of the transition.
        until: Timestamp,
    },
}

/// A live minion and the slot it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinionSlot {
    /// Minion id.
    pub id: CombatantId,
    /// Slot index around the boss.
    pub slot: u32,
}

/// A minion the director should spawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinionSpawn {
    /// Slot index.
    pub slot: u32,
    /// World position.
    pub position: Vec2,
}

/// Per-boss encounter record.
#[derive(Debug, Clone)]
pub struct BossMechanics {
    /// Boss id.
    pub boss: CombatantId,
    /// Encounter definition.
    pub profile: BossProfile,
    phase: u32,
    state: BossState,
    last_ability: Option<String>,
    next_ability_at: Timestamp,
    next_summon_at: Option<Timestamp>,
    minions: Vec<MinionSlot>,
    enraged_since: Option<Timestamp>,
}

impl BossMechanics {
    fn new(boss: CombatantId, profile: BossProfile, now: Timestamp) -> Self {
        let first_interval = profile.phase(1).map_or(0, |p| p.ability_interval_ms);
        Self {
            boss,
            profile,
            phase: 1,
            state: BossState::Active,
            last_ability: None,
            next_ability_at: now.after(first_interval),
            next_summon_at: None,
            minions: Vec::new(),
            enraged_since: None,
        }
    }

    /// Current 1-based phase.
    #[must_use]
    pub fn phase(&self) -> u32 {
        self.phase
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> BossState {
        self.state
    }

    /// Whether a transition is running.
    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        matches!(self.state, BossState::Transitioning { .. })
    }

    /// Whether the final phase has been reached.
    #[must_use]
    pub fn is_enraged(&self) -> bool {
        self.enraged_since.is_some()
    }

    /// Outgoing damage multiplier from enrage.
    #[must_use]
    pub fn enrage_multiplier(&self, now: Timestamp) -> f32 {
        match self.enraged_since {
            Some(since) => (1.0 + self.profile.enrage_rate_per_sec * now.seconds_since(since))
                .min(self.profile.enrage_max_multiplier),
            None => 1.0,
        }
    }

    /// Last ability used.
    #[must_use]
    pub fn last_ability(&self) -> Option<&str> {
        self.last_ability.as_deref()
    }

    /// Live minion ids.
    #[must_use]
    pub fn minions(&self) -> Vec<CombatantId> {
        self.minions.iter().map(|m| m.id).collect()
    }

    /// Position of a minion slot around `center`.
    #[must_use]
    pub fn slot_position(&self, center: Vec2, slot: u32) -> Vec2 {
        let max = self.profile.max_minions.max(1) as f32;
        let angle = slot as f32 * TAU / max;
        center + Vec2::from_angle(angle) * self.profile.minion_spawn_radius
    }

    /// Plan up to `count` spawns into free slots.
    fn plan_summon(&self, center: Vec2, count: u32) -> Vec<MinionSpawn> {
        (0..self.profile.max_minions)
            .filter(|slot| !self.minions.iter().any(|m| m.slot == *slot))
            .take(count as usize)
            .map(|slot| MinionSpawn {
                slot,
                position: self.slot_position(center, slot),
            })
            .collect()
    }
}

/// Snapshot of a boss encounter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BossStatus {
    /// Current phase.
    pub phase: u32,
    /// Number of phases.
    pub phase_count: u32,
    /// Transition running.
    pub transitioning: bool,
    /// Final phase reached.
    pub enraged: bool,
    /// Current enrage damage multiplier.
    pub enrage_multiplier: f32,
    /// Live minions.
    pub minions: Vec<CombatantId>,
    /// Last ability used.
    pub last_ability: Option<String>,
    /// A telegraph is pending.
    pub telegraph_pending: bool,
}

/// Change requested by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum BossCommand {
    /// Make the boss invulnerable and announce the transition.
    BeginTransition {
        /// Boss.
        boss: CombatantId,
        /// Phase being left.
        from_phase: u32,
    },
    /// Clear invulnerability and apply the new phase.
    CompleteTransition {
        /// Boss.
        boss: CombatantId,
        /// Phase entered.
        phase: u32,
        /// Movement multiplier of the new phase.
        move_speed: f32,
        /// This transition started the enrage.
        enraged: bool,
    },
    /// Announce a telegraphed ability.
    UseAbility {
        /// Boss.
        boss: CombatantId,
        /// Ability name.
        ability: String,
        /// Targeted combatant.
        target: CombatantId,
    },
    /// Spawn minions.
    SpawnMinions {
        /// Boss.
        boss: CombatantId,
        /// Slots and positions.
        spawns: Vec<MinionSpawn>,
    },
    /// Boss is dead: zero its minions and drop its telegraph.
    Defeated {
        /// Boss.
        boss: CombatantId,
        /// Minions still alive.
        minions: Vec<CombatantId>,
    },
}

/// Borrowed state for a controller tick.
#[derive(Debug, Clone, Copy)]
pub struct BossContext<'a> {
    /// Registered combatants.
    pub roster: &'a Roster,
    /// Pending telegraphs.
    pub scheduler: &'a TelegraphScheduler,
    /// Ability definitions.
    pub abilities: &'a AbilityCatalog,
    /// Telegraph target.
    pub player: Option<CombatantId>,
}

/// Drives every registered boss.
#[derive(Debug)]
pub struct BossPhaseController {
    bosses: BTreeMap<CombatantId, BossMechanics>,
    rng: fastrand::Rng,
}

impl BossPhaseController {
    /// Create a controller with a fixed selection seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            bosses: BTreeMap::new(),
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Start tracking a boss.
    pub fn register(&mut self, boss: CombatantId, profile: BossProfile, now: Timestamp) {
        self.bosses
            .insert(boss, BossMechanics::new(boss, profile, now));
    }

    /// Stop tracking a boss.
    pub fn remove(&mut self, boss: CombatantId) -> Option<BossMechanics> {
        self.bosses.remove(&boss)
    }

    /// Mechanics record of a boss.
    #[must_use]
    pub fn get(&self, boss: CombatantId) -> Option<&BossMechanics> {
        self.bosses.get(&boss)
    }

    /// Whether `id` is a tracked boss.
    #[must_use]
    pub fn is_boss(&self, id: CombatantId) -> bool {
        self.bosses.contains_key(&id)
    }

    /// Record a spawned minion.
    pub fn adopt_minion(&mut self, boss: CombatantId, minion: CombatantId, slot: u32) {
        if let Some(mech) = self.bosses.get_mut(&boss) {
            mech.minions.push(MinionSlot { id: minion, slot });
        }
    }

    /// Outgoing damage multiplier for `id` (1.0 for non-bosses).
    #[must_use]
    pub fn damage_multiplier(&self, id: CombatantId, now: Timestamp) -> f32 {
        self.bosses
            .get(&id)
            .map_or(1.0, |mech| mech.enrage_multiplier(now))
    }

    /// Snapshot of a boss.
    #[must_use]
    pub fn status(
        &self,
        boss: CombatantId,
        now: Timestamp,
        scheduler: &TelegraphScheduler,
    ) -> Option<BossStatus> {
        self.bosses.get(&boss).map(|mech| BossStatus {
            phase: mech.phase,
            phase_count: mech.profile.phase_count(),
            transitioning: mech.is_transitioning(),
            enraged: mech.is_enraged(),
            enrage_multiplier: mech.enrage_multiplier(now),
            minions: mech.minions(),
            last_ability: mech.last_ability.clone(),
            telegraph_pending: scheduler.is_pending(boss),
        })
    }
}

/// Uniform choice among the phase's known abilities, excluding the previous
/// one whenever another option exists.
fn choose_ability<'a>(
    mech: &BossMechanics,
    abilities: &'a AbilityCatalog,
    rng: &mut fastrand::Rng,
) -> Option<&'a AbilityDef> {
    let phase = mech.profile.phase(mech.phase)?;
    let known: Vec<&AbilityDef> = phase
        .abilities
        .iter()
        .filter_map(|name| match abilities.get(name) {
            Ok(ability) => Some(ability),
            Err(e) => {
                warn!("Boss {} skipping ability: {e}", mech.boss);
                None
            },
        })
        .collect();

    let fresh: Vec<&AbilityDef> = known
        .iter()
        .copied()
        .filter(|a| mech.last_ability.as_deref() != Some(a.name.as_str()))
        .collect();
    let pool = if fresh.is_empty() { known } else { fresh };
    if pool.is_empty() {
        return None;
    }
    Some(pool[rng.usize(..pool.len())])
}

fn is_alive(roster: &Roster, id: CombatantId) -> bool {
    roster.get(&id).is_some_and(Combatant::is_alive)
}

impl Tickable for BossPhaseController {
    type Context<'a> = BossContext<'a>;
    type Output = Vec<BossCommand>;

    fn tick(&mut self, now: Timestamp, ctx: BossContext<'_>) -> Vec<BossCommand> {
        let mut commands = Vec::new();
        let mut defeated = Vec::new();

        for (&id, mech) in &mut self.bosses {
            let boss = match ctx.roster.get(&id) {
                Some(boss) if boss.is_alive() => boss,
                _ => {
                    let minions = mech
                        .minions()
                        .into_iter()
                        .filter(|m| is_alive(ctx.roster, *m))
                        .collect();
                    commands.push(BossCommand::Defeated { boss: id, minions });
                    defeated.push(id);
                    continue;
                },
            };

            mech.minions = mech
                .minions
                .iter()
                .copied()
                .filter(|m| is_alive(ctx.roster, m.id))
                .collect();

            if let BossState::Transitioning { until } = mech.state {
                if now >= until {
                    mech.phase += 1;
                    mech.state = BossState::Active;
                    let enraged =
                        mech.phase >= mech.profile.phase_count() && mech.enraged_since.is_none();
                    if enraged {
                        mech.enraged_since = Some(now);
                    }
                    if mech.phase >= 2 && mech.next_summon_at.is_none() {
                        mech.next_summon_at = Some(now.after(mech.profile.summon_interval_ms));
                    }
                    let phase = mech.profile.phase(mech.phase);
                    mech.next_ability_at = now.after(phase.map_or(0, |p| p.ability_interval_ms));
                    commands.push(BossCommand::CompleteTransition {
                        boss: id,
                        phase: mech.phase,
                        move_speed: phase.map_or(1.0, |p| p.move_speed),
                        enraged,
                    });
                }
                continue;
            }

            if mech.phase < mech.profile.phase_count() {
                let threshold = mech.profile.thresholds[(mech.phase - 1) as usize];
                if boss.hp_ratio() <= threshold {
                    mech.state = BossState::Transitioning {
                        until: now.after(mech.profile.transition_ms),
                    };
                    commands.push(BossCommand::BeginTransition {
                        boss: id,
                        from_phase: mech.phase,
                    });
                    continue;
                }
            }

            let mut summoned = false;
            if mech.next_summon_at.is_some_and(|at| now >= at) {
                mech.next_summon_at = Some(now.after(mech.profile.summon_interval_ms));
                let spawns = mech.plan_summon(boss.position(), mech.profile.max_minions);
                if !spawns.is_empty() {
                    commands.push(BossCommand::SpawnMinions { boss: id, spawns });
                    summoned = true;
                }
            }

            let target = ctx.player.filter(|p| *p != id && is_alive(ctx.roster, *p));
            if now < mech.next_ability_at || ctx.scheduler.is_pending(id) {
                continue;
            }
            let Some(target) = target else {
                continue;
            };
            let interval = mech.profile.phase(mech.phase).map_or(0, |p| p.ability_interval_ms);
            mech.next_ability_at = now.after(interval);

            let Some(ability) = choose_ability(mech, ctx.abilities, &mut self.rng) else {
                continue;
            };
            mech.last_ability = Some(ability.name.clone());
            match ability.kind {
                AbilityKind::Summon { count } => {
                    let spawns = mech.plan_summon(boss.position(), count);
                    if !summoned && !spawns.is_empty() {
                        commands.push(BossCommand::SpawnMinions { boss: id, spawns });
                    }
                },
                _ => commands.push(BossCommand::UseAbility {
                    boss: id,
                    ability: ability.name.clone(),
                    target,
                }),
            }
        }

        for id in defeated {
            self.bosses.remove(&id);
        }
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::default_abilities;
    use crate::combatant::Pose;
    use crate::config::CombatConfig;
    use proptest::prelude::*;

    const BOSS: CombatantId = CombatantId::from_raw(2);
    const PLAYER: CombatantId = CombatantId::from_raw(1);

    fn ms(v: u64) -> Timestamp {
        Timestamp::from_millis(v)
    }

    struct Arena {
        roster: Roster,
        scheduler: TelegraphScheduler,
        abilities: AbilityCatalog,
        controller: BossPhaseController,
    }

    impl Arena {
        fn new() -> Self {
            Self::with_profile(default_boss_profiles().remove(0))
        }

        fn with_profile(profile: BossProfile) -> Self {
            let config = CombatConfig::default();
            let mut roster = Roster::new();
            roster.insert(
                BOSS,
                Combatant::new(
                    BOSS,
                    Box::new(Pose::new(Vec2::ZERO, Vec2::X)),
                    &CombatantProfile::new().with_hp(1000.0).with_team(Team::Hostile),
                    &config,
                ),
            );
            roster.insert(
                PLAYER,
                Combatant::new(
                    PLAYER,
                    Box::new(Pose::new(Vec2::new(3.0, 0.0), -Vec2::X)),
                    &CombatantProfile::new().with_team(Team::Player),
                    &config,
                ),
            );
            let mut controller = BossPhaseController::new(11);
            controller.register(BOSS, profile, ms(0));
            Self {
                roster,
                scheduler: TelegraphScheduler::new(),
                abilities: AbilityCatalog::new(default_abilities()),
                controller,
            }
        }

        fn tick(&mut self, now: u64, player: Option<CombatantId>) -> Vec<BossCommand> {
            self.controller.tick(
                ms(now),
                BossContext {
                    roster: &self.roster,
                    scheduler: &self.scheduler,
                    abilities: &self.abilities,
                    player,
                },
            )
        }

        fn set_boss_hp(&mut self, hp: f32) {
            if let Some(boss) = self.roster.get_mut(&BOSS) {
                boss.hp = hp;
            }
        }

        fn phase(&self) -> u32 {
            self.controller.get(BOSS).map_or(0, BossMechanics::phase)
        }
    }

    #[test]
    fn test_threshold_starts_timed_transition() {
        let mut arena = Arena::new();
        assert!(arena.tick(0, None).is_empty());

        arena.set_boss_hp(660.0);
        assert_eq!(
            arena.tick(100, None),
            vec![BossCommand::BeginTransition {
                boss: BOSS,
                from_phase: 1,
            }]
        );
        assert!(arena.tick(2099, None).is_empty());
        assert_eq!(arena.phase(), 1);

        let done = arena.tick(2100, None);
        assert_eq!(
            done,
            vec![BossCommand::CompleteTransition {
                boss: BOSS,
                phase: 2,
                move_speed: 1.2,
                enraged: false,
            }]
        );
        assert_eq!(arena.phase(), 2);
    }

    #[test]
    fn test_final_phase_enrages() {
        let mut arena = Arena::new();
        arena.set_boss_hp(300.0);
        arena.tick(0, None);
        arena.tick(2000, None);
        assert_eq!(arena.tick(2000, None).len(), 1);
        let done = arena.tick(4000, None);
        assert!(matches!(
            done.as_slice(),
            [BossCommand::CompleteTransition { phase: 3, enraged: true, .. }]
        ));

        let mech = arena.controller.get(BOSS).expect("boss");
        assert!(mech.is_enraged());
        assert!((mech.enrage_multiplier(ms(14_000)) - 1.2).abs() < 1e-4);
        assert!((mech.enrage_multiplier(ms(500_000)) - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_abilities_never_repeat() {
        let mut arena = Arena::new();
        let mut previous: Option<String> = None;
        let mut used = 0;
        for step in 0..40u64 {
            for command in arena.tick(step * 3000, Some(PLAYER)) {
                if let BossCommand::UseAbility { ability, target, .. } = command {
                    assert_eq!(target, PLAYER);
                    assert_ne!(previous.as_deref(), Some(ability.as_str()));
                    previous = Some(ability);
                    used += 1;
                }
            }
        }
        assert!(used >= 30);
    }

    #[test]
    fn test_no_target_no_ability() {
        let mut arena = Arena::new();
        assert!(arena.tick(3000, None).is_empty());
    }

    #[test]
    fn test_pending_telegraph_defers_ability() {
        let mut arena = Arena::new();
        let slam = AbilityDef::new("slam", AbilityKind::Slam { radius: 1.0 }, 1000);
        arena.scheduler.schedule(
            BOSS,
            &slam,
            skirmish_common::HitArea::circle(Vec2::ZERO, 1.0),
            PLAYER,
            ms(0),
        );
        assert!(arena.tick(3000, Some(PLAYER)).is_empty());
        arena.scheduler.cancel(BOSS);
        assert_eq!(arena.tick(3016, Some(PLAYER)).len(), 1);
    }

    #[test]
    fn test_minion_slots_and_defeat() {
        let mut arena = Arena::new();
        let mech = arena.controller.get(BOSS).expect("boss");
        let east = mech.slot_position(Vec2::ZERO, 0);
        let north = mech.slot_position(Vec2::ZERO, 1);
        assert!((east - Vec2::new(3.0, 0.0)).length() < 1e-4);
        assert!((north - Vec2::new(0.0, 3.0)).length() < 1e-4);

        let minion = CombatantId::from_raw(50);
        arena.roster.insert(
            minion,
            Combatant::new(
                minion,
                Box::new(Pose::new(east, Vec2::X)),
                &default_boss_profiles()[0].minion_profile(),
                &CombatConfig::default(),
            ),
        );
        arena.controller.adopt_minion(BOSS, minion, 0);

        arena.set_boss_hp(0.0);
        assert_eq!(
            arena.tick(100, None),
            vec![BossCommand::Defeated {
                boss: BOSS,
                minions: vec![minion],
            }]
        );
        assert!(arena.controller.get(BOSS).is_none());
    }

    /// Warden whose second phase only knows the summon ability.
    fn summoner(summon_interval_ms: u64) -> Arena {
        let mut profile = default_boss_profiles().remove(0);
        profile.phases[1].abilities = vec!["summon".to_string()];
        profile.summon_interval_ms = summon_interval_ms;
        let mut arena = Arena::with_profile(profile);
        arena.set_boss_hp(660.0);
        arena.tick(0, Some(PLAYER));
        arena.tick(2000, Some(PLAYER));
        assert_eq!(arena.phase(), 2);
        arena
    }

    #[test]
    fn test_summon_ability_spawns_its_count() {
        let mut arena = summoner(15_000);
        // Phase 2 ability interval is 2500ms
        let commands = arena.tick(4500, Some(PLAYER));
        match commands.as_slice() {
            [BossCommand::SpawnMinions { boss, spawns }] => {
                assert_eq!(*boss, BOSS);
                assert_eq!(spawns.iter().map(|s| s.slot).collect::<Vec<_>>(), vec![0, 1]);
            },
            other => panic!("unexpected {other:?}"),
        }
        let mech = arena.controller.get(BOSS).expect("boss");
        assert_eq!(mech.last_ability(), Some("summon"));
    }

    #[test]
    fn test_summon_ability_yields_to_periodic_summon() {
        let mut arena = summoner(2500);
        let commands = arena.tick(4500, Some(PLAYER));
        match commands.as_slice() {
            [BossCommand::SpawnMinions { spawns, .. }] => assert_eq!(spawns.len(), 4),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            arena.controller.get(BOSS).and_then(BossMechanics::last_ability),
            Some("summon")
        );
    }

    #[test]
    fn test_validation_rejects_mismatched_phases() {
        let mut profile = default_boss_profiles().remove(0);
        profile.phases.pop();
        let abilities = AbilityCatalog::new(default_abilities());
        assert!(matches!(
            profile.validate(&abilities),
            Err(CombatError::InvalidConfig(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_phase_never_decreases(
            steps in proptest::collection::vec((0.0f32..1000.0, 1u64..3000), 1..60)
        ) {
            let mut arena = Arena::new();
            let mut now = 0;
            let mut last_phase = arena.phase();
            for (hp, dt) in steps {
                now += dt;
                arena.set_boss_hp(hp.max(1.0));
                arena.tick(now, None);
                let phase = arena.phase();
                prop_assert!(phase >= last_phase);
                prop_assert!(phase <= 3);
                last_phase = phase;
            }
        }
    }
}
