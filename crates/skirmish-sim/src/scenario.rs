//! Scripted player-versus-boss encounter.
//!
//! The harness plays the presentation layer: it owns the player and boss
//! poses, moves them between ticks, issues commands, and drains events from
//! the director's channel.

use anyhow::{bail, Result};
use crossbeam_channel::Receiver;
use glam::Vec2;
use serde::Serialize;
use skirmish_combat::events::{self, CombatEvent};
use skirmish_combat::prelude::*;
use skirmish_common::{unit_or, Clock, CombatantId, ManualClock, Timestamp};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Player id.
pub const PLAYER: CombatantId = CombatantId::from_raw(1);
/// Boss id.
pub const BOSS: CombatantId = CombatantId::from_raw(2);

const EVENT_CAPACITY: usize = 4096;
const PLAYER_SPEED: f32 = 5.0;
const PLAYER_REACH: f32 = 1.6;
const BOSS_SPEED: f32 = 2.0;
const BOSS_REACH: f32 = 3.0;
const BOSS_SWING_INTERVAL_MS: u64 = 2000;
const MINION_REACH: f32 = 1.5;
/// Dodge this long before a telegraph lands so its i-frames cover the hit.
const DODGE_LEAD_MS: u64 = 150;
const ATTACK_SCRIPT: [AttackType; 3] = [AttackType::Light, AttackType::Light, AttackType::Heavy];

/// Encounter settings.
#[derive(Debug, Clone)]
pub struct ScenarioOptions {
    /// Boss profile name.
    pub boss_profile: String,
    /// Fixed timestep (ms).
    pub step_ms: u64,
    /// Give up after this long (ms).
    pub max_duration_ms: u64,
    /// Player weapon.
    pub player_weapon: String,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            boss_profile: "warden".to_string(),
            step_ms: 16,
            max_duration_ms: 180_000,
            player_weapon: "sword".to_string(),
        }
    }
}

/// How the encounter ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Boss defeated.
    Victory,
    /// Player died.
    Defeat,
    /// Time limit reached.
    Timeout,
}

/// Encounter report.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// How it ended.
    pub outcome: Outcome,
    /// Simulated time (ms).
    pub elapsed_ms: u64,
    /// Ticks run.
    pub ticks: u64,
    /// Player hp at the end (0 if dead).
    pub player_hp: f32,
    /// Last boss phase observed.
    pub boss_phase: u32,
    /// Damage dealt by the player.
    pub damage_dealt: f32,
    /// Damage taken by the player.
    pub damage_taken: f32,
    /// Telegraphs the player got out of.
    pub telegraphs_avoided: u32,
    /// Event counts by name.
    pub events: BTreeMap<String, usize>,
}

/// A running encounter.
pub struct Encounter {
    director: CombatDirector,
    clock: ManualClock,
    events: Receiver<CombatEvent>,
    player_pose: SharedPose,
    boss_pose: SharedPose,
    opts: ScenarioOptions,
    script_step: usize,
    incoming: Option<Timestamp>,
    next_boss_swing: Timestamp,
    ticks: u64,
    boss_phase: u32,
    damage_dealt: f32,
    damage_taken: f32,
    telegraphs_avoided: u32,
    counts: BTreeMap<String, usize>,
}

impl Encounter {
    /// Register the player and the boss.
    pub fn new(config: CombatConfig, opts: ScenarioOptions) -> Result<Self> {
        let clock = ManualClock::new();
        let (sender, receiver) = events::channel(EVENT_CAPACITY);
        let mut director = CombatDirector::new(config, clock.clone(), sender);

        let player_pose = Pose::new(Vec2::new(6.0, 0.0), -Vec2::X).shared();
        let boss_pose = Pose::new(Vec2::ZERO, Vec2::X).shared();

        let player = CombatantProfile::new()
            .with_hp(300.0)
            .with_base_attack(14.0)
            .with_crit_chance(0.1)
            .with_team(Team::Player);
        let boss = CombatantProfile::new()
            .with_hp(1000.0)
            .with_base_attack(12.0)
            .with_radius(1.2)
            .with_team(Team::Hostile);

        director.register_combatant(PLAYER, std::rc::Rc::clone(&player_pose), &player);
        director.register_combatant(BOSS, std::rc::Rc::clone(&boss_pose), &boss);
        if !director.register_boss(BOSS, &opts.boss_profile) {
            bail!("unknown boss profile '{}'", opts.boss_profile);
        }
        director.set_player(PLAYER);

        Ok(Self {
            director,
            clock,
            events: receiver,
            player_pose,
            boss_pose,
            opts,
            script_step: 0,
            incoming: None,
            next_boss_swing: Timestamp::ZERO,
            ticks: 0,
            boss_phase: 1,
            damage_dealt: 0.0,
            damage_taken: 0.0,
            telegraphs_avoided: 0,
            counts: BTreeMap::new(),
        })
    }

    /// Run one fixed step. Returns the outcome once the fight is over.
    pub fn step(&mut self, on_event: &mut impl FnMut(&CombatEvent)) -> Option<Outcome> {
        self.clock.advance(self.opts.step_ms);
        self.drive_player();
        self.drive_boss();
        self.drive_minions();

        self.director.tick();
        self.ticks += 1;

        for event in events::drain(&self.events) {
            self.observe(&event);
            on_event(&event);
        }

        if self.director.combatant(PLAYER).is_none() {
            Some(Outcome::Defeat)
        } else if self.director.combatant(BOSS).is_none() {
            Some(Outcome::Victory)
        } else if self.clock.now().as_millis() >= self.opts.max_duration_ms {
            Some(Outcome::Timeout)
        } else {
            None
        }
    }

    /// Final report.
    pub fn summary(&self, outcome: Outcome) -> Summary {
        Summary {
            outcome,
            elapsed_ms: self.clock.now().as_millis(),
            ticks: self.ticks,
            player_hp: self.director.combat_stats(PLAYER).map_or(0.0, |s| s.hp),
            boss_phase: self.boss_phase,
            damage_dealt: self.damage_dealt,
            damage_taken: self.damage_taken,
            telegraphs_avoided: self.telegraphs_avoided,
            events: self.counts.clone(),
        }
    }

    fn dt(&self) -> f32 {
        self.opts.step_ms as f32 / 1000.0
    }

    fn drive_player(&mut self) {
        let now = self.clock.now();
        let Some(stats) = self.director.combat_stats(PLAYER) else {
            return;
        };
        let boss_pos = self.boss_pose.borrow().position;
        let pos = self.player_pose.borrow().position;
        let to_boss = boss_pos - pos;
        let facing = unit_or(to_boss, Vec2::X);

        if let Some(lands_at) = self.incoming {
            if now.after(DODGE_LEAD_MS) >= lands_at {
                self.incoming = None;
                let sidestep = facing.perp();
                if self.director.execute_dodge(PLAYER, sidestep) {
                    debug!("Player dodges a telegraph");
                }
                return;
            }
        }
        if stats.is_dodging {
            return;
        }

        {
            let mut pose = self.player_pose.borrow_mut();
            pose.forward = facing;
            let gap = to_boss.length() - PLAYER_REACH;
            if gap > 0.0 {
                pose.position += facing * gap.min(PLAYER_SPEED * self.dt());
            }
        }

        if to_boss.length() <= PLAYER_REACH + 0.5 && self.director.can_attack(PLAYER) {
            let attack = ATTACK_SCRIPT[self.script_step % ATTACK_SCRIPT.len()];
            if self
                .director
                .execute_attack(PLAYER, attack, &self.opts.player_weapon, facing)
                .is_some()
            {
                self.script_step += 1;
            }
        }
    }

    fn drive_boss(&mut self) {
        let now = self.clock.now();
        let Some(boss) = self.director.combatant(BOSS) else {
            return;
        };
        let move_speed = boss.move_speed;
        let player_pos = self.player_pose.borrow().position;
        let to_player = player_pos - self.boss_pose.borrow().position;
        let facing = unit_or(to_player, Vec2::X);

        {
            let mut pose = self.boss_pose.borrow_mut();
            pose.forward = facing;
            let gap = to_player.length() - BOSS_REACH;
            if gap > 0.0 {
                pose.position += facing * gap.min(BOSS_SPEED * move_speed * self.dt());
            }
        }

        if to_player.length() <= BOSS_REACH
            && now >= self.next_boss_swing
            && self
                .director
                .execute_attack(BOSS, AttackType::Light, "boss_claw", facing)
                .is_some()
        {
            self.next_boss_swing = now.after(BOSS_SWING_INTERVAL_MS);
        }
    }

    fn drive_minions(&mut self) {
        let Some(status) = self.director.boss_status(BOSS) else {
            return;
        };
        let player_pos = self.player_pose.borrow().position;
        for minion in status.minions {
            let Some(pos) = self.director.combatant(minion).map(Combatant::position) else {
                continue;
            };
            if pos.distance(player_pos) <= MINION_REACH && self.director.can_attack(minion) {
                self.director
                    .execute_attack(minion, AttackType::Light, "fists", player_pos - pos);
            }
        }
    }

    fn observe(&mut self, event: &CombatEvent) {
        *self.counts.entry(event.name().to_string()).or_default() += 1;

        match event {
            CombatEvent::Hit {
                attacker,
                target,
                damage,
                ..
            } => {
                if *attacker == PLAYER {
                    self.damage_dealt += damage;
                }
                if *target == PLAYER {
                    self.damage_taken += damage;
                }
            },
            CombatEvent::TelegraphAnnounced {
                target,
                resolves_at,
                ability,
                ..
            } if *target == PLAYER => {
                debug!("Incoming {ability} at {}ms", resolves_at.as_millis());
                self.incoming = Some(*resolves_at);
            },
            CombatEvent::TelegraphResolved { hit: false, target, .. } if *target == PLAYER => {
                self.telegraphs_avoided += 1;
            },
            CombatEvent::TransitionStarted { from_phase, .. } => {
                info!("Boss is changing phase (leaving {from_phase})");
                self.incoming = None;
            },
            CombatEvent::PhaseTransition { phase, .. } => {
                self.boss_phase = *phase;
            },
            CombatEvent::Death { entity } => {
                debug!("{entity} died");
            },
            _ => {},
        }
    }
}

/// Run an encounter to completion.
pub fn run(
    config: CombatConfig,
    opts: ScenarioOptions,
    mut on_event: impl FnMut(&CombatEvent),
) -> Result<Summary> {
    let mut encounter = Encounter::new(config, opts)?;
    loop {
        if let Some(outcome) = encounter.step(&mut on_event) {
            return Ok(encounter.summary(outcome));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_boss_profile_is_error() {
        let opts = ScenarioOptions {
            boss_profile: "lich".into(),
            ..ScenarioOptions::default()
        };
        assert!(Encounter::new(CombatConfig::default(), opts).is_err());
    }

    #[test]
    fn test_short_encounter_reports_activity() {
        let opts = ScenarioOptions {
            max_duration_ms: 10_000,
            ..ScenarioOptions::default()
        };
        let mut seen = 0;
        let summary = run(CombatConfig::default(), opts, |_| seen += 1).expect("run");

        assert!(summary.ticks > 0);
        assert!(summary.damage_dealt > 0.0);
        assert!(summary.events.get("telegraph_announced").copied().unwrap_or(0) >= 1);
        assert_eq!(summary.events.values().sum::<usize>(), seen);
    }
}
