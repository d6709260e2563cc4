//! Top-level combat session.
//!
//! The director owns every combatant and component of one fight. Callers
//! register actors, issue attack and defense commands, and call
//! [`CombatDirector::tick`] once per frame. Outbound notifications go to the
//! [`EventSink`] injected at construction.

use glam::Vec2;
use skirmish_common::{unit_or, Clock, CombatantId, HitboxId, IdAllocator, Timestamp};
use tracing::{debug, info, warn};

use crate::abilities::AbilityCatalog;
use crate::boss::{BossCommand, BossContext, BossPhaseController, BossStatus, MinionSpawn};
use crate::combatant::{Combatant, CombatantProfile, CombatStats, Pose, PoseSource, Roster};
use crate::combo::{ComboAction, ComboRecord};
use crate::config::CombatConfig;
use crate::damage::{AttackerState, DamageOutcome, DamagePipeline, DefenderState, Strike};
use crate::defense::DefenseContext;
use crate::error::CombatError;
use crate::events::{CombatEvent, EventSink};
use crate::hitbox::{HitboxContact, HitboxResolver};
use crate::momentum::TierChange;
use crate::status::StatusKind;
use crate::telegraph::{TelegraphScheduler, TelegraphStrike};
use crate::tick::Tickable;
use crate::weapons::{AttackType, WeaponCatalog, WeaponType};

fn tier_event(entity: CombatantId, change: TierChange) -> CombatEvent {
    CombatEvent::MomentumTierChanged {
        entity,
        from: change.from,
        to: change.to,
    }
}

fn combo_events(entity: CombatantId, record: ComboRecord, events: &mut Vec<CombatEvent>) {
    if let Some(done) = record.completed {
        events.push(CombatEvent::ComboCompleted {
            entity,
            name: done.name,
            multiplier: done.multiplier,
        });
    }
    if let Some(change) = record.tier_change {
        events.push(tier_event(entity, change));
    }
}

/// One combat session.
pub struct CombatDirector {
    config: CombatConfig,
    clock: Box<dyn Clock>,
    sink: Box<dyn EventSink>,
    roster: Roster,
    hitboxes: HitboxResolver,
    telegraphs: TelegraphScheduler,
    bosses: BossPhaseController,
    pipeline: DamagePipeline,
    weapons: WeaponCatalog,
    abilities: AbilityCatalog,
    minion_ids: IdAllocator,
    player: Option<CombatantId>,
}

impl std::fmt::Debug for CombatDirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatDirector")
            .field("combatants", &self.roster.len())
            .field("hitboxes", &self.hitboxes.active_count())
            .field("player", &self.player)
            .finish_non_exhaustive()
    }
}

impl CombatDirector {
    /// Create a session. An invalid configuration is logged and used as is.
    pub fn new(
        config: CombatConfig,
        clock: impl Clock + 'static,
        sink: impl EventSink + 'static,
    ) -> Self {
        if let Err(e) = config.validate() {
            warn!("Combat config failed validation: {e}");
        }
        let seed = config.rng_seed;
        Self {
            weapons: WeaponCatalog::new(config.weapons.iter().cloned()),
            abilities: AbilityCatalog::new(config.abilities.iter().cloned()),
            config,
            clock: Box::new(clock),
            sink: Box::new(sink),
            roster: Roster::new(),
            hitboxes: HitboxResolver::new(),
            telegraphs: TelegraphScheduler::new(),
            bosses: BossPhaseController::new(seed.rotate_left(17)),
            pipeline: DamagePipeline::new(seed),
            minion_ids: IdAllocator::default(),
            player: None,
        }
    }

    /// Current session time.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    /// Registered combatant.
    #[must_use]
    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.roster.get(&id)
    }

    /// Number of registered combatants.
    #[must_use]
    pub fn combatant_count(&self) -> usize {
        self.roster.len()
    }

    /// Designated telegraph target.
    #[must_use]
    pub fn player(&self) -> Option<CombatantId> {
        self.player
    }

    fn flush(&mut self, events: Vec<CombatEvent>) {
        for event in events {
            self.sink.emit(event);
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register an actor. Returns false for a null or duplicate id.
    pub fn register_combatant(
        &mut self,
        id: CombatantId,
        pose: impl PoseSource + 'static,
        profile: &CombatantProfile,
    ) -> bool {
        if !id.is_valid() || self.roster.contains_key(&id) {
            warn!("{}", CombatError::DuplicateCombatant(id));
            return false;
        }
        self.roster
            .insert(id, Combatant::new(id, Box::new(pose), profile, &self.config));
        debug!("Registered combatant {id} ({:?})", profile.team);
        true
    }

    /// Remove an actor and everything it owns.
    pub fn unregister_combatant(&mut self, id: CombatantId) -> bool {
        if self.roster.remove(&id).is_none() {
            return false;
        }
        self.hitboxes.remove_owned_by(id);
        self.telegraphs.cancel(id);
        self.bosses.remove(id);
        if self.player == Some(id) {
            self.player = None;
        }
        debug!("Unregistered combatant {id}");
        true
    }

    /// Attach boss mechanics from a named profile to a registered actor.
    pub fn register_boss(&mut self, id: CombatantId, profile_name: &str) -> bool {
        if !self.roster.contains_key(&id) {
            warn!("Cannot register boss: {}", CombatError::UnknownCombatant(id));
            return false;
        }
        let profile = match self.config.boss_profile(profile_name) {
            Ok(profile) => profile.clone(),
            Err(e) => {
                warn!("Cannot register boss {id}: {e}");
                return false;
            },
        };
        info!("Boss {id} registered as '{}'", profile.name);
        let now = self.clock.now();
        self.bosses.register(id, profile, now);
        true
    }

    /// Designate the actor bosses aim at.
    pub fn set_player(&mut self, id: CombatantId) -> bool {
        if !self.roster.contains_key(&id) {
            warn!("Cannot set player: {}", CombatError::UnknownCombatant(id));
            return false;
        }
        self.player = Some(id);
        true
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Start an attack with a named weapon.
    ///
    /// A zero `direction` swings along the actor's facing. Returns `None`
    /// when the actor is unknown, cannot act, is recovering, lacks stamina,
    /// or the weapon is unknown. `AttackType::Telegraph` is reserved for
    /// boss abilities and always refused here.
    pub fn execute_attack(
        &mut self,
        id: CombatantId,
        attack_type: AttackType,
        weapon_name: &str,
        direction: Vec2,
    ) -> Option<HitboxId> {
        let now = self.clock.now();
        let mut events = Vec::new();
        let Some(attacker) = self.roster.get_mut(&id) else {
            debug!("Attack from unregistered {id} ignored");
            return None;
        };
        if attack_type == AttackType::Telegraph {
            debug!("{id} cannot swing a telegraph attack");
            return None;
        }

        let template = match self.weapons.get(weapon_name) {
            Ok(template) => template,
            Err(e) => {
                warn!("Attack from {id} fizzled: {e}");
                self.sink.emit(CombatEvent::AttackFizzled {
                    attacker: id,
                    weapon: weapon_name.to_string(),
                });
                return None;
            },
        };

        if !attacker.can_attack(now) {
            debug!("{id} cannot attack yet");
            return None;
        }
        let cost = template.stamina_cost_for(attack_type);
        if !attacker.stamina.consume(cost) {
            debug!(
                "{id} lacks stamina for {weapon_name}: {:.1} < {cost:.1}",
                attacker.stamina.current()
            );
            return None;
        }

        let mut scale = 1.0;
        if let Some(action) = ComboAction::from_attack(attack_type) {
            let record = attacker.combo.record(action, now, &self.config);
            if let Some(done) = &record.completed {
                debug!("{id} completed combo '{}'", done.name);
                scale = done.multiplier;
            }
            combo_events(id, record, &mut events);
        }

        let speed = attacker
            .combo
            .momentum()
            .attack_speed_multiplier(&self.config.momentum)
            * attacker
                .status
                .slow_multiplier(now, self.config.status.slow_cap);
        let recovery = template.recovery_ms as f32 / speed.max(0.05);
        attacker.attack_ready_at = now.after(recovery as u64);

        let hitbox = self
            .hitboxes
            .create_hitbox(attacker, template, attack_type, direction, scale, now);
        self.flush(events);
        Some(hitbox)
    }

    /// Start a dodge. A zero `direction` dodges backwards.
    pub fn execute_dodge(&mut self, id: CombatantId, direction: Vec2) -> bool {
        let now = self.clock.now();
        let Some(actor) = self.roster.get_mut(&id) else {
            return false;
        };
        if !actor.can_act(now) {
            return false;
        }
        let fallback = -actor.forward();
        if let Err(rejection) = actor.defense.attempt_dodge(
            now,
            direction,
            fallback,
            &mut actor.stamina,
            &self.config.defense,
        ) {
            debug!("{id} dodge rejected: {rejection:?}");
            return false;
        }

        let mut events = Vec::new();
        let record = actor.combo.record(ComboAction::Dodge, now, &self.config);
        combo_events(id, record, &mut events);
        self.flush(events);
        true
    }

    /// Enter a parry stance.
    pub fn execute_parry(&mut self, id: CombatantId) -> bool {
        let now = self.clock.now();
        let Some(actor) = self.roster.get_mut(&id) else {
            return false;
        };
        if !actor.can_act(now) {
            return false;
        }
        match actor
            .defense
            .attempt_parry(now, &mut actor.stamina, &self.config.defense)
        {
            Ok(()) => true,
            Err(rejection) => {
                debug!("{id} parry rejected: {rejection:?}");
                false
            },
        }
    }

    /// Raise or lower a block.
    pub fn execute_block(&mut self, id: CombatantId, raised: bool) -> bool {
        let now = self.clock.now();
        let Some(actor) = self.roster.get_mut(&id) else {
            return false;
        };
        if raised && !actor.can_act(now) {
            return false;
        }
        match actor.defense.set_blocking(raised, now, &actor.stamina) {
            Ok(()) => true,
            Err(rejection) => {
                debug!("{id} block rejected: {rejection:?}");
                false
            },
        }
    }

    /// Apply or refresh a status effect.
    pub fn apply_status(
        &mut self,
        id: CombatantId,
        kind: StatusKind,
        duration_ms: u64,
        magnitude: f32,
    ) -> bool {
        let now = self.clock.now();
        let mut events = Vec::new();
        if !self.apply_status_at(id, kind, duration_ms, magnitude, now, &mut events) {
            return false;
        }
        self.flush(events);
        true
    }

    fn apply_status_at(
        &mut self,
        id: CombatantId,
        kind: StatusKind,
        duration_ms: u64,
        magnitude: f32,
        now: Timestamp,
        events: &mut Vec<CombatEvent>,
    ) -> bool {
        let Some(actor) = self.roster.get_mut(&id) else {
            return false;
        };
        let applied = actor.status.apply(kind, duration_ms, magnitude, now);
        if kind == StatusKind::Stun {
            actor.defense.interrupt_block();
        }
        if let Some(cancelled) = applied.cancelled {
            events.push(CombatEvent::StatusExpired {
                entity: id,
                kind: cancelled,
            });
        }
        events.push(CombatEvent::StatusApplied {
            entity: id,
            kind,
            stacks: applied.stacks,
            expires_at: applied.expires_at,
        });
        true
    }

    /// Damage that bypasses the pipeline (scripted hazards). Invulnerable
    /// actors take nothing. Returns the hp removed.
    pub fn apply_direct_damage(&mut self, id: CombatantId, amount: f32) -> f32 {
        let now = self.clock.now();
        match self.roster.get_mut(&id) {
            Some(actor) if !actor.is_invulnerable(now) => actor.take_damage(amount),
            _ => 0.0,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether an attack may start now.
    #[must_use]
    pub fn can_attack(&self, id: CombatantId) -> bool {
        let now = self.clock.now();
        self.roster.get(&id).is_some_and(|c| c.can_attack(now))
    }

    /// Snapshot of an actor.
    #[must_use]
    pub fn combat_stats(&self, id: CombatantId) -> Option<CombatStats> {
        let now = self.clock.now();
        self.roster.get(&id).map(|c| c.stats(now))
    }

    /// Snapshot of a boss encounter.
    #[must_use]
    pub fn boss_status(&self, id: CombatantId) -> Option<BossStatus> {
        self.bosses.status(id, self.clock.now(), &self.telegraphs)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance the session to the clock's current time.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        let mut events = Vec::new();

        self.update_actors(now, &mut events);

        let contacts = self.hitboxes.tick(now, &self.roster);
        for contact in contacts {
            self.resolve_contact(now, contact, &mut events);
        }

        let strikes = self.telegraphs.tick(now, &self.roster);
        for strike in strikes {
            self.resolve_telegraph(now, strike, &mut events);
        }

        self.tick_status(now, &mut events);

        let mut dead = Vec::new();
        self.collect_dead(&mut dead, &mut events);

        let commands = self.bosses.tick(
            now,
            BossContext {
                roster: &self.roster,
                scheduler: &self.telegraphs,
                abilities: &self.abilities,
                player: self.player,
            },
        );
        for command in commands {
            self.apply_boss_command(now, command, &mut events);
        }

        self.collect_dead(&mut dead, &mut events);
        for id in dead {
            self.roster.remove(&id);
            self.hitboxes.remove_owned_by(id);
            self.telegraphs.cancel(id);
        }

        self.flush(events);
    }

    fn update_actors(&mut self, now: Timestamp, events: &mut Vec<CombatEvent>) {
        for actor in self.roster.values_mut() {
            let combo = actor.combo.tick(now, &self.config);
            if let Some(change) = combo.tier_change {
                events.push(tier_event(actor.id, change));
            }

            let defense = actor.defense.tick(
                now,
                DefenseContext {
                    config: &self.config.defense,
                    stamina: &mut actor.stamina,
                },
            );
            if defense.displacement != Vec2::ZERO {
                let speed = actor.move_speed
                    * actor
                        .status
                        .slow_multiplier(now, self.config.status.slow_cap);
                actor.pose.translate(defense.displacement * speed);
            }
            if defense.block_broken {
                debug!("{} block broken", actor.id);
            }

            if actor.riposte_until.is_some_and(|until| now >= until) {
                actor.riposte_until = None;
            }
        }
    }

    fn resolve_contact(&mut self, now: Timestamp, contact: HitboxContact, events: &mut Vec<CombatEvent>) {
        let (Some(attacker), Some(defender)) = (
            self.roster.get(&contact.attacker),
            self.roster.get(&contact.target),
        ) else {
            return;
        };
        if !defender.is_alive() {
            return;
        }

        let enrage = self.bosses.damage_multiplier(contact.attacker, now);
        let attacker_state = AttackerState::of(attacker, now, &self.config, enrage);
        let defender_state = DefenderState::of(defender, now, &self.config);
        let strike = Strike::new(
            contact.attack_type,
            self.config.damage.weapon_types.for_type(contact.weapon_type),
        )
        .with_scale(contact.scale)
        .with_crit_bonus(contact.crit_bonus)
        .with_knockback(contact.knockback);

        let outcome =
            self.pipeline
                .resolve(&self.config.damage, &attacker_state, &defender_state, &strike);
        self.apply_outcome(
            now,
            contact.attacker,
            contact.target,
            outcome,
            Some(contact.weapon_type),
            contact.weapon,
            events,
        );
    }

    fn resolve_telegraph(&mut self, now: Timestamp, strike: TelegraphStrike, events: &mut Vec<CombatEvent>) {
        events.push(CombatEvent::TelegraphResolved {
            boss: strike.boss,
            telegraph: strike.telegraph,
            ability: strike.ability.clone(),
            target: strike.target,
            hit: strike.hit,
        });
        if !strike.hit {
            debug!("Telegraph '{}' from {} missed", strike.ability, strike.boss);
            return;
        }

        let (Some(boss), Some(target)) = (
            self.roster.get(&strike.boss),
            self.roster.get(&strike.target),
        ) else {
            return;
        };
        if !boss.is_alive() {
            return;
        }

        let enrage = self.bosses.damage_multiplier(strike.boss, now);
        let attacker_state = AttackerState::of(boss, now, &self.config, enrage);
        let defender_state = DefenderState::of(target, now, &self.config);
        let hit = Strike::new(AttackType::Telegraph, strike.damage_multiplier)
            .with_scale(strike.falloff)
            .with_knockback(strike.knockback);

        let outcome =
            self.pipeline
                .resolve(&self.config.damage, &attacker_state, &defender_state, &hit);
        self.apply_outcome(now, strike.boss, strike.target, outcome, None, strike.ability, events);
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_outcome(
        &mut self,
        now: Timestamp,
        attacker: CombatantId,
        target: CombatantId,
        outcome: DamageOutcome,
        weapon_type: Option<WeaponType>,
        source: String,
        events: &mut Vec<CombatEvent>,
    ) {
        match outcome {
            DamageOutcome::Parried => {
                let stun_ms = self.config.defense.parry_stun_ms;
                self.apply_status_at(attacker, StatusKind::Stun, stun_ms, 1.0, now, events);
                if let Some(defender) = self.roster.get_mut(&target) {
                    defender.riposte_until = Some(now.after(self.config.defense.riposte_window_ms));
                }
                debug!("{target} parried {attacker}");
                events.push(CombatEvent::Parry {
                    attacker,
                    defender: target,
                });
            },
            DamageOutcome::Immune => {
                debug!("{target} is immune to {attacker}");
            },
            DamageOutcome::Hit(report) => {
                let Some(defender) = self.roster.get_mut(&target) else {
                    return;
                };
                defender.take_damage(report.damage);
                debug!(
                    "{attacker} hit {target} with {source} for {:.1} (crit: {}, backstab: {})",
                    report.damage, report.is_critical, report.is_backstab
                );
                events.push(CombatEvent::Hit {
                    attacker,
                    target,
                    damage: report.damage,
                    is_critical: report.is_critical,
                    is_backstab: report.is_backstab,
                    weapon_type,
                    source,
                    blocked: report.blocked,
                    riposte: report.riposte,
                });

                if report.blocked {
                    if defender
                        .stamina
                        .drain(self.config.defense.block_hit_stamina_cost)
                    {
                        defender.defense.interrupt_block();
                    }
                    events.push(CombatEvent::Block {
                        attacker,
                        defender: target,
                        perfect: report.perfect_block,
                    });
                    if report.perfect_block {
                        if let Some(change) = defender.combo.register_perfect_block(now, &self.config) {
                            events.push(tier_event(target, change));
                        }
                    }
                }
                if let Some(impulse) = report.knockback {
                    events.push(CombatEvent::Knockback { target, impulse });
                }

                if let Some(striker) = self.roster.get_mut(&attacker) {
                    if report.riposte {
                        striker.riposte_until = None;
                    }
                    if let Some(change) = striker.combo.register_hit(report.is_critical, now, &self.config) {
                        events.push(tier_event(attacker, change));
                    }
                }
            },
        }
    }

    fn tick_status(&mut self, now: Timestamp, events: &mut Vec<CombatEvent>) {
        for actor in self.roster.values_mut() {
            let tick = actor.status.tick(now, ());
            if tick.dot_damage > 0.0 && actor.is_alive() {
                let dealt = actor.take_damage(tick.dot_damage);
                debug!("{} took {dealt:.1} damage over time", actor.id);
            }
            for kind in tick.expired {
                events.push(CombatEvent::StatusExpired {
                    entity: actor.id,
                    kind,
                });
            }
        }
    }

    fn collect_dead(&self, dead: &mut Vec<CombatantId>, events: &mut Vec<CombatEvent>) {
        for actor in self.roster.values() {
            if !actor.is_alive() && !dead.contains(&actor.id) {
                info!("Combatant {} died", actor.id);
                dead.push(actor.id);
                events.push(CombatEvent::Death { entity: actor.id });
            }
        }
    }

    // ========================================================================
    // Boss commands
    // ========================================================================

    fn apply_boss_command(&mut self, now: Timestamp, command: BossCommand, events: &mut Vec<CombatEvent>) {
        match command {
            BossCommand::BeginTransition { boss, from_phase } => {
                if let Some(actor) = self.roster.get_mut(&boss) {
                    actor.invulnerable = true;
                }
                self.telegraphs.cancel(boss);
                info!("Boss {boss} leaving phase {from_phase}");
                events.push(CombatEvent::TransitionStarted { boss, from_phase });
            },
            BossCommand::CompleteTransition {
                boss,
                phase,
                move_speed,
                enraged,
            } => {
                if let Some(actor) = self.roster.get_mut(&boss) {
                    actor.invulnerable = false;
                    actor.move_speed = move_speed;
                }
                info!("Boss {boss} entered phase {phase}");
                events.push(CombatEvent::PhaseTransition { boss, phase });
                if enraged {
                    info!("Boss {boss} is enraged");
                    events.push(CombatEvent::Enraged { boss });
                }
            },
            BossCommand::UseAbility {
                boss,
                ability,
                target,
            } => self.announce_ability(now, boss, &ability, target, events),
            BossCommand::SpawnMinions { boss, spawns } => {
                self.spawn_minions(boss, &spawns, events);
            },
            BossCommand::Defeated { boss, minions } => {
                for minion in minions {
                    if let Some(actor) = self.roster.get_mut(&minion) {
                        actor.hp = 0.0;
                    }
                }
                self.telegraphs.cancel(boss);
                self.hitboxes.remove_owned_by(boss);
                info!("Boss {boss} defeated");
                events.push(CombatEvent::BossDefeated { boss });
            },
        }
    }

    fn announce_ability(
        &mut self,
        now: Timestamp,
        boss: CombatantId,
        ability: &str,
        target: CombatantId,
        events: &mut Vec<CombatEvent>,
    ) {
        let def = match self.abilities.get(ability) {
            Ok(def) => def,
            Err(e) => {
                warn!("Boss {boss}: {e}");
                return;
            },
        };
        let (Some(caster), Some(victim)) = (self.roster.get(&boss), self.roster.get(&target)) else {
            return;
        };
        let Some(area) = def.plan_area(caster.position(), caster.forward(), victim.position()) else {
            return;
        };

        match self.telegraphs.schedule(boss, def, area, target, now) {
            Some(telegraph) => {
                let resolves_at = now.after(def.telegraph_ms);
                debug!("Boss {boss} telegraphs '{ability}' at {target}");
                events.push(CombatEvent::TelegraphAnnounced {
                    boss,
                    telegraph,
                    ability: ability.to_string(),
                    target,
                    resolves_at,
                });
            },
            None => warn!("{}", CombatError::TelegraphPending(boss)),
        }
    }

    fn spawn_minions(&mut self, boss: CombatantId, spawns: &[MinionSpawn], events: &mut Vec<CombatEvent>) {
        let Some(profile) = self.bosses.get(boss).map(|m| m.profile.minion_profile()) else {
            return;
        };
        let center = self.roster.get(&boss).map_or(Vec2::ZERO, Combatant::position);

        for spawn in spawns {
            let id = self.minion_ids.next_free(|id| self.roster.contains_key(&id));
            let facing = unit_or(center - spawn.position, Vec2::X);
            let mut minion = Combatant::new(
                id,
                Box::new(Pose::new(spawn.position, facing)),
                &profile,
                &self.config,
            );
            minion.is_minion = true;
            self.roster.insert(id, minion);
            self.bosses.adopt_minion(boss, id, spawn.slot);
            debug!("Boss {boss} summoned {id} in slot {}", spawn.slot);
            events.push(CombatEvent::MinionSpawned {
                boss,
                minion: id,
                position: spawn.position,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::{SharedPose, Team};
    use crate::config::DamageConfig;
    use crate::events::RecordingSink;
    use crate::momentum::MomentumTier;
    use crate::weapons::{HitShape, WeaponTemplate};
    use proptest::prelude::*;
    use skirmish_common::ManualClock;

    const PLAYER: CombatantId = CombatantId::from_raw(1);
    const ENEMY: CombatantId = CombatantId::from_raw(2);

    struct Session {
        director: CombatDirector,
        clock: ManualClock,
        sink: RecordingSink,
    }

    impl Session {
        fn config() -> CombatConfig {
            CombatConfig {
                damage: DamageConfig {
                    base_crit_chance: 0.0,
                    ..DamageConfig::default()
                },
                ..CombatConfig::default()
            }
        }

        fn new() -> Self {
            Self::with_config(Self::config())
        }

        fn with_config(config: CombatConfig) -> Self {
            let clock = ManualClock::new();
            let sink = RecordingSink::new();
            let director = CombatDirector::new(config, clock.clone(), sink.clone());
            Self {
                director,
                clock,
                sink,
            }
        }

        /// Player at the origin facing an enemy 1.2 units away.
        fn duel() -> Self {
            let mut s = Self::new();
            s.add(PLAYER, Vec2::ZERO, Vec2::X, CombatantProfile::new().with_team(Team::Player));
            s.add(
                ENEMY,
                Vec2::new(1.2, 0.0),
                -Vec2::X,
                CombatantProfile::new().with_team(Team::Hostile),
            );
            s
        }

        fn add(&mut self, id: CombatantId, at: Vec2, facing: Vec2, profile: CombatantProfile) -> SharedPose {
            let pose = Pose::new(at, facing).shared();
            assert!(self
                .director
                .register_combatant(id, std::rc::Rc::clone(&pose), &profile));
            pose
        }

        fn at(&mut self, ms: u64) {
            self.clock.set(Timestamp::from_millis(ms));
            self.director.tick();
        }

        fn hp(&self, id: CombatantId) -> f32 {
            self.director.combat_stats(id).map_or(-1.0, |s| s.hp)
        }

        fn hits(&self) -> Vec<CombatEvent> {
            self.sink
                .events()
                .into_iter()
                .filter(|e| matches!(e, CombatEvent::Hit { .. }))
                .collect()
        }

        fn count(&self, name: &str) -> usize {
            self.sink.events().iter().filter(|e| e.name() == name).count()
        }
    }

    #[test]
    fn test_attack_hits_once_and_builds_momentum() {
        let mut s = Session::duel();
        assert!(s
            .director
            .execute_attack(PLAYER, AttackType::Light, "sword", Vec2::ZERO)
            .is_some());
        s.at(0);
        s.at(16);
        s.at(32);

        let hits = s.hits();
        assert_eq!(hits.len(), 1);
        match &hits[0] {
            CombatEvent::Hit {
                attacker,
                target,
                damage,
                weapon_type,
                is_backstab,
                ..
            } => {
                assert_eq!(*attacker, PLAYER);
                assert_eq!(*target, ENEMY);
                // combo 1 adds 5%
                assert!((damage - 10.5).abs() < 1e-3);
                assert_eq!(*weapon_type, Some(WeaponType::Sword));
                assert!(!is_backstab);
            },
            other => panic!("unexpected {other:?}"),
        }
        assert!((s.hp(ENEMY) - 89.5).abs() < 1e-3);

        let stats = s.director.combat_stats(PLAYER).expect("player");
        assert_eq!(stats.combo, 1);
        assert!(stats.momentum > 0.0);
        assert!((stats.stamina - 88.0).abs() < 1.0);
    }

    #[test]
    fn test_telegraph_attack_type_refused() {
        let mut s = Session::duel();
        assert!(s
            .director
            .execute_attack(PLAYER, AttackType::Telegraph, "sword", Vec2::ZERO)
            .is_none());
        s.at(0);
        s.at(16);

        assert!(s.hits().is_empty());
        let stats = s.director.combat_stats(PLAYER).expect("player");
        assert!((stats.stamina - 100.0).abs() < 1e-6);
        assert_eq!(stats.combo, 0);
        assert!(s.director.can_attack(PLAYER));
    }

    #[test]
    fn test_malformed_weapon_shape_does_not_stop_tick() {
        let mut config = Session::config();
        config.weapons.push(WeaponTemplate::new(
            "bent",
            WeaponType::Sword,
            HitShape::Box {
                half_length: -1.0,
                half_width: 0.5,
            },
        ));
        let mut s = Session::with_config(config);
        s.add(PLAYER, Vec2::ZERO, Vec2::X, CombatantProfile::new().with_team(Team::Player));
        s.add(
            ENEMY,
            Vec2::new(1.2, 0.0),
            -Vec2::X,
            CombatantProfile::new().with_team(Team::Hostile),
        );

        assert!(s
            .director
            .execute_attack(PLAYER, AttackType::Light, "bent", Vec2::ZERO)
            .is_some());
        s.at(0);
        s.at(16);
        // The inverted extent collapses to a thin box that still reaches
        assert_eq!(s.hits().len(), 1);
    }

    #[test]
    fn test_peak_invulnerability_outlasts_decay() {
        let mut s = Session::duel();
        let config = s.director.config.clone();
        let player = s.director.roster.get_mut(&PLAYER).expect("player");
        for _ in 0..10 {
            player.combo.register_perfect_block(Timestamp::ZERO, &config);
        }
        s.at(0);
        s.at(16);

        // Decay leaves the Peak tier on the next frame
        let stats = s.director.combat_stats(PLAYER).expect("player");
        assert_eq!(stats.momentum_tier, MomentumTier::Frenzy);

        s.clock.set(Timestamp::from_millis(500));
        assert!(s
            .director
            .execute_attack(ENEMY, AttackType::Light, "sword", Vec2::ZERO)
            .is_some());
        s.at(500);
        s.at(516);
        assert!(s.hits().is_empty());
        assert!((s.hp(PLAYER) - 100.0).abs() < 1e-6);

        // Window closes after peak_invulnerability_ms
        s.clock.set(Timestamp::from_millis(1200));
        assert!(s
            .director
            .execute_attack(ENEMY, AttackType::Light, "sword", Vec2::ZERO)
            .is_some());
        s.at(1200);
        assert_eq!(s.hits().len(), 1);
        assert!(s.hp(PLAYER) < 100.0);
    }

    #[test]
    fn test_unknown_weapon_fizzles() {
        let mut s = Session::duel();
        assert!(s
            .director
            .execute_attack(PLAYER, AttackType::Light, "halberd", Vec2::ZERO)
            .is_none());
        assert_eq!(
            s.sink.events(),
            vec![CombatEvent::AttackFizzled {
                attacker: PLAYER,
                weapon: "halberd".into(),
            }]
        );
    }

    #[test]
    fn test_unregistered_ids_are_noops() {
        let mut s = Session::duel();
        let ghost = CombatantId::from_raw(99);
        assert!(s
            .director
            .execute_attack(ghost, AttackType::Heavy, "sword", Vec2::X)
            .is_none());
        assert!(!s.director.execute_dodge(ghost, Vec2::X));
        assert!(!s.director.execute_parry(ghost));
        assert!(!s.director.execute_block(ghost, true));
        assert!(!s.director.apply_status(ghost, StatusKind::Stun, 100, 1.0));
        assert!(!s.director.can_attack(ghost));
        assert!(s.director.combat_stats(ghost).is_none());
        assert!(!s.director.register_boss(ghost, "warden"));
        s.at(16);
        assert!(s.sink.is_empty());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut s = Session::duel();
        assert!(!s
            .director
            .register_combatant(PLAYER, Pose::default(), &CombatantProfile::new()));
        assert!(!s
            .director
            .register_combatant(CombatantId::NULL, Pose::default(), &CombatantProfile::new()));
        assert_eq!(s.director.combatant_count(), 2);
    }

    #[test]
    fn test_recovery_gates_next_attack() {
        let mut s = Session::duel();
        assert!(s
            .director
            .execute_attack(PLAYER, AttackType::Light, "sword", Vec2::ZERO)
            .is_some());
        s.clock.set(Timestamp::from_millis(399));
        assert!(!s.director.can_attack(PLAYER));
        assert!(s
            .director
            .execute_attack(PLAYER, AttackType::Light, "sword", Vec2::ZERO)
            .is_none());
        s.clock.set(Timestamp::from_millis(400));
        assert!(s.director.can_attack(PLAYER));
    }

    #[test]
    fn test_triple_light_completes_combo() {
        let mut s = Session::duel();
        for t in [0, 400, 800] {
            s.clock.set(Timestamp::from_millis(t));
            assert!(s
                .director
                .execute_attack(PLAYER, AttackType::Light, "sword", Vec2::ZERO)
                .is_some());
            s.director.tick();
        }
        let completed: Vec<String> = s
            .sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                CombatEvent::ComboCompleted { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(completed, vec!["Triple Slash".to_string()]);
        assert_eq!(s.hits().len(), 3);
    }

    #[test]
    fn test_dodge_without_stamina_leaves_state() {
        let mut s = Session::new();
        s.add(
            PLAYER,
            Vec2::ZERO,
            Vec2::X,
            CombatantProfile::new().with_stamina(10.0),
        );
        let before = s.director.combat_stats(PLAYER).expect("player");
        assert!(!s.director.execute_dodge(PLAYER, Vec2::Y));
        let after = s.director.combat_stats(PLAYER).expect("player");
        assert_eq!(before, after);
        assert!((after.stamina - 10.0).abs() < 1e-6);
        assert!(!after.is_dodging);
    }

    #[test]
    fn test_dodge_grants_iframes_and_moves() {
        let mut s = Session::new();
        let pose = s.add(PLAYER, Vec2::ZERO, Vec2::X, CombatantProfile::new());
        s.at(0);
        assert!(s.director.execute_dodge(PLAYER, Vec2::Y));
        assert!(!s.director.execute_parry(PLAYER));

        s.at(100);
        let stats = s.director.combat_stats(PLAYER).expect("player");
        assert!(stats.is_dodging);
        assert!(stats.is_invulnerable);
        assert!((stats.stamina - 80.0).abs() < 1e-3);

        s.at(400);
        let stats = s.director.combat_stats(PLAYER).expect("player");
        assert!(!stats.is_dodging);
        assert!(!stats.is_invulnerable);
        assert!((pose.borrow().position - Vec2::new(0.0, 4.0)).length() < 1e-3);
    }

    #[test]
    fn test_slow_shortens_dodge_travel() {
        let mut s = Session::new();
        let pose = s.add(PLAYER, Vec2::ZERO, Vec2::X, CombatantProfile::new());
        assert!(s.director.apply_status(PLAYER, StatusKind::Slow, 2000, 0.5));
        s.at(0);
        assert!(s.director.execute_dodge(PLAYER, Vec2::Y));
        s.at(200);
        s.at(400);
        assert!((pose.borrow().position - Vec2::new(0.0, 2.0)).length() < 1e-3);
    }

    #[test]
    fn test_parry_stuns_attacker_and_opens_riposte() {
        let mut s = Session::duel();
        assert!(s.director.execute_parry(PLAYER));
        assert!(s
            .director
            .execute_attack(ENEMY, AttackType::Light, "sword", Vec2::ZERO)
            .is_some());
        s.at(0);

        assert_eq!(s.count("parry"), 1);
        assert!(s.hits().is_empty());
        assert!((s.hp(PLAYER) - 100.0).abs() < 1e-6);
        assert!(!s.director.can_attack(ENEMY));
        assert!(s.director.combat_stats(PLAYER).expect("player").riposte_ready);

        // Parry window and recovery end at 450ms
        s.at(500);
        assert!(s
            .director
            .execute_attack(PLAYER, AttackType::Light, "sword", Vec2::ZERO)
            .is_some());
        s.at(516);

        match s.hits().as_slice() {
            [CombatEvent::Hit { damage, riposte, .. }] => {
                assert!(*riposte);
                assert!((damage - 21.0).abs() < 1e-3);
            },
            other => panic!("unexpected {other:?}"),
        }
        assert!(!s.director.combat_stats(PLAYER).expect("player").riposte_ready);
    }

    #[test]
    fn test_frontal_block_reduces_and_drains() {
        let mut s = Session::duel();
        assert!(s.director.execute_block(PLAYER, true));
        assert!(s
            .director
            .execute_attack(ENEMY, AttackType::Light, "sword", Vec2::ZERO)
            .is_some());
        s.at(0);

        assert!(s.sink.events().contains(&CombatEvent::Block {
            attacker: ENEMY,
            defender: PLAYER,
            perfect: true,
        }));
        assert!((s.hp(PLAYER) - (100.0 - 10.5 * 0.3)).abs() < 1e-3);
        let stats = s.director.combat_stats(PLAYER).expect("player");
        assert!(stats.is_blocking);
        assert!((stats.stamina - 90.0).abs() < 1e-3);
        assert!(stats.momentum > 0.0);
    }

    #[test]
    fn test_stun_blocks_attacks_for_duration() {
        let mut s = Session::duel();
        assert!(s.director.apply_status(PLAYER, StatusKind::Stun, 2000, 1.0));
        assert!(!s.director.can_attack(PLAYER));
        s.at(1999);
        assert!(!s.director.can_attack(PLAYER));
        s.at(2000);
        assert!(s.director.can_attack(PLAYER));
        assert_eq!(s.count("status_expired"), 1);
    }

    #[test]
    fn test_damage_over_time_ignores_invulnerability() {
        let mut s = Session::duel();
        s.at(0);
        assert!(s.director.apply_status(PLAYER, StatusKind::Invulnerable, 5000, 1.0));
        assert!(s.director.apply_status(PLAYER, StatusKind::DamageOverTime, 1000, 10.0));
        s.at(1000);
        assert!((s.hp(PLAYER) - 90.0).abs() < 1e-3);
        assert_eq!(s.director.apply_direct_damage(PLAYER, 50.0), 0.0);
    }

    #[test]
    fn test_death_removes_combatant() {
        let mut s = Session::duel();
        s.director.apply_direct_damage(ENEMY, 500.0);
        s.at(16);
        assert!(s.director.combat_stats(ENEMY).is_none());
        assert_eq!(
            s.sink.events(),
            vec![CombatEvent::Death { entity: ENEMY }]
        );
    }

    fn boss_session() -> Session {
        boss_session_with(Session::config())
    }

    fn boss_session_with(config: CombatConfig) -> Session {
        let mut s = Session::with_config(config);
        s.add(
            ENEMY,
            Vec2::ZERO,
            Vec2::X,
            CombatantProfile::new()
                .with_hp(1000.0)
                .with_base_attack(20.0)
                .with_team(Team::Hostile),
        );
        assert!(s.director.register_boss(ENEMY, "warden"));
        s
    }

    #[test]
    fn test_boss_phases_and_defeat_cleanup() {
        let mut s = boss_session();
        assert!(!s.director.register_boss(ENEMY, "lich"));

        s.director.apply_direct_damage(ENEMY, 340.0);
        s.at(0);
        let status = s.director.boss_status(ENEMY).expect("boss");
        assert!(status.transitioning);
        assert!(s.director.combat_stats(ENEMY).expect("boss").is_invulnerable);
        assert_eq!(s.director.apply_direct_damage(ENEMY, 100.0), 0.0);

        s.at(1999);
        assert_eq!(s.director.boss_status(ENEMY).expect("boss").phase, 1);
        assert!(s.director.combat_stats(ENEMY).expect("boss").is_invulnerable);
        s.at(2000);
        assert_eq!(s.director.boss_status(ENEMY).expect("boss").phase, 2);
        assert!(!s.director.combat_stats(ENEMY).expect("boss").is_invulnerable);

        s.director.apply_direct_damage(ENEMY, 330.0);
        s.at(2000);
        s.at(4000);
        let status = s.director.boss_status(ENEMY).expect("boss");
        assert_eq!(status.phase, 3);
        assert!(status.enraged);
        assert_eq!(s.count("enraged"), 1);
        assert_eq!(
            s.sink
                .events()
                .iter()
                .filter_map(|e| match e {
                    CombatEvent::PhaseTransition { phase, .. } => Some(*phase),
                    _ => None,
                })
                .collect::<Vec<_>>(),
            vec![2, 3]
        );

        // Periodic summon fires 15s after phase 2 began
        s.at(17_000);
        let minions = s.director.boss_status(ENEMY).expect("boss").minions;
        assert_eq!(minions.len(), 4);
        assert!(minions
            .iter()
            .all(|m| s.director.combatant(*m).is_some_and(|c| c.is_minion)));

        s.director.apply_direct_damage(ENEMY, 1000.0);
        s.at(17_016);
        assert!(s.director.boss_status(ENEMY).is_none());
        assert!(s.director.combat_stats(ENEMY).is_none());
        assert!(minions.iter().all(|m| s.director.combat_stats(*m).is_none()));
        assert_eq!(s.count("boss_defeated"), 1);
        assert_eq!(s.count("death"), 5);
        assert_eq!(s.director.combatant_count(), 0);
    }

    #[test]
    fn test_dead_minion_frees_its_slot() {
        let mut s = boss_session();
        s.director.apply_direct_damage(ENEMY, 340.0);
        s.at(0);
        s.at(2000);
        s.at(17_000);
        let minions = s.director.boss_status(ENEMY).expect("boss").minions;
        assert_eq!(minions.len(), 4);

        // The first minion holds slot 0, east of the boss
        let fallen = minions[0];
        s.director.apply_direct_damage(fallen, 1000.0);
        s.at(17_016);
        let remaining = s.director.boss_status(ENEMY).expect("boss").minions;
        assert_eq!(remaining.len(), 3);
        assert!(!remaining.contains(&fallen));
        assert!(s.director.combatant(fallen).is_none());
        assert_eq!(s.count("death"), 1);

        // The next periodic summon refills only the free slot
        s.at(32_000);
        let refilled = s.director.boss_status(ENEMY).expect("boss").minions;
        assert_eq!(refilled.len(), 4);
        let fresh: Vec<CombatantId> = refilled
            .into_iter()
            .filter(|m| !minions.contains(m))
            .collect();
        assert_eq!(fresh.len(), 1);
        let pos = s.director.combatant(fresh[0]).map(Combatant::position).expect("minion");
        assert!((pos - Vec2::new(3.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_boss_telegraph_strikes_player() {
        let mut s = boss_session();
        s.add(
            PLAYER,
            Vec2::new(3.0, 0.0),
            -Vec2::X,
            CombatantProfile::new().with_team(Team::Player),
        );
        assert!(s.director.set_player(PLAYER));

        s.at(3000);
        assert_eq!(s.count("telegraph_announced"), 1);
        assert!(s.director.boss_status(ENEMY).expect("boss").telegraph_pending);

        let mut t = 3000;
        while t < 4600 {
            t += 100;
            s.at(t);
        }
        assert!(s.sink.events().iter().any(|e| matches!(
            e,
            CombatEvent::TelegraphResolved { hit: true, target, .. } if *target == PLAYER
        )));
        assert!(s.hp(PLAYER) < 100.0);
        assert!(!s.director.boss_status(ENEMY).expect("boss").telegraph_pending);
    }

    #[test]
    fn test_landed_slam_knocks_back() {
        let mut config = Session::config();
        for boss in &mut config.bosses {
            boss.phases[0].abilities = vec!["slam".to_string()];
        }
        let mut s = boss_session_with(config);
        s.add(
            PLAYER,
            Vec2::new(3.0, 0.0),
            -Vec2::X,
            CombatantProfile::new().with_team(Team::Player),
        );
        s.director.set_player(PLAYER);

        let mut t = 3000;
        while t <= 4200 {
            s.at(t);
            t += 100;
        }
        let impulse = s
            .sink
            .events()
            .into_iter()
            .find_map(|e| match e {
                CombatEvent::Knockback { target, impulse } if target == PLAYER => Some(impulse),
                _ => None,
            })
            .expect("knockback");
        // Away from the boss at the slam's force
        assert!((impulse - Vec2::new(5.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn test_dodged_telegraph_misses() {
        let mut s = boss_session();
        let pose = s.add(
            PLAYER,
            Vec2::new(3.0, 0.0),
            -Vec2::X,
            CombatantProfile::new().with_team(Team::Player),
        );
        s.director.set_player(PLAYER);
        s.at(3000);

        // Step well outside every frozen area before resolution
        pose.borrow_mut().position = Vec2::new(40.0, 40.0);
        let mut t = 3000;
        while t < 4600 {
            t += 100;
            s.at(t);
        }
        assert_eq!(s.count("telegraph_resolved"), 1);
        assert!(s.hits().is_empty());
        assert!((s.hp(PLAYER) - 100.0).abs() < 1e-6);
    }

    #[derive(Debug, Clone, Copy)]
    enum Action {
        Light,
        Heavy,
        Dodge,
        Parry,
        Block(bool),
        Wait,
    }

    fn action() -> impl Strategy<Value = Action> {
        prop_oneof![
            Just(Action::Light),
            Just(Action::Heavy),
            Just(Action::Dodge),
            Just(Action::Parry),
            any::<bool>().prop_map(Action::Block),
            Just(Action::Wait),
        ]
    }

    proptest! {
        #[test]
        fn prop_stamina_and_momentum_stay_bounded(
            script in proptest::collection::vec((action(), 0u64..300, any::<bool>()), 1..80)
        ) {
            let mut s = Session::duel();
            let mut now = 0;
            for (act, dt, enemy_turn) in script {
                let actor = if enemy_turn { ENEMY } else { PLAYER };
                match act {
                    Action::Light => {
                        s.director.execute_attack(actor, AttackType::Light, "dagger", Vec2::ZERO);
                    },
                    Action::Heavy => {
                        s.director.execute_attack(actor, AttackType::Heavy, "axe", Vec2::ZERO);
                    },
                    Action::Dodge => {
                        s.director.execute_dodge(actor, Vec2::Y);
                    },
                    Action::Parry => {
                        s.director.execute_parry(actor);
                    },
                    Action::Block(raised) => {
                        s.director.execute_block(actor, raised);
                    },
                    Action::Wait => {},
                }
                now += dt;
                s.at(now);

                for id in [PLAYER, ENEMY] {
                    if let Some(stats) = s.director.combat_stats(id) {
                        prop_assert!(stats.stamina >= 0.0 && stats.stamina <= stats.max_stamina);
                        prop_assert!((0.0..=100.0).contains(&stats.momentum));
                        prop_assert!(stats.hp > 0.0 && stats.hp <= stats.max_hp);
                        let defending = [stats.is_dodging, stats.is_parrying, stats.is_blocking];
                        prop_assert!(defending.iter().filter(|d| **d).count() <= 1);
                    }
                }
            }
        }
    }
}
