//! Hitbox creation and overlap resolution.
//!
//! This module provides:
//! - Positioned, time-limited attack volumes built from weapon templates
//! - Per-tick overlap tests against every registered combatant
//! - At-most-once hit tracking per (hitbox, target) pair

use ahash::AHashSet;
use glam::Vec2;
use skirmish_common::{local_to_world, unit_or, CombatantId, HitArea, HitboxId, Sequence, Timestamp};

use crate::combatant::{Combatant, Roster, Team};
use crate::tick::Tickable;
use crate::weapons::{AttackType, HitShape, WeaponTemplate, WeaponType};

/// A live attack volume.
#[derive(Debug, Clone)]
pub struct Hitbox {
    /// Id.
    pub id: HitboxId,
    /// Attacking combatant.
    pub owner: CombatantId,
    /// Owner's team at spawn.
    pub owner_team: Team,
    /// Weapon template name.
    pub weapon: String,
    /// Weapon type.
    pub weapon_type: WeaponType,
    /// Attack type.
    pub attack_type: AttackType,
    /// World-space volume.
    pub area: HitArea,
    /// Resolved facing.
    pub facing: Vec2,
    /// Spawn time.
    pub spawned_at: Timestamp,
    /// Last tick on which the hitbox is tested.
    pub expires_at: Timestamp,
    /// Damage scale (combo finisher).
    pub scale: f32,
    /// Weapon critical bonus.
    pub crit_bonus: f32,
    /// Weapon knockback.
    pub knockback: f32,
    hit: AHashSet<CombatantId>,
}

impl Hitbox {
    /// Register a hit on a target. Returns false if it was already hit.
    pub fn register_hit(&mut self, target: CombatantId) -> bool {
        self.hit.insert(target)
    }

    /// Whether `target` was already hit.
    #[must_use]
    pub fn has_hit(&self, target: CombatantId) -> bool {
        self.hit.contains(&target)
    }

    /// Number of distinct targets hit.
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.hit.len()
    }

    fn can_touch(&self, target: &Combatant) -> bool {
        target.id != self.owner
            && target.is_alive()
            && !self.owner_team.is_allied(target.team)
            && !self.has_hit(target.id)
            && self.area.overlaps(target.position(), target.collision_radius)
    }
}

/// A new overlap found during a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct HitboxContact {
    /// Hitbox.
    pub hitbox: HitboxId,
    /// Attacking combatant.
    pub attacker: CombatantId,
    /// Touched combatant.
    pub target: CombatantId,
    /// Weapon template name.
    pub weapon: String,
    /// Weapon type.
    pub weapon_type: WeaponType,
    /// Attack type.
    pub attack_type: AttackType,
    /// Damage scale.
    pub scale: f32,
    /// Weapon critical bonus.
    pub crit_bonus: f32,
    /// Weapon knockback.
    pub knockback: f32,
}

/// World-space volume for a weapon swung from `origin` along `facing`.
#[must_use]
pub fn weapon_area(template: &WeaponTemplate, origin: Vec2, facing: Vec2) -> HitArea {
    let anchor = local_to_world(origin, facing, template.offset);
    match template.shape {
        HitShape::Circle { radius } => HitArea::circle(anchor, radius),
        HitShape::Box {
            half_length,
            half_width,
        } => HitArea::oriented_box(anchor, facing, half_length, half_width),
        HitShape::Line { length, half_width } => {
            HitArea::segment(anchor, anchor + facing * length, half_width)
        },
    }
}

/// Owner of every live hitbox in a session.
#[derive(Debug, Default)]
pub struct HitboxResolver {
    active: Vec<Hitbox>,
    ids: Sequence,
}

impl HitboxResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a hitbox for `attacker` swinging `template`.
    ///
    /// A zero `direction` uses the attacker's facing.
    pub fn create_hitbox(
        &mut self,
        attacker: &Combatant,
        template: &WeaponTemplate,
        attack_type: AttackType,
        direction: Vec2,
        scale: f32,
        now: Timestamp,
    ) -> HitboxId {
        let facing = unit_or(direction, attacker.forward());
        let id = HitboxId::new(self.ids.next_value());
        self.active.push(Hitbox {
            id,
            owner: attacker.id,
            owner_team: attacker.team,
            weapon: template.name.clone(),
            weapon_type: template.weapon_type,
            attack_type,
            area: weapon_area(template, attacker.position(), facing),
            facing,
            spawned_at: now,
            expires_at: now.after(template.duration_ms),
            scale,
            crit_bonus: template.crit_bonus,
            knockback: template.knockback,
            hit: AHashSet::new(),
        });
        id
    }

    /// Look up a live hitbox.
    #[must_use]
    pub fn get(&self, id: HitboxId) -> Option<&Hitbox> {
        self.active.iter().find(|h| h.id == id)
    }

    /// Number of live hitboxes.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Drop every hitbox owned by `owner`.
    pub fn remove_owned_by(&mut self, owner: CombatantId) {
        self.active.retain(|h| h.owner != owner);
    }
}

impl Tickable for HitboxResolver {
    type Context<'a> = &'a Roster;
    type Output = Vec<HitboxContact>;

    fn tick(&mut self, now: Timestamp, roster: &Roster) -> Vec<HitboxContact> {
        let mut contacts = Vec::new();

        for hitbox in &mut self.active {
            for target in roster.values() {
                if hitbox.can_touch(target) && hitbox.register_hit(target.id) {
                    contacts.push(HitboxContact {
                        hitbox: hitbox.id,
                        attacker: hitbox.owner,
                        target: target.id,
                        weapon: hitbox.weapon.clone(),
                        weapon_type: hitbox.weapon_type,
                        attack_type: hitbox.attack_type,
                        scale: hitbox.scale,
                        crit_bonus: hitbox.crit_bonus,
                        knockback: hitbox.knockback,
                    });
                }
            }
        }

        self.active.retain(|h| now < h.expires_at);
        contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::{CombatantProfile, Pose};
    use crate::config::CombatConfig;
    use crate::weapons::default_weapons;
    use proptest::prelude::*;

    fn ms(v: u64) -> Timestamp {
        Timestamp::from_millis(v)
    }

    fn add(roster: &mut Roster, raw: u64, at: Vec2, team: Team) {
        let id = CombatantId::from_raw(raw);
        roster.insert(
            id,
            Combatant::new(
                id,
                Box::new(Pose::new(at, Vec2::X)),
                &CombatantProfile::new().with_team(team),
                &CombatConfig::default(),
            ),
        );
    }

    fn sword() -> WeaponTemplate {
        default_weapons()
            .into_iter()
            .find(|w| w.name == "sword")
            .expect("sword")
    }

    fn swing(resolver: &mut HitboxResolver, roster: &Roster, dir: Vec2) -> HitboxId {
        let attacker = &roster[&CombatantId::from_raw(1)];
        resolver.create_hitbox(attacker, &sword(), AttackType::Light, dir, 1.0, ms(0))
    }

    #[test]
    fn test_hit_registers_once() {
        let mut roster = Roster::new();
        add(&mut roster, 1, Vec2::ZERO, Team::Player);
        add(&mut roster, 2, Vec2::new(1.2, 0.0), Team::Hostile);

        let mut resolver = HitboxResolver::new();
        let id = swing(&mut resolver, &roster, Vec2::ZERO);

        let first = resolver.tick(ms(16), &roster);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].target, CombatantId::from_raw(2));
        assert_eq!(first[0].hitbox, id);
        assert!(resolver.tick(ms(32), &roster).is_empty());
    }

    #[test]
    fn test_direction_overrides_facing() {
        let mut roster = Roster::new();
        add(&mut roster, 1, Vec2::ZERO, Team::Player);
        add(&mut roster, 2, Vec2::new(0.0, -1.2), Team::Hostile);

        let mut resolver = HitboxResolver::new();
        swing(&mut resolver, &roster, Vec2::ZERO);
        assert!(resolver.tick(ms(16), &roster).is_empty());

        swing(&mut resolver, &roster, Vec2::new(0.0, -3.0));
        assert_eq!(resolver.tick(ms(32), &roster).len(), 1);
    }

    #[test]
    fn test_allies_and_dead_are_skipped() {
        let mut roster = Roster::new();
        add(&mut roster, 1, Vec2::ZERO, Team::Hostile);
        add(&mut roster, 2, Vec2::new(1.0, 0.0), Team::Hostile);
        add(&mut roster, 3, Vec2::new(1.0, 0.3), Team::Neutral);
        if let Some(c) = roster.get_mut(&CombatantId::from_raw(3)) {
            c.hp = 0.0;
        }

        let mut resolver = HitboxResolver::new();
        swing(&mut resolver, &roster, Vec2::ZERO);
        assert!(resolver.tick(ms(16), &roster).is_empty());
    }

    #[test]
    fn test_expiry_includes_final_tick() {
        let mut roster = Roster::new();
        add(&mut roster, 1, Vec2::ZERO, Team::Player);

        let mut resolver = HitboxResolver::new();
        swing(&mut resolver, &roster, Vec2::ZERO);
        resolver.tick(ms(100), &roster);
        assert_eq!(resolver.active_count(), 1);

        // A target stepping in on the expiry tick is still hit
        add(&mut roster, 2, Vec2::new(1.0, 0.0), Team::Hostile);
        assert_eq!(resolver.tick(ms(200), &roster).len(), 1);
        assert_eq!(resolver.active_count(), 0);
    }

    #[test]
    fn test_spear_reaches_along_line() {
        let spear = default_weapons()
            .into_iter()
            .find(|w| w.name == "spear")
            .expect("spear");
        let area = weapon_area(&spear, Vec2::ZERO, Vec2::X);
        assert!(area.overlaps(Vec2::new(2.6, 0.0), 0.1));
        assert!(!area.overlaps(Vec2::new(2.6, 1.0), 0.1));
    }

    proptest! {
        #[test]
        fn prop_pair_hits_at_most_once(
            targets in proptest::collection::vec((-2.0f32..3.0, -2.0f32..2.0), 1..8),
            steps in proptest::collection::vec(1u64..60, 1..20),
        ) {
            let mut roster = Roster::new();
            add(&mut roster, 1, Vec2::ZERO, Team::Player);
            for (i, (x, y)) in targets.iter().enumerate() {
                add(&mut roster, 10 + i as u64, Vec2::new(*x, *y), Team::Hostile);
            }

            let mut resolver = HitboxResolver::new();
            swing(&mut resolver, &roster, Vec2::ZERO);
            swing(&mut resolver, &roster, Vec2::Y);

            let mut seen = AHashSet::new();
            let mut now = 0;
            for dt in steps {
                now += dt;
                for contact in resolver.tick(ms(now), &roster) {
                    prop_assert!(seen.insert((contact.hitbox, contact.target)));
                }
            }
        }
    }
}
