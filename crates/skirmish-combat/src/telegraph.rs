//! Announce-then-resolve boss attacks.
//!
//! A telegraph freezes its area when it is scheduled, counts down, and
//! resolves exactly once against the target it was aimed at.

use skirmish_common::{CombatantId, HitArea, Sequence, TelegraphId, Timestamp};
use std::collections::BTreeMap;

use crate::abilities::AbilityDef;
use crate::combatant::Roster;
use crate::tick::Tickable;

/// A pending delayed attack.
#[derive(Debug, Clone, PartialEq)]
pub struct Telegraph {
    /// Id.
    pub id: TelegraphId,
    /// Boss that announced it.
    pub boss: CombatantId,
    /// Ability name.
    pub ability: String,
    /// Frozen area.
    pub area: HitArea,
    /// Tracked target.
    pub target: CombatantId,
    /// Announcement time.
    pub announced_at: Timestamp,
    /// Resolution time.
    pub resolves_at: Timestamp,
    /// Ability damage multiplier.
    pub damage_multiplier: f32,
    /// Knockback force on a hit.
    pub knockback: f32,
}

/// A telegraph that resolved this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TelegraphStrike {
    /// Telegraph id.
    pub telegraph: TelegraphId,
    /// Boss.
    pub boss: CombatantId,
    /// Ability name.
    pub ability: String,
    /// Tracked target.
    pub target: CombatantId,
    /// Target was inside the area.
    pub hit: bool,
    /// Distance falloff for circular areas.
    pub falloff: f32,
    /// Ability damage multiplier.
    pub damage_multiplier: f32,
    /// Knockback force on a hit.
    pub knockback: f32,
}

/// At most one pending telegraph per boss.
#[derive(Debug, Default)]
pub struct TelegraphScheduler {
    pending: BTreeMap<CombatantId, Telegraph>,
    ids: Sequence,
}

impl TelegraphScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce `ability` over `area` against `target`.
    ///
    /// Returns `None` while the boss already has a pending telegraph.
    pub fn schedule(
        &mut self,
        boss: CombatantId,
        ability: &AbilityDef,
        area: HitArea,
        target: CombatantId,
        now: Timestamp,
    ) -> Option<TelegraphId> {
        if self.pending.contains_key(&boss) {
            return None;
        }
        let id = TelegraphId::new(self.ids.next_value());
        self.pending.insert(
            boss,
            Telegraph {
                id,
                boss,
                ability: ability.name.clone(),
                area,
                target,
                announced_at: now,
                resolves_at: now.after(ability.telegraph_ms),
                damage_multiplier: ability.damage_multiplier,
                knockback: ability.knockback,
            },
        );
        Some(id)
    }

    /// Pending telegraph for a boss.
    #[must_use]
    pub fn pending_for(&self, boss: CombatantId) -> Option<&Telegraph> {
        self.pending.get(&boss)
    }

    /// Whether a boss has a pending telegraph.
    #[must_use]
    pub fn is_pending(&self, boss: CombatantId) -> bool {
        self.pending.contains_key(&boss)
    }

    /// Cancel a boss's pending telegraph.
    pub fn cancel(&mut self, boss: CombatantId) -> Option<Telegraph> {
        self.pending.remove(&boss)
    }
}

impl Tickable for TelegraphScheduler {
    type Context<'a> = &'a Roster;
    type Output = Vec<TelegraphStrike>;

    fn tick(&mut self, now: Timestamp, roster: &Roster) -> Vec<TelegraphStrike> {
        let due: Vec<CombatantId> = self
            .pending
            .iter()
            .filter(|(_, t)| now >= t.resolves_at)
            .map(|(boss, _)| *boss)
            .collect();

        let mut strikes = Vec::with_capacity(due.len());
        for boss in due {
            let Some(telegraph) = self.pending.remove(&boss) else {
                continue;
            };
            let (hit, falloff) = match roster.get(&telegraph.target) {
                Some(target) if target.is_alive() => {
                    let pos = target.position();
                    let hit = telegraph.area.overlaps(pos, target.collision_radius);
                    (hit, telegraph.area.falloff(pos))
                },
                _ => (false, 0.0),
            };
            strikes.push(TelegraphStrike {
                telegraph: telegraph.id,
                boss,
                ability: telegraph.ability,
                target: telegraph.target,
                hit,
                falloff,
                damage_multiplier: telegraph.damage_multiplier,
                knockback: telegraph.knockback,
            });
        }
        strikes
    }
}
