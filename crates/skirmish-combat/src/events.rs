//! Outbound combat events.
//!
//! The director never talks to the presentation layer directly: it pushes
//! [`CombatEvent`]s into whatever [`EventSink`] it was constructed with.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use glam::Vec2;
use serde::Serialize;
use skirmish_common::{CombatantId, Timestamp, TelegraphId};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::warn;

use crate::momentum::MomentumTier;
use crate::status::StatusKind;
use crate::weapons::WeaponType;

/// Event emitted by the combat core.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CombatEvent {
    /// Damage landed on a target
    Hit {
        /// Attacking combatant
        attacker: CombatantId,
        /// Damaged combatant
        target: CombatantId,
        /// Final damage
        damage: f32,
        /// Critical roll succeeded
        is_critical: bool,
        /// Struck from behind
        is_backstab: bool,
        /// Weapon type, if the hit came from a weapon
        weapon_type: Option<WeaponType>,
        /// Weapon or ability name
        source: String,
        /// Reduced by a block
        blocked: bool,
        /// Riposte counter applied
        riposte: bool,
    },
    /// Combatant reached zero hp
    Death {
        /// Dead combatant
        entity: CombatantId,
    },
    /// Attack was parried
    Parry {
        /// Stunned attacker
        attacker: CombatantId,
        /// Defender who opened a riposte window
        defender: CombatantId,
    },
    /// Attack was blocked
    Block {
        /// Attacking combatant
        attacker: CombatantId,
        /// Blocking combatant
        defender: CombatantId,
        /// Block was raised just before the hit
        perfect: bool,
    },
    /// Heavy hit pushed a target
    Knockback {
        /// Pushed combatant
        target: CombatantId,
        /// Impulse direction scaled by force
        impulse: Vec2,
    },
    /// Combo pattern completed
    ComboCompleted {
        /// Combatant performing the combo
        entity: CombatantId,
        /// Pattern name
        name: String,
        /// Damage scale for the finishing attack
        multiplier: f32,
    },
    /// Highest crossed momentum threshold changed
    MomentumTierChanged {
        /// Combatant
        entity: CombatantId,
        /// Previous tier
        from: MomentumTier,
        /// New tier
        to: MomentumTier,
    },
    /// Status effect applied or refreshed
    StatusApplied {
        /// Affected combatant
        entity: CombatantId,
        /// Effect kind
        kind: StatusKind,
        /// Stack count after application
        stacks: u32,
        /// Expiry time
        expires_at: Timestamp,
    },
    /// Status effect ended
    StatusExpired {
        /// Affected combatant
        entity: CombatantId,
        /// Effect kind
        kind: StatusKind,
    },
    /// Boss started a phase transition
    TransitionStarted {
        /// Boss
        boss: CombatantId,
        /// Phase being left
        from_phase: u32,
    },
    /// Boss entered a new phase
    PhaseTransition {
        /// Boss
        boss: CombatantId,
        /// Phase entered
        phase: u32,
    },
    /// Boss announced a delayed attack
    TelegraphAnnounced {
        /// Boss
        boss: CombatantId,
        /// Telegraph id
        telegraph: TelegraphId,
        /// Ability name
        ability: String,
        /// Tracked target
        target: CombatantId,
        /// When the attack resolves
        resolves_at: Timestamp,
    },
    /// Delayed attack resolved
    TelegraphResolved {
        /// Boss
        boss: CombatantId,
        /// Telegraph id
        telegraph: TelegraphId,
        /// Ability name
        ability: String,
        /// Tracked target
        target: CombatantId,
        /// Target was inside the area
        hit: bool,
    },
    /// Boss summoned a minion
    MinionSpawned {
        /// Boss
        boss: CombatantId,
        /// New minion
        minion: CombatantId,
        /// Spawn position
        position: Vec2,
    },
    /// Boss entered its final phase
    Enraged {
        /// Boss
        boss: CombatantId,
    },
    /// Boss died and its encounter was cleaned up
    BossDefeated {
        /// Boss
        boss: CombatantId,
    },
    /// Attack request could not be carried out
    AttackFizzled {
        /// Requesting combatant
        attacker: CombatantId,
        /// Requested weapon
        weapon: String,
    },
}

impl CombatEvent {
    /// Short event name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hit { .. } => "hit",
            Self::Death { .. } => "death",
            Self::Parry { .. } => "parry",
            Self::Block { .. } => "block",
            Self::Knockback { .. } => "knockback",
            Self::ComboCompleted { .. } => "combo_completed",
            Self::MomentumTierChanged { .. } => "momentum_tier_changed",
            Self::StatusApplied { .. } => "status_applied",
            Self::StatusExpired { .. } => "status_expired",
            Self::TransitionStarted { .. } => "transition_started",
            Self::PhaseTransition { .. } => "phase_transition",
            Self::TelegraphAnnounced { .. } => "telegraph_announced",
            Self::TelegraphResolved { .. } => "telegraph_resolved",
            Self::MinionSpawned { .. } => "minion_spawned",
            Self::Enraged { .. } => "enraged",
            Self::BossDefeated { .. } => "boss_defeated",
            Self::AttackFizzled { .. } => "attack_fizzled",
        }
    }
}

/// Receiver of outbound combat events.
pub trait EventSink {
    /// Deliver one event. Must not block.
    fn emit(&mut self, event: CombatEvent);
}

impl EventSink for Sender<CombatEvent> {
    fn emit(&mut self, event: CombatEvent) {
        // Non-blocking send - if full, event is dropped
        match self.try_send(event) {
            Ok(()) => {},
            Err(TrySendError::Full(event)) => {
                warn!("Combat event channel full, dropping {} event", event.name());
            },
            Err(TrySendError::Disconnected(_)) => {},
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&mut self, event: CombatEvent) {
        (**self).emit(event);
    }
}

/// Creates a bounded event channel for a director.
#[must_use]
pub fn channel(capacity: usize) -> (Sender<CombatEvent>, Receiver<CombatEvent>) {
    bounded(capacity)
}

/// Drains all pending events from a receiver.
pub fn drain(receiver: &Receiver<CombatEvent>) -> Vec<CombatEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

/// In-memory sink whose clones share one event log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Rc<RefCell<Vec<CombatEvent>>>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every recorded event.
    #[must_use]
    pub fn events(&self) -> Vec<CombatEvent> {
        self.events.borrow().clone()
    }

    /// Removes and returns every recorded event.
    pub fn take(&self) -> Vec<CombatEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: CombatEvent) {
        self.events.borrow_mut().push(event);
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: CombatEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn death(raw: u64) -> CombatEvent {
        CombatEvent::Death {
            entity: CombatantId::from_raw(raw),
        }
    }

    #[test]
    fn test_channel_drops_when_full() {
        let (mut sender, receiver) = channel(2);
        sender.emit(death(1));
        sender.emit(death(2));
        sender.emit(death(3));

        let events = drain(&receiver);
        assert_eq!(events, vec![death(1), death(2)]);
    }

    #[test]
    fn test_recording_sink_shares_log() {
        let sink = RecordingSink::new();
        let mut handle = sink.clone();
        handle.emit(death(4));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.take(), vec![death(4)]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_disconnected_channel_is_ignored() {
        let (mut sender, receiver) = channel(4);
        drop(receiver);
        sender.emit(death(5));
    }
}
