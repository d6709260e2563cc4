//! ID types for combatants and combat volumes.

use serde::{Deserialize, Serialize};

/// Unique identifier for a combatant within a combat session.
///
/// Ids are supplied by the caller when an actor is registered; the session
/// only mints ids of its own for combatants it spawns (boss minions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombatantId(u64);

impl CombatantId {
    /// Creates a combatant ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Null/invalid combatant ID.
    pub const NULL: Self = Self(0);

    /// Checks if this is a valid (non-null) combatant ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for CombatantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique identifier for a spawned hitbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HitboxId(u64);

impl HitboxId {
    /// Creates a hitbox ID from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Unique identifier for a scheduled telegraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TelegraphId(u64);

impl TelegraphId {
    /// Creates a telegraph ID from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// First raw value handed out for session-spawned combatants.
pub const SPAWNED_ID_BASE: u64 = 1 << 48;

/// Per-session allocator for combatant ids.
///
/// Each combat session owns its allocator, so independent sessions never
/// share counters.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::starting_at(SPAWNED_ID_BASE)
    }
}

impl IdAllocator {
    /// Creates an allocator whose first candidate is `first`.
    #[must_use]
    pub const fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    /// Returns the next id for which `taken` is false.
    pub fn next_free(&mut self, mut taken: impl FnMut(CombatantId) -> bool) -> CombatantId {
        loop {
            let candidate = CombatantId::from_raw(self.next);
            self.next = self.next.wrapping_add(1).max(1);
            if candidate.is_valid() && !taken(candidate) {
                return candidate;
            }
        }
    }
}

/// Monotonic counter used for hitbox and telegraph ids.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    last: u64,
}

impl Sequence {
    /// Returns the next value, starting at 1.
    pub fn next_value(&mut self) -> u64 {
        self.last += 1;
        self.last
    }
}
