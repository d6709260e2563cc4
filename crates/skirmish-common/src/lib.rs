//! # Skirmish Common
//!
//! Common types, utilities, and shared abstractions for Project Skirmish.
//!
//! This crate provides foundational types used across the combat workspace:
//! - ID types (CombatantId, HitboxId, TelegraphId) and a per-session allocator
//! - Millisecond timestamps and the `Clock` abstraction (system and manual)
//! - Ground-plane geometry for hit volumes
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod clock;
pub mod geometry;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::*;
    pub use crate::geometry::*;
    pub use crate::ids::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn test_allocator_skips_reserved_ids() {
        let mut alloc = IdAllocator::starting_at(10);
        let id = alloc.next_free(|id| id.raw() == 10);
        assert_eq!(id, CombatantId::from_raw(11));
    }

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance(250);
        assert_eq!(clock.now(), Timestamp::from_millis(250));
    }

    #[test]
    fn test_circle_area_contains() {
        let area = HitArea::circle(Vec2::ZERO, 1.0);
        assert!(area.overlaps(Vec2::new(1.2, 0.0), 0.5));
        assert!(!area.overlaps(Vec2::new(2.0, 0.0), 0.5));
    }
}
