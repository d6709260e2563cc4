//! Millisecond timestamps and time sources.
//!
//! Every timer in the combat core is a stored expiry `Timestamp` compared
//! against the clock once per tick. Tests and headless runs drive a
//! [`ManualClock`]; a live game uses [`SystemClock`].

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// A point in combat time, in milliseconds since the clock's origin.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The clock origin.
    pub const ZERO: Self = Self(0);

    /// Creates a timestamp from milliseconds.
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Returns the timestamp in milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Timestamp `ms` milliseconds later.
    #[must_use]
    pub const fn after(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    /// Milliseconds elapsed since `earlier` (zero if `earlier` is later).
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Seconds elapsed since `earlier` (zero if `earlier` is later).
    #[must_use]
    pub fn seconds_since(self, earlier: Self) -> f32 {
        self.millis_since(earlier) as f32 / 1000.0
    }

    /// Returns the earlier of two timestamps.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

/// Source of the current combat time.
pub trait Clock {
    /// Current time.
    fn now(&self) -> Timestamp;
}

/// Wall clock measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    /// Creates a clock whose origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.origin.elapsed().as_millis() as u64)
    }
}

/// Manually advanced clock.
///
/// Clones share the same underlying time, so a test can hand one clone to
/// a combat session and keep another to advance it.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    /// Creates a clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward.
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }

    /// Sets the absolute time. Moving backwards is ignored.
    pub fn set(&self, time: Timestamp) {
        if time.0 >= self.now.get() {
            self.now.set(time.0);
        } else {
            tracing::warn!(
                "Ignoring attempt to rewind manual clock from {}ms to {}ms",
                self.now.get(),
                time.0
            );
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_arithmetic() {
        let t = Timestamp::from_millis(1000);
        assert_eq!(t.after(500).as_millis(), 1500);
        assert_eq!(t.after(500).millis_since(t), 500);
        assert_eq!(t.millis_since(t.after(500)), 0);
        assert!((t.after(250).seconds_since(t) - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_manual_clock_never_rewinds() {
        let clock = ManualClock::new();
        clock.set(Timestamp::from_millis(100));
        clock.set(Timestamp::from_millis(50));
        assert_eq!(clock.now().as_millis(), 100);
    }
}
