//! Fixed per-tick update contract.
//!
//! Every stateful component advances through [`Tickable::tick`]. The
//! director enumerates its components explicitly and calls them in a fixed
//! order; nothing is discovered at runtime.

use skirmish_common::Timestamp;

/// A component that advances once per combat tick.
///
/// `Context` carries whatever borrowed state the component reads or writes
/// besides itself; `Output` reports what happened so the caller can react.
pub trait Tickable {
    /// Borrowed inputs for one tick.
    type Context<'a>;
    /// Result of one tick.
    type Output;

    /// Advance to `now`.
    fn tick(&mut self, now: Timestamp, ctx: Self::Context<'_>) -> Self::Output;
}
