//! One-shot deferred execution with cancellable, inspectable handles.
//!
//! A single call schedules a unit of work at one of three timing tiers and
//! returns a [`Handle`] with uniform lifecycle controls regardless of the
//! backing primitive:
//!
//! - [`schedule`] with a negative delay (or [`asap`]) runs the callback as
//!   soon as possible,
//! - a zero delay (or [`soon`]) runs it on the next pass of the scheduling
//!   loop,
//! - a positive delay runs it no earlier than that many milliseconds later.
//!
//! Handles expose `cancel`, `is_cancelled` and `is_completed`; the two flags
//! are monotonic and mutually exclusive. [`deferred`] is the callback-free
//! variant, returning a [`Deferred`] future that settles when the work would
//! have fired and still carries the full handle surface.
//!
//! All work runs on one lazily-started background thread; scheduling and
//! cancellation never block.

pub mod handle;
mod reactor;
pub mod schedule;
mod task;

pub use handle::{Deferred, Handle};
pub use schedule::{asap, deferred, schedule, soon};
