//!
//! strand-timers - Deferred and Periodic Timers
//!
//! A `TimerQueue` owns one background worker thread and an expiry-ordered
//! collection of entries. The worker sleeps on a condition variable until
//! the earliest expiry (or a mutating wake-up), then fires the due entry
//! with no internal lock held, so task execution never blocks scheduling.
//!
//! ## Entry Lifecycle
//!
//! scheduled -> fired -> removed (one-shot) or rescheduled (periodic),
//! with cancellation by id possible at any point. Periodic entries are
//! re-inserted at `expiry + period` before their task runs, so the firing
//! cadence does not drift with task runtime.
//!
//! ## Failure Routing
//!
//! A panic inside a timer task is trapped at the invocation point and
//! handed to the queue's error handler; it never terminates the worker.
//!

pub mod queue;

pub use queue::*;
