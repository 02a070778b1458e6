//!
//! Event
//!
//! A single boolean condition with two wake disciplines, fixed at
//! construction:
//!
//! - Manual: `notify` wakes every waiter and the flag stays set for any
//!   future `wait` until `reset`.
//! - Auto-reset: `notify` wakes exactly one waiter, and a successful wait
//!   clears the flag in the same locked step that releases the waiter.
//!

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Single boolean condition with manual or auto-reset wake semantics.
pub struct Event {
    auto_reset: bool,
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl Event {
    /// An event whose flag persists until `reset`.
    pub fn manual() -> Self {
        Self::with_mode(false)
    }

    /// An event whose flag is consumed by the single waiter it releases.
    pub fn automatic() -> Self {
        Self::with_mode(true)
    }

    fn with_mode(auto_reset: bool) -> Self {
        Self {
            auto_reset,
            signaled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Set the flag and wake: one waiter in auto-reset mode, everyone in
    /// manual mode.
    pub fn notify(&self) {
        let mut signaled = self.signaled.lock().unwrap();
        *signaled = true;
        if self.auto_reset {
            self.condvar.notify_one();
        } else {
            self.condvar.notify_all();
        }
    }

    /// Block until the flag is set. In auto-reset mode the flag is
    /// cleared as part of the releasing step.
    pub fn wait(&self) {
        let mut signaled = self.signaled.lock().unwrap();
        while !*signaled {
            signaled = self.condvar.wait(signaled).unwrap();
        }
        if self.auto_reset {
            *signaled = false;
        }
    }

    /// Bounded `wait`. Returns `false` on timeout.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    /// Bounded `wait` against an absolute deadline.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut signaled = self.signaled.lock().unwrap();
        while !*signaled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self.condvar.wait_timeout(signaled, deadline - now).unwrap();
            signaled = next;
        }
        if self.auto_reset {
            *signaled = false;
        }
        true
    }

    /// Clear the flag unconditionally.
    pub fn reset(&self) {
        *self.signaled.lock().unwrap() = false;
    }

    pub fn signaled(&self) -> bool {
        *self.signaled.lock().unwrap()
    }
}
