//!
//! WaitGroup
//!
//! Countdown synchronization for fan-out/fan-in: register work with
//! `add`, report completion with `done`, block in `wait` until the count
//! returns to zero.
//!

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Countdown latch. The count never goes below zero.
pub struct WaitGroup {
    count: Mutex<usize>,
    condvar: Condvar,
}

impl WaitGroup {
    pub fn new() -> Self {
        Self {
            count: Mutex::new(0),
            condvar: Condvar::new(),
        }
    }

    /// Register `n` units of outstanding work.
    pub fn add(&self, n: usize) {
        *self.count.lock().unwrap() += n;
    }

    /// Report one unit complete. Returns `true` iff this call brought the
    /// count to zero, waking all waiters. A `done` on an already-zero
    /// count is a no-op that returns `true`.
    pub fn done(&self) -> bool {
        let mut count = self.count.lock().unwrap();
        if *count == 0 {
            return true;
        }
        *count -= 1;
        if *count == 0 {
            self.condvar.notify_all();
            return true;
        }
        false
    }

    /// Block until the count is zero.
    pub fn wait(&self) {
        let mut count = self.count.lock().unwrap();
        while *count != 0 {
            count = self.condvar.wait(count).unwrap();
        }
    }

    /// Bounded `wait`. Returns `false` on timeout.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    /// Bounded `wait` against an absolute deadline.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut count = self.count.lock().unwrap();
        while *count != 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self.condvar.wait_timeout(count, deadline - now).unwrap();
            count = next;
        }
        true
    }

    pub fn count(&self) -> usize {
        *self.count.lock().unwrap()
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}
