//!
//! Counting Semaphore
//!
//! Permit-based admission with explicit cancellation. `wait` admits a
//! caller once the number of outstanding requests fits the capacity;
//! `post` returns a permit. `release` poisons the semaphore: every
//! current and future waiter observes cancellation until `reset` clears
//! the poison and installs a new capacity.
//!
//! `active` counts outstanding requests, granted or still queued, so it
//! may transiently exceed the capacity while waiters queue.
//!

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Returned by `wait`/`acquire` when the semaphore is poisoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("semaphore wait cancelled")]
pub struct Cancelled;

struct SemaphoreState {
    count: usize,
    active: usize,
    poisoned: bool,
}

/// Counting permit primitive with poisoning and reset.
pub struct Semaphore {
    state: Mutex<SemaphoreState>,
    condvar: Condvar,
}

impl Semaphore {
    /// Create a semaphore admitting up to `count` concurrent holders.
    pub fn new(count: usize) -> Self {
        Self {
            state: Mutex::new(SemaphoreState {
                count,
                active: 0,
                poisoned: false,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Request admission, blocking until granted or cancelled.
    ///
    /// The request is registered immediately; on cancellation it is rolled
    /// back before returning.
    pub fn wait(&self) -> Result<(), Cancelled> {
        let mut state = self.state.lock().unwrap();
        if state.poisoned {
            return Err(Cancelled);
        }
        state.active += 1;
        loop {
            if state.active <= state.count {
                return Ok(());
            }
            state = self.condvar.wait(state).unwrap();
            if state.poisoned {
                state.active -= 1;
                return Err(Cancelled);
            }
        }
    }

    /// Non-blocking admission. Returns `false` when poisoned or when the
    /// request would have to queue.
    pub fn try_wait(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.poisoned || state.active >= state.count {
            return false;
        }
        state.active += 1;
        true
    }

    /// Bounded `wait`. Timeout and cancellation both surface as `false`,
    /// with the request rolled back.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    /// Bounded `wait` against an absolute deadline.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.poisoned {
            return false;
        }
        state.active += 1;
        loop {
            if state.active <= state.count {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                state.active -= 1;
                return false;
            }
            let (next, _) = self.condvar.wait_timeout(state, deadline - now).unwrap();
            state = next;
            if state.poisoned {
                state.active -= 1;
                return false;
            }
        }
    }

    /// Return one permit and wake one waiter. A `post` with no
    /// outstanding request is a no-op; `active` never goes negative.
    pub fn post(&self) {
        let mut state = self.state.lock().unwrap();
        if state.active > 0 {
            state.active -= 1;
        }
        self.condvar.notify_one();
    }

    /// Poison the semaphore. All blocked waiters observe cancellation;
    /// new waiters fail until `reset`.
    pub fn release(&self) {
        let mut state = self.state.lock().unwrap();
        state.poisoned = true;
        self.condvar.notify_all();
    }

    /// Clear the poison, install a new capacity, and wake all waiters to
    /// re-check the admission condition.
    pub fn reset(&self, count: usize) {
        let mut state = self.state.lock().unwrap();
        state.poisoned = false;
        state.count = count;
        self.condvar.notify_all();
    }

    /// Request admission, returning a guard that posts on drop.
    pub fn acquire(&self) -> Result<SemaphoreGuard<'_>, Cancelled> {
        self.wait()?;
        Ok(SemaphoreGuard { semaphore: self })
    }

    /// Outstanding requests, granted or queued.
    pub fn active(&self) -> usize {
        self.state.lock().unwrap().active
    }

    /// Current capacity.
    pub fn capacity(&self) -> usize {
        self.state.lock().unwrap().count
    }

    pub fn poisoned(&self) -> bool {
        self.state.lock().unwrap().poisoned
    }
}

/// RAII admission token. Returns its permit via `post` on drop.
pub struct SemaphoreGuard<'a> {
    semaphore: &'a Semaphore,
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        self.semaphore.post();
    }
}
