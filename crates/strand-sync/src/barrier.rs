//!
//! Cyclic Barrier
//!
//! Rendezvous for a fixed number of parties. Each completed round bumps a
//! generation counter; a blocked waiter is released only when the
//! generation it observed on entry has changed, so late or early arrivals
//! cannot be confused about which round they belong to.
//!

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

struct BarrierState {
    limit: usize,
    remaining: usize,
    generation: u64,
}

/// Fixed-party cyclic rendezvous.
pub struct Barrier {
    state: Mutex<BarrierState>,
    condvar: Condvar,
}

impl Barrier {
    /// Create a barrier for `limit` parties.
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "barrier requires at least one party");
        Self {
            state: Mutex::new(BarrierState {
                limit,
                remaining: limit,
                generation: 0,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Arrive and block until all parties have arrived. Returns `true`
    /// for the single arrival that completed the round.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        state.remaining -= 1;
        if state.remaining == 0 {
            state.remaining = state.limit;
            state.generation += 1;
            self.condvar.notify_all();
            return true;
        }
        let generation = state.generation;
        while state.generation == generation {
            state = self.condvar.wait(state).unwrap();
        }
        false
    }

    /// Bounded `wait`. Returns `true` if the round completed before the
    /// timeout, `false` otherwise — a timed-out arrival is rolled back
    /// and does not count toward the round.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    /// Bounded `wait` against an absolute deadline.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock().unwrap();
        state.remaining -= 1;
        if state.remaining == 0 {
            state.remaining = state.limit;
            state.generation += 1;
            self.condvar.notify_all();
            return true;
        }
        let generation = state.generation;
        while state.generation == generation {
            let now = Instant::now();
            if now >= deadline {
                // The round has not completed; withdraw this arrival.
                state.remaining += 1;
                return false;
            }
            let (next, _) = self.condvar.wait_timeout(state, deadline - now).unwrap();
            state = next;
        }
        true
    }

    /// Forcibly complete the current round without requiring all
    /// arrivals, waking every blocked waiter.
    pub fn release(&self) {
        let mut state = self.state.lock().unwrap();
        state.remaining = state.limit;
        state.generation += 1;
        self.condvar.notify_all();
    }

    /// Forcibly complete the current round and change the party count for
    /// subsequent rounds.
    pub fn reset(&self, limit: usize) {
        assert!(limit > 0, "barrier requires at least one party");
        let mut state = self.state.lock().unwrap();
        state.limit = limit;
        state.remaining = limit;
        state.generation += 1;
        self.condvar.notify_all();
    }

    /// Party count for the current configuration.
    pub fn parties(&self) -> usize {
        self.state.lock().unwrap().limit
    }
}
