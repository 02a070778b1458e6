//!
//! Timer Queue
//!
//! Entries are kept in a `Vec` sorted by expiry, ties broken by insertion
//! order. All state is behind a `Mutex` + `Condvar`; ids come from a
//! per-queue `AtomicU64` counter starting at 1 and are never reused.
//!

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use strand_core::{ErrorHandler, TimerTask, noop_error_handler, trap};
use tracing::debug;

/// Opaque handle for a scheduled entry.
pub type TimerId = u64;

/// Snapshot of an entry's schedule, as returned by `find`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerInfo {
    pub expiry: Instant,
    pub period: Duration,
}

struct TimerEntry {
    id: TimerId,
    expiry: Instant,
    period: Duration,
    task: Arc<Mutex<TimerTask>>,
}

struct TimerState {
    entries: Vec<TimerEntry>,
    stopped: bool,
}

impl TimerState {
    fn insert(&mut self, entry: TimerEntry) {
        let pos = self.entries.partition_point(|e| e.expiry <= entry.expiry);
        self.entries.insert(pos, entry);
    }

    fn position(&self, id: TimerId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }
}

struct TimerShared {
    state: Mutex<TimerState>,
    condvar: Condvar,
    error_handler: ErrorHandler,
    next_id: AtomicU64,
}

/// Background thread firing one-shot and periodic callables in expiry
/// order.
pub struct TimerQueue {
    shared: Arc<TimerShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TimerQueue {
    /// A queue whose task failures are discarded.
    pub fn new() -> Self {
        Self::with_error_handler(noop_error_handler())
    }

    /// A queue routing task failures to `error_handler`. The handler is
    /// fixed for the queue's lifetime.
    pub fn with_error_handler(error_handler: ErrorHandler) -> Self {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                entries: Vec::new(),
                stopped: false,
            }),
            condvar: Condvar::new(),
            error_handler,
            next_id: AtomicU64::new(1),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("strand-timer".to_string())
                .spawn(move || worker_loop(shared))
                .expect("failed to spawn timer worker")
        };

        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Schedule a one-shot entry firing at `when`. Returns `None` once
    /// the queue is stopped.
    pub fn at(&self, when: Instant, task: impl FnMut() + Send + 'static) -> Option<TimerId> {
        self.schedule(when, Duration::ZERO, Box::new(task))
    }

    /// Schedule a one-shot entry firing after `delay`.
    pub fn after(&self, delay: Duration, task: impl FnMut() + Send + 'static) -> Option<TimerId> {
        self.schedule(Instant::now() + delay, Duration::ZERO, Box::new(task))
    }

    /// Schedule a repeating entry. With `shorten` the first firing is
    /// immediate; otherwise it comes after one full period.
    pub fn periodic(
        &self,
        period: Duration,
        task: impl FnMut() + Send + 'static,
        shorten: bool,
    ) -> Option<TimerId> {
        assert!(!period.is_zero(), "periodic entry requires a nonzero period");
        let now = Instant::now();
        let first = if shorten { now } else { now + period };
        self.schedule(first, period, Box::new(task))
    }

    fn schedule(&self, expiry: Instant, period: Duration, task: TimerTask) -> Option<TimerId> {
        let mut state = self.shared.state.lock().unwrap();
        if state.stopped {
            return None;
        }
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        state.insert(TimerEntry {
            id,
            expiry,
            period,
            task: Arc::new(Mutex::new(task)),
        });
        self.shared.condvar.notify_one();
        Some(id)
    }

    /// Remove an entry. Returns `false` if no entry with `id` is
    /// scheduled.
    pub fn cancel(&self, id: TimerId) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        match state.position(id) {
            Some(pos) => {
                state.entries.remove(pos);
                self.shared.condvar.notify_one();
                true
            }
            None => false,
        }
    }

    /// Re-base a still-scheduled periodic entry so its next firing is one
    /// period from now. Returns `false` for one-shot or missing entries.
    pub fn refresh(&self, id: TimerId) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        let Some(pos) = state.position(id) else {
            return false;
        };
        if state.entries[pos].period.is_zero() {
            return false;
        }
        let mut entry = state.entries.remove(pos);
        entry.expiry = Instant::now() + entry.period;
        state.insert(entry);
        self.shared.condvar.notify_one();
        true
    }

    /// Read an entry's period. Zero means one-shot.
    pub fn repeats(&self, id: TimerId) -> Option<Duration> {
        let state = self.shared.state.lock().unwrap();
        state.position(id).map(|pos| state.entries[pos].period)
    }

    /// Update an entry's period. A zero period converts it to one-shot.
    pub fn set_repeats(&self, id: TimerId, period: Duration) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        match state.position(id) {
            Some(pos) => {
                state.entries[pos].period = period;
                true
            }
            None => false,
        }
    }

    /// Convert a periodic entry to one-shot: it fires once more at its
    /// current expiry, then is removed.
    pub fn finish(&self, id: TimerId) -> bool {
        self.set_repeats(id, Duration::ZERO)
    }

    pub fn exists(&self, id: TimerId) -> bool {
        self.shared.state.lock().unwrap().position(id).is_some()
    }

    /// Snapshot an entry's schedule.
    pub fn find(&self, id: TimerId) -> Option<TimerInfo> {
        let state = self.shared.state.lock().unwrap();
        state.position(id).map(|pos| TimerInfo {
            expiry: state.entries[pos].expiry,
            period: state.entries[pos].period,
        })
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().unwrap().entries.len()
    }

    /// `true` when nothing is scheduled, and always once stopped.
    pub fn empty(&self) -> bool {
        let state = self.shared.state.lock().unwrap();
        state.stopped || state.entries.is_empty()
    }

    /// Stop the worker and discard pending entries. Idempotent; after
    /// shutdown the queue accepts no further scheduling.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.stopped = true;
            state.entries.clear();
            self.shared.condvar.notify_all();
        }
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
            debug!("timer queue stopped");
        }
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<TimerShared>) {
    debug!("timer worker started");
    let mut state = shared.state.lock().unwrap();
    loop {
        if state.stopped {
            break;
        }
        if state.entries.is_empty() {
            state = shared.condvar.wait(state).unwrap();
            continue;
        }

        let now = Instant::now();
        let next_expiry = state.entries[0].expiry;
        if next_expiry > now {
            let (next, _) = shared
                .condvar
                .wait_timeout(state, next_expiry - now)
                .unwrap();
            state = next;
            continue;
        }

        // Due: take the entry, reschedule a periodic one, and only then
        // release the lock to run the task.
        let entry = state.entries.remove(0);
        let task = Arc::clone(&entry.task);
        if !entry.period.is_zero() {
            state.insert(TimerEntry {
                id: entry.id,
                expiry: entry.expiry + entry.period,
                period: entry.period,
                task: entry.task,
            });
        }
        drop(state);

        // The callable's own mutex is held only here, on the worker; a
        // panic unwinds through trap without poisoning it.
        let mut callable = task.lock().unwrap();
        if let Err(failure) = trap(|| (*callable)()) {
            (shared.error_handler)(failure);
        }
        drop(callable);

        state = shared.state.lock().unwrap();
    }
    debug!("timer worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use strand_core::TaskFailure;

    #[test]
    fn test_after_fires_once() {
        let queue = TimerQueue::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_in_task = Arc::clone(&fired);
        let id = queue
            .after(Duration::from_millis(50), move || {
                fired_in_task.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert!(id > 0);

        thread::sleep(Duration::from_millis(300));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!queue.exists(id));
    }

    #[test]
    fn test_at_fires_at_absolute_time() {
        let queue = TimerQueue::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_in_task = Arc::clone(&fired);
        queue
            .at(Instant::now() + Duration::from_millis(50), move || {
                fired_in_task.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        thread::sleep(Duration::from_millis(20));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        thread::sleep(Duration::from_millis(280));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let queue = TimerQueue::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_in_task = Arc::clone(&fired);
        let id = queue
            .after(Duration::from_millis(200), move || {
                fired_in_task.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));

        thread::sleep(Duration::from_millis(400));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_periodic_fires_repeatedly_until_cancelled() {
        let queue = TimerQueue::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_in_task = Arc::clone(&fired);
        let id = queue
            .periodic(
                Duration::from_millis(50),
                move || {
                    fired_in_task.fetch_add(1, Ordering::SeqCst);
                },
                false,
            )
            .unwrap();

        thread::sleep(Duration::from_millis(280));
        assert!(queue.cancel(id));

        let count = fired.load(Ordering::SeqCst);
        assert!(count >= 3, "expected at least 3 firings, got {}", count);

        // No further firing after cancel.
        thread::sleep(Duration::from_millis(200));
        assert_eq!(fired.load(Ordering::SeqCst), count);
    }

    #[test]
    fn test_periodic_shorten_fires_immediately() {
        let queue = TimerQueue::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_in_task = Arc::clone(&fired);
        let id = queue
            .periodic(
                Duration::from_millis(500),
                move || {
                    fired_in_task.fetch_add(1, Ordering::SeqCst);
                },
                true,
            )
            .unwrap();

        thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        queue.cancel(id);
    }

    #[test]
    fn test_finish_converts_to_one_shot() {
        let queue = TimerQueue::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_in_task = Arc::clone(&fired);
        let id = queue
            .periodic(
                Duration::from_millis(50),
                move || {
                    fired_in_task.fetch_add(1, Ordering::SeqCst);
                },
                false,
            )
            .unwrap();

        assert!(queue.finish(id));
        assert_eq!(queue.repeats(id), Some(Duration::ZERO));

        thread::sleep(Duration::from_millis(300));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!queue.exists(id));
    }

    #[test]
    fn test_refresh_rebases_periodic_expiry() {
        let queue = TimerQueue::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_in_task = Arc::clone(&fired);
        let id = queue
            .periodic(
                Duration::from_millis(300),
                move || {
                    fired_in_task.fetch_add(1, Ordering::SeqCst);
                },
                false,
            )
            .unwrap();

        // Halfway through the first period, push the expiry back out.
        thread::sleep(Duration::from_millis(150));
        assert!(queue.refresh(id));

        thread::sleep(Duration::from_millis(200));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        thread::sleep(Duration::from_millis(200));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        queue.cancel(id);
    }

    #[test]
    fn test_refresh_rejects_one_shot() {
        let queue = TimerQueue::new();

        let id = queue.after(Duration::from_secs(5), || {}).unwrap();
        assert!(!queue.refresh(id));
        assert!(!queue.refresh(9999));
        queue.cancel(id);
    }

    #[test]
    fn test_repeats_read_and_update() {
        let queue = TimerQueue::new();

        let id = queue
            .periodic(Duration::from_secs(1), || {}, false)
            .unwrap();
        assert_eq!(queue.repeats(id), Some(Duration::from_secs(1)));

        assert!(queue.set_repeats(id, Duration::from_secs(2)));
        assert_eq!(queue.repeats(id), Some(Duration::from_secs(2)));

        assert_eq!(queue.repeats(9999), None);
        assert!(!queue.set_repeats(9999, Duration::from_secs(1)));
        queue.cancel(id);
    }

    #[test]
    fn test_find_snapshots_schedule() {
        let queue = TimerQueue::new();

        let id = queue.after(Duration::from_secs(5), || {}).unwrap();
        let info = queue.find(id).unwrap();
        assert_eq!(info.period, Duration::ZERO);
        assert!(info.expiry > Instant::now());

        assert!(queue.exists(id));
        queue.cancel(id);
        assert!(!queue.exists(id));
        assert_eq!(queue.find(id), None);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let queue = TimerQueue::new();

        let a = queue.after(Duration::from_secs(5), || {}).unwrap();
        let b = queue.after(Duration::from_secs(5), || {}).unwrap();
        let c = queue
            .periodic(Duration::from_secs(5), || {}, false)
            .unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_shutdown_rejects_scheduling() {
        let queue = TimerQueue::new();

        queue.after(Duration::from_secs(60), || {}).unwrap();
        queue.shutdown();
        queue.shutdown();

        assert!(queue.empty());
        assert_eq!(queue.after(Duration::from_millis(1), || {}), None);
        assert_eq!(
            queue.at(Instant::now(), || {}),
            None
        );
        assert_eq!(
            queue.periodic(Duration::from_millis(1), || {}, false),
            None
        );
    }

    #[test]
    fn test_panicking_task_reaches_error_handler() {
        let failures = Arc::new(AtomicUsize::new(0));
        let failures_in_handler = Arc::clone(&failures);
        let queue = TimerQueue::with_error_handler(Arc::new(move |failure: TaskFailure| {
            assert_eq!(failure.message(), "timer task failed");
            failures_in_handler.fetch_add(1, Ordering::SeqCst);
        }));

        queue
            .after(Duration::from_millis(20), || panic!("timer task failed"))
            .unwrap();

        thread::sleep(Duration::from_millis(200));
        assert_eq!(failures.load(Ordering::SeqCst), 1);

        // The worker survived and keeps firing.
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_task = Arc::clone(&fired);
        queue
            .after(Duration::from_millis(20), move || {
                fired_in_task.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
