//!
//! Task Pool
//!
//! N worker threads share one FIFO and one accepting flag. Workers block
//! until the pool stops accepting or a task arrives; a worker woken with
//! an empty FIFO and a cleared accepting flag exits. Every accepted task
//! runs exactly once, but there is no total order across workers.
//!
//! Unlike the task queue, the pool does not trap task panics: error
//! policy belongs to the tasks themselves, and a panicking task takes
//! its worker thread down.
//!

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use strand_core::Task;
use tracing::debug;

struct PoolState {
    tasks: VecDeque<Task>,
    accepting: bool,
}

struct PoolShared {
    state: Mutex<PoolState>,
    condvar: Condvar,
}

/// Fixed-size pool of workers draining one shared FIFO.
pub struct TaskPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskPool {
    /// An idle pool. Call `start` before dispatching.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    tasks: VecDeque::new(),
                    accepting: false,
                }),
                condvar: Condvar::new(),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawn `count` workers (`0` means the host's hardware concurrency,
    /// minimum 1) and begin accepting work. A no-op on a started pool.
    pub fn start(&self, count: usize) {
        let mut workers = self.workers.lock().unwrap();
        if !workers.is_empty() {
            return;
        }

        let count = if count == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            count
        };

        self.shared.state.lock().unwrap().accepting = true;

        for i in 0..count {
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(format!("strand-pool-{i}"))
                .spawn(move || worker_loop(shared))
                .expect("failed to spawn pool worker");
            workers.push(handle);
        }
        debug!(workers = count, "task pool started");
    }

    /// Enqueue a task and wake one worker. Returns `false` if the pool is
    /// not accepting.
    pub fn dispatch(&self, task: impl FnOnce() + Send + 'static) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        if !state.accepting {
            return false;
        }
        state.tasks.push_back(Box::new(task));
        self.shared.condvar.notify_one();
        true
    }

    /// Stop accepting, wake all workers, and join them once they have
    /// consumed every pending task. Idempotent.
    pub fn drain(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.accepting = false;
            self.shared.condvar.notify_all();
        }

        // Joining happens outside the state lock so exiting workers can
        // still observe the cleared accepting flag.
        let mut workers = self.workers.lock().unwrap();
        if workers.is_empty() {
            return;
        }
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
        debug!("task pool drained");
    }

    /// Drain, then restart with `count` workers (`0` leaves the pool
    /// stopped).
    pub fn resize(&self, count: usize) {
        self.drain();
        if count != 0 {
            self.start(count);
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.lock().unwrap().len()
    }

    pub fn is_accepting(&self) -> bool {
        self.shared.state.lock().unwrap().accepting
    }

    /// Pending task count.
    pub fn len(&self) -> usize {
        self.shared.state.lock().unwrap().tasks.len()
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.drain();
    }
}

fn worker_loop(shared: Arc<PoolShared>) {
    let mut state = shared.state.lock().unwrap();
    loop {
        while state.tasks.is_empty() && state.accepting {
            state = shared.condvar.wait(state).unwrap();
        }
        match state.tasks.pop_front() {
            Some(task) => {
                drop(state);
                // Deliberately untrapped: a panic here unwinds this
                // worker and nothing else.
                task();
                state = shared.state.lock().unwrap();
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_pool_runs_every_accepted_task() {
        let pool = TaskPool::new();
        pool.start(4);
        assert_eq!(pool.worker_count(), 4);

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            assert!(pool.dispatch(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        pool.drain();
        assert_eq!(counter.load(Ordering::SeqCst), 8);
        assert_eq!(pool.worker_count(), 0);
    }

    #[test]
    fn test_dispatch_fails_when_idle() {
        let pool = TaskPool::new();
        assert!(!pool.dispatch(|| {}));

        pool.start(1);
        assert!(pool.dispatch(|| {}));

        pool.drain();
        assert!(!pool.dispatch(|| {}));
    }

    #[test]
    fn test_start_zero_uses_hardware_concurrency() {
        let pool = TaskPool::new();
        pool.start(0);
        assert!(pool.worker_count() >= 1);
        pool.drain();
    }

    #[test]
    fn test_start_is_noop_when_started() {
        let pool = TaskPool::new();
        pool.start(2);
        pool.start(4);
        assert_eq!(pool.worker_count(), 2);
        pool.drain();
    }

    #[test]
    fn test_drain_is_idempotent_and_consumes_pending() {
        let pool = TaskPool::new();
        pool.start(1);

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            assert!(pool.dispatch(move || {
                thread::sleep(Duration::from_millis(10));
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        pool.drain();
        pool.drain();

        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn test_resize_restarts_with_new_count() {
        let pool = TaskPool::new();
        pool.start(2);
        assert_eq!(pool.worker_count(), 2);

        pool.resize(3);
        assert_eq!(pool.worker_count(), 3);
        assert!(pool.is_accepting());

        pool.resize(0);
        assert_eq!(pool.worker_count(), 0);
        assert!(!pool.is_accepting());
    }

    #[test]
    fn test_concurrent_dispatchers_lose_nothing() {
        let pool = Arc::new(TaskPool::new());
        pool.start(4);

        let counter = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..25 {
                        let counter = Arc::clone(&counter);
                        assert!(pool.dispatch(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                        }));
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        pool.drain();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_panicking_task_takes_only_its_worker() {
        let pool = TaskPool::new();
        pool.start(2);

        pool.dispatch(|| panic!("pool task failed"));
        thread::sleep(Duration::from_millis(100));

        // The surviving worker still serves the pool.
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            assert!(pool.dispatch(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        pool.drain();
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }
}
