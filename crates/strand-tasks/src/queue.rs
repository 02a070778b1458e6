//!
//! Task Queue
//!
//! One background worker drains a FIFO of one-shot callables. Tasks
//! dispatched through `dispatch` run in submission order; `priority`
//! jumps ahead of every pending `dispatch` task while keeping FIFO order
//! among priority tasks themselves.
//!
//! The worker consults an injectable timeout strategy whenever the FIFO
//! is empty, and runs an injectable shutdown strategy as its last act, on
//! the worker thread itself. Both are fixed before the worker starts.
//!

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use strand_core::{ErrorHandler, Task, noop_error_handler, trap};
use tracing::debug;

/// Consulted each time the FIFO is empty; returns how long the worker
/// waits for a wake-up before re-checking.
pub type TimeoutStrategy = Box<dyn Fn() -> Duration + Send + Sync>;

/// Run once on the worker thread as the last step of shutdown.
pub type ShutdownStrategy = Box<dyn FnOnce() + Send>;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

struct QueueState {
    // Two lanes: priority tasks drain first, each lane in FIFO order.
    priority: VecDeque<Task>,
    tasks: VecDeque<Task>,
    running: bool,
}

impl QueueState {
    fn depth(&self) -> usize {
        self.priority.len() + self.tasks.len()
    }

    fn pop(&mut self) -> Option<Task> {
        self.priority.pop_front().or_else(|| self.tasks.pop_front())
    }
}

struct QueueShared {
    state: Mutex<QueueState>,
    condvar: Condvar,
    error_handler: ErrorHandler,
    timeout_strategy: TimeoutStrategy,
    shutdown_strategy: Mutex<Option<ShutdownStrategy>>,
}

/// Configures a `TaskQueue` before its worker starts. Strategies cannot
/// be changed once the queue is built.
pub struct TaskQueueBuilder {
    error_handler: ErrorHandler,
    timeout_strategy: TimeoutStrategy,
    shutdown_strategy: Option<ShutdownStrategy>,
}

impl TaskQueueBuilder {
    pub fn new() -> Self {
        Self {
            error_handler: noop_error_handler(),
            timeout_strategy: Box::new(|| DEFAULT_IDLE_TIMEOUT),
            shutdown_strategy: None,
        }
    }

    /// Route trapped task failures to `handler`.
    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = handler;
        self
    }

    /// Replace the default one-minute idle wait.
    pub fn timeout_strategy(mut self, strategy: impl Fn() -> Duration + Send + Sync + 'static) -> Self {
        self.timeout_strategy = Box::new(strategy);
        self
    }

    /// Run `strategy` on the worker thread as its last act before exit.
    pub fn shutdown_strategy(mut self, strategy: impl FnOnce() + Send + 'static) -> Self {
        self.shutdown_strategy = Some(Box::new(strategy));
        self
    }

    /// Start the worker and return the running queue.
    pub fn build(self) -> TaskQueue {
        let shared = Arc::new(QueueShared {
            state: Mutex::new(QueueState {
                priority: VecDeque::new(),
                tasks: VecDeque::new(),
                running: true,
            }),
            condvar: Condvar::new(),
            error_handler: self.error_handler,
            timeout_strategy: self.timeout_strategy,
            shutdown_strategy: Mutex::new(self.shutdown_strategy),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("strand-queue".to_string())
                .spawn(move || worker_loop(shared))
                .expect("failed to spawn queue worker")
        };

        TaskQueue {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }
}

impl Default for TaskQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Single background worker draining a FIFO of callables.
pub struct TaskQueue {
    shared: Arc<QueueShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TaskQueue {
    /// A queue with default strategies: no-op error handler, one-minute
    /// idle wait, no shutdown hook.
    pub fn new() -> Self {
        TaskQueueBuilder::new().build()
    }

    pub fn builder() -> TaskQueueBuilder {
        TaskQueueBuilder::new()
    }

    /// Append a task. Returns `false` if the queue is not running.
    pub fn dispatch(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.enqueue(Box::new(task), 0, false)
    }

    /// Append a task unless the queue already holds `max` pending tasks
    /// (`max == 0` means unbounded). Rejection is immediate, never
    /// blocking.
    pub fn dispatch_bounded(&self, task: impl FnOnce() + Send + 'static, max: usize) -> bool {
        self.enqueue(Box::new(task), max, false)
    }

    /// Insert a task ahead of all pending `dispatch` tasks, behind any
    /// earlier `priority` task. Not subject to any bound; fails only when
    /// the queue is not running.
    pub fn priority(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.enqueue(Box::new(task), 0, true)
    }

    fn enqueue(&self, task: Task, max: usize, front: bool) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        if !state.running {
            return false;
        }
        if max > 0 && state.depth() >= max {
            return false;
        }
        if front {
            state.priority.push_back(task);
        } else {
            state.tasks.push_back(task);
        }
        self.shared.condvar.notify_one();
        true
    }

    /// Discard all pending tasks without running them.
    pub fn clear(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.priority.clear();
        state.tasks.clear();
    }

    /// Pending task count, both lanes.
    pub fn len(&self) -> usize {
        self.shared.state.lock().unwrap().depth()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().unwrap().running
    }

    /// Stop the worker and join it. Idempotent. The shutdown strategy
    /// runs on the worker thread before it exits; pending tasks are not
    /// drained.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.running = false;
            self.shared.condvar.notify_all();
        }
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
            debug!("task queue stopped");
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<QueueShared>) {
    debug!("queue worker started");
    let mut state = shared.state.lock().unwrap();
    loop {
        if !state.running {
            break;
        }
        if let Some(task) = state.pop() {
            drop(state);
            if let Err(failure) = trap(task) {
                (shared.error_handler)(failure);
            }
            state = shared.state.lock().unwrap();
            continue;
        }

        // Consult the timeout strategy with no lock held; it is user
        // code. Re-check for work dispatched in the meantime before
        // sleeping.
        drop(state);
        let idle = (shared.timeout_strategy)();
        state = shared.state.lock().unwrap();
        if !state.running {
            break;
        }
        if state.depth() > 0 {
            continue;
        }
        let (next, _) = shared.condvar.wait_timeout(state, idle).unwrap();
        state = next;
    }
    drop(state);

    // Last act on the worker thread, after the drain decision but before
    // exit, so the hook may touch state the worker was using.
    if let Some(hook) = shared.shutdown_strategy.lock().unwrap().take() {
        hook();
    }
    debug!("queue worker stopped");
}
