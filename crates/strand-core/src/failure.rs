//!
//! Task Failure Capture
//!
//! A worker thread must survive any panic raised by a task it runs. `trap`
//! is the single invocation point: it runs the task under `catch_unwind`
//! and converts a panic payload into a `TaskFailure` the caller can hand
//! to its configured `ErrorHandler`.
//!
//! The task pool deliberately does not use this module for the tasks it
//! runs; pool tasks own their error policy.
//!

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;
use tracing::error;

/// The panic payload of a failed task, with a readable message.
#[derive(Error)]
#[error("{message}")]
pub struct TaskFailure {
    message: String,
    payload: Box<dyn Any + Send>,
}

impl TaskFailure {
    fn new(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked with a non-string payload".to_string()
        };
        Self { message, payload }
    }

    /// Human-readable description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The raw panic payload, for handlers that want to downcast it.
    pub fn payload(&self) -> &(dyn Any + Send) {
        &*self.payload
    }

    /// Consume the failure, yielding the raw panic payload.
    pub fn into_payload(self) -> Box<dyn Any + Send> {
        self.payload
    }
}

impl fmt::Debug for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFailure")
            .field("message", &self.message)
            .finish()
    }
}

/// Callback a worker routes task failures to. Defaults to a no-op.
pub type ErrorHandler = Arc<dyn Fn(TaskFailure) + Send + Sync>;

/// The default error handler: discards the failure.
pub fn noop_error_handler() -> ErrorHandler {
    Arc::new(|_| {})
}

/// Run a task, trapping any panic it raises.
///
/// This is the only place a strand worker invokes a task. The worker's
/// internal lock is never held here, so a task may freely call back into
/// the primitive that scheduled it.
pub fn trap<F: FnOnce()>(task: F) -> Result<(), TaskFailure> {
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(()) => Ok(()),
        Err(payload) => {
            let failure = TaskFailure::new(payload);
            error!(reason = failure.message(), "task panicked");
            Err(failure)
        }
    }
}
