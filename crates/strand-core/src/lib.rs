//!
//! strand-core - Shared runtime foundation
//!
//! Common ground for the strand worker crates:
//!
//! ## Task Callables
//!
//! - `Task` - a one-shot unit of work accepted by the task queue and pool
//! - `TimerTask` - a repeatable callable owned by a timer entry
//!
//! ## Failure Routing
//!
//! - `TaskFailure` - an owned panic payload with a readable message
//! - `ErrorHandler` - the capability a worker hands failures to
//! - `trap` - the single point where a worker invokes a task; a panic
//!   inside the task never unwinds past it
//!

pub mod failure;
pub mod task;

pub use failure::*;
pub use task::*;
