//!
//! strand-tasks - Background Task Execution
//!
//! ## Task Queue
//!
//! `TaskQueue` owns a single worker thread draining a FIFO. Dispatch is
//! non-blocking: a bounded dispatch reports backpressure by returning
//! `false`, and `priority` jumps the line for urgent work. Idle waits and
//! the final act of the worker are injectable strategies, fixed before
//! the worker starts.
//!
//! ## Task Pool
//!
//! `TaskPool` owns N worker threads sharing one FIFO and one accepting
//! flag. `drain` stops intake and returns once every accepted task has
//! run and all workers have exited. The pool guarantees exactly-once
//! execution per accepted task, but no total order across workers.
//!
//! ## Failure Policy
//!
//! The queue traps task panics and routes them to its error handler; the
//! pool deliberately does not, leaving error policy to its tasks.
//!

pub mod pool;
pub mod queue;

pub use pool::*;
pub use queue::*;
