//!
//! Task Callable Types
//!
//! Units of work are type-erased zero-argument closures. They may capture
//! arbitrary state by value; the only requirement is that they can be moved
//! to a worker thread.
//!

/// A one-shot unit of work. Consumed by the task queue and task pool.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A repeatable unit of work owned by a timer entry. Periodic entries
/// invoke their callable once per firing.
pub type TimerTask = Box<dyn FnMut() + Send + 'static>;
