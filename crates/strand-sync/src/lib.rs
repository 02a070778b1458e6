//!
//! strand-sync - Synchronization Primitives
//!
//! Blocking coordination primitives for threads sharing state. Everything
//! here is conventional mutex + condition-variable machinery; nothing
//! spins and nothing is lock-free.
//!
//! ## Guarded Cells
//!
//! Protected values reachable only through RAII guards:
//! - `ExclusiveCell<T>` - mutex-owned value, one guard at a time
//! - `SharedCell<T>` - rwlock-owned value, many readers or one writer
//! - `locked`/`rlocked`/`wlocked` - closure-scoped access forms
//!
//! ## Coordination
//!
//! - `Semaphore` - counting permits with poisoning and reset
//! - `Barrier` - cyclic rendezvous for a fixed party count
//! - `Event` - single boolean condition, manual or auto-reset
//! - `WaitGroup` - countdown for fan-out/fan-in
//!
//! Each primitive owns exactly one mutex protecting only its own state;
//! no primitive acquires another primitive's lock.
//!

pub mod barrier;
pub mod cell;
pub mod event;
pub mod semaphore;
pub mod wait_group;

pub use barrier::*;
pub use cell::*;
pub use event::*;
pub use semaphore::*;
pub use wait_group::*;
