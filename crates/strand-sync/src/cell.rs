//!
//! Guarded Cells
//!
//! Protected values owned by a lock. The value is reachable only through
//! a live guard, so the lock/value pairing is enforced by the type system
//! rather than by caller discipline.
//!
//! - `ExclusiveCell<T>` wraps a mutex: exactly one guard at a time.
//! - `SharedCell<T>` wraps a reader-writer lock: any number of read
//!   guards, or exactly one write guard.
//!
//! Guards release on drop. `unlock(self)` releases early by consuming the
//! guard, so use-after-release does not compile. Holding a guard across a
//! blocking wait on another primitive can deadlock and is a caller error.
//!

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A value protected by a mutex. All access goes through `ExclusiveGuard`.
pub struct ExclusiveCell<T> {
    inner: Mutex<T>,
}

impl<T> ExclusiveCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Block until no other guard for this cell is live, then return a
    /// guard granting mutable access.
    pub fn lock(&self) -> ExclusiveGuard<'_, T> {
        ExclusiveGuard {
            inner: self.inner.lock().unwrap(),
        }
    }

    /// Non-blocking variant of `lock`. Returns `None` if another guard is
    /// live.
    pub fn try_lock(&self) -> Option<ExclusiveGuard<'_, T>> {
        self.inner
            .try_lock()
            .ok()
            .map(|inner| ExclusiveGuard { inner })
    }

    /// Run `f` with the lock held, releasing it when `f` returns.
    pub fn locked<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Consume the cell, yielding the protected value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner().unwrap()
    }
}

/// RAII handle granting mutable access to an `ExclusiveCell`.
pub struct ExclusiveGuard<'a, T> {
    inner: MutexGuard<'a, T>,
}

impl<T> ExclusiveGuard<'_, T> {
    /// Release the lock before the end of scope. Consumes the guard, so
    /// later access through it is a compile error.
    pub fn unlock(self) {}
}

impl<T> Deref for ExclusiveGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for ExclusiveGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

/// A value protected by a reader-writer lock. Read access is shared,
/// write access exclusive.
pub struct SharedCell<T> {
    inner: RwLock<T>,
}

impl<T> SharedCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    /// Block until no write guard is live, then return a shared read
    /// guard. Multiple read guards may coexist.
    pub fn read(&self) -> SharedReadGuard<'_, T> {
        SharedReadGuard {
            inner: self.inner.read().unwrap(),
        }
    }

    /// Block until no guard of any kind is live, then return a write
    /// guard granting mutable access.
    pub fn write(&self) -> SharedWriteGuard<'_, T> {
        SharedWriteGuard {
            inner: self.inner.write().unwrap(),
        }
    }

    /// Non-blocking variant of `read`.
    pub fn try_read(&self) -> Option<SharedReadGuard<'_, T>> {
        self.inner
            .try_read()
            .ok()
            .map(|inner| SharedReadGuard { inner })
    }

    /// Non-blocking variant of `write`.
    pub fn try_write(&self) -> Option<SharedWriteGuard<'_, T>> {
        self.inner
            .try_write()
            .ok()
            .map(|inner| SharedWriteGuard { inner })
    }

    /// Run `f` with the read lock held.
    pub fn rlocked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.read();
        f(&guard)
    }

    /// Run `f` with the write lock held.
    pub fn wlocked<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.write();
        f(&mut guard)
    }

    /// Consume the cell, yielding the protected value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner().unwrap()
    }
}

/// RAII handle granting shared immutable access to a `SharedCell`.
pub struct SharedReadGuard<'a, T> {
    inner: RwLockReadGuard<'a, T>,
}

impl<T> SharedReadGuard<'_, T> {
    /// Release the read lock early by consuming the guard.
    pub fn unlock(self) {}
}

impl<T> Deref for SharedReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

/// RAII handle granting exclusive mutable access to a `SharedCell`.
pub struct SharedWriteGuard<'a, T> {
    inner: RwLockWriteGuard<'a, T>,
}

impl<T> SharedWriteGuard<'_, T> {
    /// Release the write lock early by consuming the guard.
    pub fn unlock(self) {}
}

impl<T> Deref for SharedWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for SharedWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}
