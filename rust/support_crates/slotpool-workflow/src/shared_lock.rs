//! The mutual-exclusion handle handed to every task of a parallel run.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A cloneable handle to a single lock shared by all tasks of one run.
///
/// The pool never acquires it; it exists so that task bodies can serialize
/// access to something they share, such as standard output. All clones refer
/// to the same lock, which [`ptr_eq`](Self::ptr_eq) can confirm.
#[derive(Debug, Clone, Default)]
pub struct SharedLock(Arc<Mutex<()>>);

impl SharedLock {
    pub fn new() -> SharedLock {
        SharedLock::default()
    }

    /// Acquires the lock, blocking until it is available.
    ///
    /// The lock is released when the guard is dropped, including during
    /// unwinding. A task that panicked while holding it does not poison it
    /// for the others.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` while holding the lock.
    pub fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock();
        f()
    }

    /// Returns `true` if both handles refer to the same lock.
    pub fn ptr_eq(&self, other: &SharedLock) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
