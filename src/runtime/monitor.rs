//! Single-lock monitor guarding one state struct.
//!
//! Every stream keeps all of its state (buffer, flags, error, idle deadline)
//! behind one [`Monitor`]: many checks must see several fields at once, so the
//! state is never split across locks. Waiters block on the paired condition
//! variable with a timeout and re-evaluate whatever they care about on wake.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A mutex-protected state paired with a condition variable.
#[derive(Debug)]
pub(crate) struct Monitor<S> {
    state: Mutex<S>,
    changed: Condvar,
}

impl<S> Monitor<S> {
    /// Creates a monitor around the initial state.
    pub(crate) fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
            changed: Condvar::new(),
        }
    }

    /// Locks the state.
    ///
    /// Poisoning is ignored: state transitions never leave the struct half-updated
    /// across a user callback, so a panic elsewhere does not invalidate it.
    pub(crate) fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Releases the guard, waits for a notification or `timeout`, and relocks.
    pub(crate) fn wait<'a>(&self, guard: MutexGuard<'a, S>, timeout: Duration) -> MutexGuard<'a, S> {
        match self.changed.wait_timeout(guard, timeout) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }

    /// Wakes every waiter.
    pub(crate) fn notify_all(&self) {
        self.changed.notify_all();
    }
}
