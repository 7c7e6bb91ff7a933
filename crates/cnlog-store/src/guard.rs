//! Lifecycle guard: a writer-preferring shared/exclusive lock fused with
//! the open-handle slot.
//!
//! Every data-path operation (append, count, boundary lookups, and the full
//! lifetime of any open cursor) holds the lock in shared mode; `clear` and
//! `shutdown` hold it exclusively. The handle slot is only observable while
//! one of the modes is held, so "open vs closed" is always decided under
//! the lock rather than by a nullable field racing concurrent writers.
//!
//! New shared acquisitions block while an exclusive acquisition is waiting,
//! so continuous read traffic cannot starve a close. An exclusive holder
//! waits only for the shared holders that exist when it arrives. A cursor
//! held open forever will stall a close; cursors honor the contract by
//! closing promptly.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::env::LogHandle;

pub(crate) struct HandleLock {
    state: Mutex<LockState>,
    cond: Condvar,
}

struct LockState {
    /// `Some` while the store is open.
    slot: Option<Arc<LogHandle>>,
    readers: usize,
    writer: bool,
    writers_waiting: usize,
}

impl HandleLock {
    pub(crate) fn new(handle: LogHandle) -> Self {
        Self {
            state: Mutex::new(LockState {
                slot: Some(Arc::new(handle)),
                readers: 0,
                writer: false,
                writers_waiting: 0,
            }),
            cond: Condvar::new(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LockState> {
        // The state mutex is only held for bookkeeping; recover from a
        // poisoned guard rather than cascading the panic.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Acquire shared mode, blocking while an exclusive holder is active or
    /// waiting. The returned guard carries the handle observed at
    /// acquisition time (`None` means the store is closed).
    pub(crate) fn acquire_shared(&self) -> SharedGuard<'_> {
        let mut state = self.lock_state();
        while state.writer || state.writers_waiting > 0 {
            state = self.cond.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        state.readers += 1;
        let handle = state.slot.clone();
        SharedGuard { lock: self, handle }
    }

    /// Acquire exclusive mode, blocking until every current shared holder
    /// releases.
    pub(crate) fn acquire_exclusive(&self) -> ExclusiveGuard<'_> {
        let mut state = self.lock_state();
        state.writers_waiting += 1;
        while state.writer || state.readers > 0 {
            state = self.cond.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        state.writers_waiting -= 1;
        state.writer = true;
        ExclusiveGuard { lock: self }
    }
}

/// Shared-mode hold. Releases exactly once, when dropped.
pub(crate) struct SharedGuard<'a> {
    lock: &'a HandleLock,
    handle: Option<Arc<LogHandle>>,
}

impl SharedGuard<'_> {
    /// The handle as observed at acquisition; `None` means closed.
    pub(crate) fn handle(&self) -> Option<&Arc<LogHandle>> {
        self.handle.as_ref()
    }
}

impl Drop for SharedGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.lock.lock_state();
        state.readers -= 1;
        drop(state);
        self.lock.cond.notify_all();
    }
}

/// Exclusive-mode hold with access to the handle slot.
pub(crate) struct ExclusiveGuard<'a> {
    lock: &'a HandleLock,
}

impl ExclusiveGuard<'_> {
    pub(crate) fn is_closed(&self) -> bool {
        self.lock.lock_state().slot.is_none()
    }

    /// Remove the handle from the slot, transitioning the store to Closed.
    pub(crate) fn take_handle(&mut self) -> Option<Arc<LogHandle>> {
        self.lock.lock_state().slot.take()
    }

    /// Install a fresh handle, transitioning the store back to Open.
    pub(crate) fn install_handle(&mut self, handle: LogHandle) {
        self.lock.lock_state().slot = Some(Arc::new(handle));
    }
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.lock.lock_state();
        state.writer = false;
        drop(state);
        self.lock.cond.notify_all();
    }
}
