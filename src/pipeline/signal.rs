//! Synchronization points between pipeline stages.
//!
//! - [`Gate`]: one-shot readiness barrier carrying a value (parsed templates)
//!   or just a fact (output directory scaffolded). A gate is either opened or
//!   aborted; waiters never block past a failed setup.
//! - [`WaitGroup`]: countdown barrier. Completion is signalled through a
//!   [`DoneGuard`], so a stage that bails out with `?` still counts down.
//! - [`FirstError`]: keeps the first fatal error reported by concurrent tasks.

use parking_lot::{Condvar, Mutex};
use std::sync::OnceLock;

/// One-shot barrier that hands a value to every waiter.
pub struct Gate<T> {
    value: OnceLock<Option<T>>,
    lock: Mutex<()>,
    cvar: Condvar,
}

impl<T> Gate<T> {
    pub fn new() -> Self {
        Self {
            value: OnceLock::new(),
            lock: Mutex::new(()),
            cvar: Condvar::new(),
        }
    }

    /// Publish the value and release every waiter.
    pub fn open(&self, value: T) {
        self.settle(Some(value));
    }

    /// Release every waiter without a value.
    pub fn abort(&self) {
        self.settle(None);
    }

    fn settle(&self, value: Option<T>) {
        let _guard = self.lock.lock();
        // Only the first settle counts.
        let _ = self.value.set(value);
        self.cvar.notify_all();
    }

    /// Block until the gate settles. `None` means the producer failed.
    pub fn wait(&self) -> Option<&T> {
        if let Some(value) = self.value.get() {
            return value.as_ref();
        }

        let mut guard = self.lock.lock();
        while self.value.get().is_none() {
            self.cvar.wait(&mut guard);
        }
        drop(guard);

        self.value.get().and_then(Option::as_ref)
    }
}

impl<T> Default for Gate<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Countdown barrier: `wait` returns once `done` was called `count` times.
pub struct WaitGroup {
    remaining: Mutex<usize>,
    cvar: Condvar,
}

impl WaitGroup {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            cvar: Condvar::new(),
        }
    }

    pub fn done(&self) {
        let mut remaining = self.remaining.lock();
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.cvar.notify_all();
        }
    }

    /// Count down when the returned guard is dropped.
    pub fn guard(&self) -> DoneGuard<'_> {
        DoneGuard(self)
    }

    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.cvar.wait(&mut remaining);
        }
    }
}

/// Calls [`WaitGroup::done`] on drop.
pub struct DoneGuard<'a>(&'a WaitGroup);

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.0.done();
    }
}

/// Slot for the first fatal error raised by concurrent tasks.
#[derive(Default)]
pub struct FirstError {
    slot: Mutex<Option<anyhow::Error>>,
}

impl FirstError {
    /// Record `err` unless an earlier error is already stored.
    pub fn record(&self, err: anyhow::Error) {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    pub fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }

    pub fn take(&self) -> Option<anyhow::Error> {
        self.slot.lock().take()
    }
}
