//! One-shot readiness latch
//!
//! Holds the value that became ready plus the subscribers waiting for it.
//! The latch fires at most once; every subscriber runs exactly once, either
//! at the moment the latch fires or immediately if it already has.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Subscriber<T> = Box<dyn FnOnce(Arc<T>) + Send>;

struct LatchState<T> {
    ready: Option<Arc<T>>,
    pending: Vec<Subscriber<T>>,
}

/// Fires once with a shared value and notifies every subscriber once.
pub struct ReadyLatch<T> {
    state: Mutex<LatchState<T>>,
}

impl<T> Default for ReadyLatch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ReadyLatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ReadyLatch")
            .field("ready", &state.ready.is_some())
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl<T> ReadyLatch<T> {
    /// Create an unfired latch
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LatchState {
                ready: None,
                pending: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LatchState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fire the latch with `value`.
    ///
    /// Returns `false`, leaving the latch unchanged, if it already fired.
    /// Subscribers run on the calling thread, outside the internal lock.
    pub fn set(&self, value: Arc<T>) -> bool {
        let pending = {
            let mut state = self.lock();
            if state.ready.is_some() {
                return false;
            }
            state.ready = Some(value.clone());
            std::mem::take(&mut state.pending)
        };

        for subscriber in pending {
            subscriber(value.clone());
        }
        true
    }

    /// Run `callback` with the ready value, now or when the latch fires.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: FnOnce(Arc<T>) + Send + 'static,
    {
        let ready = {
            let mut state = self.lock();
            match &state.ready {
                Some(value) => value.clone(),
                None => {
                    state.pending.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(ready);
    }

    /// The ready value, if the latch fired
    pub fn get(&self) -> Option<Arc<T>> {
        self.lock().ready.clone()
    }

    /// Whether the latch fired
    pub fn is_set(&self) -> bool {
        self.lock().ready.is_some()
    }
}
