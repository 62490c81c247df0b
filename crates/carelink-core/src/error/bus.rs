//! Process-wide error bus.
//!
//! Best-effort fan-out: every subscriber sees every emitted error, and a
//! subscriber that panics is isolated from the others and from the emitter.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use super::ApiError;

type Listener = Arc<dyn Fn(&ApiError) + Send + Sync>;

static GLOBAL_BUS: Lazy<Arc<ErrorBus>> = Lazy::new(|| Arc::new(ErrorBus::new()));

/// Handle returned by [`ErrorBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SubscriptionId {
    fn from(value: u64) -> Self {
        SubscriptionId(value)
    }
}

/// Observer registry for normalized API errors.
pub struct ErrorBus {
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
}

impl Default for ErrorBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorBus {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The bus shared by every gateway that was not given its own.
    pub fn global() -> Arc<ErrorBus> {
        Arc::clone(&GLOBAL_BUS)
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ApiError) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Deliver an error to every subscriber registered at the time of the call.
    pub fn emit(&self, error: &ApiError) {
        let snapshot: Vec<(SubscriptionId, Listener)> = self.lock().clone();

        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(error))).is_err() {
                tracing::warn!(subscription = id.0, "Error bus listener panicked");
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
