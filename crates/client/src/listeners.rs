//! Persistent progress listeners.
//!
//! Listeners survive across traversals and see every progress event the page
//! receives. A panicking listener is logged and skipped; the others still run.

use cairn_core::ProgressEvent;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Identifier returned by [`ListenerRegistry::subscribe`].
pub type ListenerId = u64;

/// Callback receiving progress events.
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<BTreeMap<ListenerId, ProgressCallback>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: ProgressCallback) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock().insert(id, callback);
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every listener in subscription order.
    ///
    /// Returns the number of listeners that completed without panicking.
    pub fn notify(&self, event: &ProgressEvent) -> usize {
        // Snapshot so listeners may subscribe or unsubscribe re-entrantly
        let snapshot: Vec<(ListenerId, ProgressCallback)> = self
            .lock()
            .iter()
            .map(|(id, callback)| (*id, callback.clone()))
            .collect();

        snapshot
            .into_iter()
            .filter(|(id, callback)| call_isolated(*id, callback, event))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ListenerId, ProgressCallback>> {
        // Callbacks never run under the lock, so a poisoned map is still consistent
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run `callback`, containing any panic. Returns `true` on success.
pub(crate) fn call_isolated(id: u64, callback: &ProgressCallback, event: &ProgressEvent) -> bool {
    match catch_unwind(AssertUnwindSafe(|| callback(event))) {
        Ok(()) => true,
        Err(panic) => {
            tracing::error!(
                listener = id,
                cid = %event.root_cid(),
                panic = panic_message(panic.as_ref()),
                "Progress listener panicked"
            );
            false
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
