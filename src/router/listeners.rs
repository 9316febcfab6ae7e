//! Ordered listener tables.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::warn;

// ============================================================================
// Types
// ============================================================================

/// Listener callback type.
///
/// Called with the payload of every matching frame.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

// ============================================================================
// ListenerTable
// ============================================================================

/// Map of keys to listeners, kept in registration order.
pub(crate) struct ListenerTable<K> {
    entries: FxHashMap<K, Vec<Listener>>,
}

impl<K> Default for ListenerTable<K> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

impl<K: Eq + Hash> ListenerTable<K> {
    /// Appends a listener under `key`.
    pub(crate) fn add(&mut self, key: K, listener: Listener) {
        self.entries.entry(key).or_default().push(listener);
    }

    /// Clones the listeners for `key` so they can run without the lock held.
    pub(crate) fn snapshot<Q>(&self, key: &Q) -> Vec<Listener>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    /// Returns the number of listeners under `key`.
    pub(crate) fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map_or(0, Vec::len)
    }
}

/// Calls listeners in order, returning how many returned normally.
///
/// A panicking listener is logged and skipped; the rest still run.
pub(crate) fn invoke(listeners: &[Listener], payload: &Value) -> usize {
    let mut completed = 0;
    for listener in listeners {
        match catch_unwind(AssertUnwindSafe(|| listener(payload))) {
            Ok(()) => completed += 1,
            Err(panic) => warn!(panic = panic_message(panic.as_ref()), "Listener panicked"),
        }
    }
    completed
}

/// Extracts the message of a panic payload.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

impl<K> fmt::Debug for ListenerTable<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerTable")
            .field("keys", &self.entries.len())
            .field(
                "listeners",
                &self.entries.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
