//! Inbound frame dispatch.
//!
//! The router owns the listener tables and the session slot. It has no
//! transport dependency: the connection event loop feeds it raw text
//! frames, and tests can do the same with synthetic ones.
//!
//! # Routing
//!
//! | Signal | Effect |
//! |--------|--------|
//! | `__connect` | Stores `load.analysis_id` as the session id |
//! | `__action` | Calls `on_action(load.id)` listeners with `load.status` |
//! | `data` | Calls `on("data")` listeners, then `on_data(key)` per entry |
//! | anything else | Calls `on(signal)` listeners with `load` |
//!
//! Unmatched signals and action ids are dropped without error.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::identifiers::{ActionId, SessionId};
use crate::protocol::{DATA_SIGNAL, Envelope, Frame};

use super::listeners::{ListenerTable, invoke};

// ============================================================================
// Dispatched
// ============================================================================

/// Outcome of dispatching one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Session id was replaced.
    Session(Option<SessionId>),

    /// Action notification delivered to `delivered` listeners.
    Action {
        /// Action id from the frame.
        id: ActionId,
        /// Number of listeners that returned normally.
        delivered: usize,
    },

    /// Signal delivered to `delivered` listeners.
    Signal {
        /// Signal name from the frame.
        signal: String,
        /// Number of listeners that returned normally.
        delivered: usize,
    },

    /// Frame was malformed and dropped.
    Dropped,
}

// ============================================================================
// Router
// ============================================================================

/// Listener registry and inbound frame dispatcher.
///
/// Cloning is cheap; clones share the same tables and session slot.
#[derive(Clone, Default)]
pub struct Router {
    inner: Arc<RouterInner>,
}

#[derive(Default)]
struct RouterInner {
    signals: RwLock<ListenerTable<String>>,
    actions: RwLock<ListenerTable<ActionId>>,
    data: RwLock<ListenerTable<String>>,
    session: RwLock<Option<SessionId>>,
}

impl Router {
    /// Creates a router with no session.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a router resuming an existing session.
    #[must_use]
    pub fn with_session(session_id: Option<SessionId>) -> Self {
        let router = Self::default();
        *router.inner.session.write() = session_id;
        router
    }

    /// Registers a listener for a named signal.
    ///
    /// Listeners for the same name fire in registration order.
    pub fn on<F>(&self, signal: impl Into<String>, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner
            .signals
            .write()
            .add(signal.into(), Arc::new(callback));
    }

    /// Registers a listener for an action id.
    ///
    /// Fires with the status payload of every matching `__action` frame.
    pub fn on_action<F>(&self, id: impl Into<ActionId>, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.actions.write().add(id.into(), Arc::new(callback));
    }

    /// Registers a listener for one key of `data` signals.
    pub fn on_data<F>(&self, key: impl Into<String>, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.data.write().add(key.into(), Arc::new(callback));
    }

    /// Returns the current session id.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.session.read().clone()
    }

    /// Returns the number of listeners registered for `signal`.
    #[inline]
    #[must_use]
    pub fn listener_count(&self, signal: &str) -> usize {
        self.inner.signals.read().count(signal)
    }

    /// Parses and dispatches a raw text frame.
    ///
    /// Malformed frames are logged and dropped.
    pub fn dispatch(&self, text: &str) -> Dispatched {
        match Frame::parse(text) {
            Ok(frame) => self.dispatch_frame(frame),
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                Dispatched::Dropped
            }
        }
    }

    /// Dispatches an already parsed frame.
    pub fn dispatch_frame(&self, frame: Frame) -> Dispatched {
        match frame {
            Frame::Connect { session_id } => {
                debug!(session_id = ?session_id, "Session id set");
                *self.inner.session.write() = session_id.clone();
                Dispatched::Session(session_id)
            }

            Frame::Action { id, status } => {
                let listeners = self.inner.actions.read().snapshot(&id);
                if listeners.is_empty() {
                    trace!(%id, "No listeners for action");
                }
                let delivered = invoke(&listeners, &status);
                Dispatched::Action { id, delivered }
            }

            Frame::Signal(envelope) => self.dispatch_signal(envelope),
        }
    }

    /// Delivers a payload to local listeners as if the peer had sent it.
    pub fn trigger(&self, signal: impl Into<String>, load: Value) -> Dispatched {
        self.dispatch_signal(Envelope::new(signal, load))
    }

    fn dispatch_signal(&self, envelope: Envelope) -> Dispatched {
        let Envelope { signal, load } = envelope;

        let listeners = self.inner.signals.read().snapshot(signal.as_str());
        let mut delivered = invoke(&listeners, &load);

        if signal == DATA_SIGNAL
            && let Value::Object(entries) = &load
        {
            for (key, value) in entries {
                let listeners = self.inner.data.read().snapshot(key.as_str());
                delivered += invoke(&listeners, value);
            }
        }

        if delivered == 0 {
            trace!(%signal, "No listeners for signal");
        }

        Dispatched::Signal { signal, delivered }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("signals", &*self.inner.signals.read())
            .field("actions", &*self.inner.actions.read())
            .field("data", &*self.inner.data.read())
            .field("session", &*self.inner.session.read())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
