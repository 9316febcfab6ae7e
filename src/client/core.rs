//! Client facade.
//!
//! A [`Client`] ties one [`Connection`] to one [`Router`] and adds the
//! outbound conveniences: pre-emit hooks, action ids and local triggers.
//!
//! The event loop stops once every [`Client`] is dropped. Listeners are owned
//! by the event loop, so a listener that needs to talk back captures a
//! [`WeakClient`]; a captured [`Client`] would keep the loop alive forever.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::{Value, json};
//! use signalbus::Client;
//!
//! # async fn example() -> signalbus::Result<()> {
//! let client = Client::builder().url("ws://localhost:5000/parameters/ws").build()?;
//!
//! client.on("test_fn", |load: &Value| println!("echo: {load}"));
//! client.send("test_fn", json!([1, 2]))?;
//!
//! client.send_action("run", json!({ "n": 3 }), |status: &Value| {
//!     println!("action {status}");
//! })?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::{ActionId, SessionId};
use crate::protocol::{ACTION_ID_KEY, Envelope};
use crate::router::listeners::{ListenerTable, invoke};
use crate::router::{Dispatched, Router};
use crate::transport::backoff::ReconnectPolicy;
use crate::transport::connection::{Connection, ConnectionConfig, ConnectionState};
use crate::transport::status::{ErrorCallback, StatusReporter};

use super::builder::ClientBuilder;

// ============================================================================
// Client
// ============================================================================

/// Pub/sub client over a reconnecting WebSocket.
///
/// Cloning is cheap; clones share the socket, listeners and session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

/// State shared by every clone.
///
/// Holds the only [`Connection`] handle, so dropping the last [`Client`]
/// closes the command channel and ends the event loop.
struct ClientInner {
    /// Handle to the event loop.
    connection: Connection,
    /// Inbound listener tables and session slot.
    router: Router,
    /// Hooks run before a frame is queued.
    pre_emit: RwLock<ListenerTable<String>>,
}

/// Non-owning handle to a [`Client`].
///
/// Safe to capture inside listeners. Does not keep the event loop alive.
#[derive(Clone)]
pub struct WeakClient {
    inner: Weak<ClientInner>,
}

impl WeakClient {
    /// Returns the client if any strong handle is still alive.
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<Client> {
        self.inner.upgrade().map(|inner| Client { inner })
    }
}

impl fmt::Debug for WeakClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakClient")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

// ============================================================================
// Client - Construction
// ============================================================================

impl Client {
    /// Creates a builder for configuring a client.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client for `url` and starts connecting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if called outside a Tokio runtime.
    pub fn new<F>(on_error: F, session_id: Option<SessionId>, url: impl Into<String>) -> Result<Self>
    where
        F: Fn(Option<&str>) + Send + Sync + 'static,
    {
        let mut builder = ClientBuilder::new().url(url).on_error(on_error);
        if let Some(session_id) = session_id {
            builder = builder.session_id(session_id);
        }
        builder.build()
    }

    /// Spawns the event loop. Called by [`ClientBuilder::build`].
    pub(crate) fn spawn(
        url: String,
        session_id: Option<SessionId>,
        on_error: Option<ErrorCallback>,
        policy: ReconnectPolicy,
        request_args: Option<String>,
        auto_connect: bool,
    ) -> Result<Self> {
        let router = Router::with_session(session_id);
        let reporter = on_error.map_or_else(StatusReporter::silent, StatusReporter::new);

        let config = ConnectionConfig {
            url,
            policy,
            request_args,
        };

        let connection = Connection::spawn(config, router.clone(), reporter);

        let client = Self {
            inner: Arc::new(ClientInner {
                connection,
                router,
                pre_emit: RwLock::new(ListenerTable::default()),
            }),
        };

        debug!(url = %client.url(), auto_connect, "Client created");

        if auto_connect {
            client.connect()?;
        }

        Ok(client)
    }
}

// ============================================================================
// Client - Lifecycle
// ============================================================================

impl Client {
    /// Opens the socket, replacing any current one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] after [`shutdown`](Self::shutdown).
    #[inline]
    pub fn connect(&self) -> Result<()> {
        self.inner.connection.connect()
    }

    /// Closes the socket without reconnecting.
    ///
    /// Listeners, session id and queued frames are kept for a later
    /// [`connect`](Self::connect).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] after [`shutdown`](Self::shutdown).
    #[inline]
    pub fn disconnect(&self) -> Result<()> {
        self.inner.connection.disconnect()
    }

    /// Returns a handle that does not keep the event loop alive.
    #[inline]
    #[must_use]
    pub fn downgrade(&self) -> WeakClient {
        WeakClient {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Stops the event loop for every clone.
    #[inline]
    pub fn shutdown(&self) {
        self.inner.connection.shutdown();
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Returns a receiver that observes state changes.
    #[inline]
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.watch_state()
    }

    /// Waits until the connection reaches `state`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the event loop stops first.
    pub async fn wait_for_state(&self, state: ConnectionState) -> Result<()> {
        self.inner.connection.wait_for_state(state).await
    }

    /// Returns the socket URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        self.inner.connection.url()
    }

    /// Returns the session id assigned by the peer, if any.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.router.session_id()
    }
}

// ============================================================================
// Client - Listeners
// ============================================================================

impl Client {
    /// Registers a listener for a named signal.
    ///
    /// To send from inside the listener, capture [`Client::downgrade`].
    pub fn on<F>(&self, signal: impl Into<String>, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.router.on(signal, callback);
    }

    /// Registers a listener for an action id.
    pub fn on_action<F>(&self, id: impl Into<ActionId>, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.router.on_action(id, callback);
    }

    /// Registers a listener for one key of `data` signals.
    pub fn on_data<F>(&self, key: impl Into<String>, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.router.on_data(key, callback);
    }

    /// Registers a hook that sees every outgoing payload for `signal`.
    ///
    /// Hooks run inside [`send`](Self::send), before the frame is queued,
    /// whether or not a socket is open.
    pub fn pre_emit<F>(&self, signal: impl Into<String>, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.pre_emit.write().add(signal.into(), Arc::new(callback));
    }

    /// Delivers `load` to local listeners as if the peer had sent it.
    pub fn trigger(&self, signal: impl Into<String>, load: Value) -> Dispatched {
        self.inner.router.trigger(signal, load)
    }
}

// ============================================================================
// Client - Outbound
// ============================================================================

impl Client {
    /// Sends `load` under `signal`.
    ///
    /// Frames wait in the outbox while no socket is open and leave in call
    /// order once one is.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if `load` cannot be serialized
    /// - [`Error::ConnectionClosed`] after [`shutdown`](Self::shutdown)
    pub fn send(&self, signal: &str, load: impl Serialize) -> Result<()> {
        let load = serde_json::to_value(load)?;

        let hooks = self.inner.pre_emit.read().snapshot(signal);
        invoke(&hooks, &load);

        let text = Envelope::new(signal, load).to_text()?;
        trace!(signal, bytes = text.len(), "Queueing frame");
        self.inner.connection.send_text(text)
    }

    /// Sends an action and registers `on_status` for its completion frames.
    ///
    /// The payload must be a JSON object or `null`. A generated id is stored
    /// under `__action_id`, which makes the peer report `"start"` and `"end"`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `load` is not an object or `null`
    /// - [`Error::Json`] if `load` cannot be serialized
    /// - [`Error::ConnectionClosed`] after [`shutdown`](Self::shutdown)
    pub fn send_action<F>(&self, signal: &str, load: impl Serialize, on_status: F) -> Result<ActionId>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut fields = match serde_json::to_value(load)? {
            Value::Object(fields) => fields,
            Value::Null => Map::new(),
            other => {
                return Err(Error::invalid_argument(format!(
                    "Action payload must be an object, got {other}"
                )));
            }
        };

        let id = ActionId::generate();
        self.inner.router.on_action(id.clone(), on_status);
        fields.insert(ACTION_ID_KEY.to_string(), Value::String(id.as_str().to_string()));

        debug!(signal, action_id = %id, "Sending action");
        self.send(signal, Value::Object(fields))?;

        Ok(id)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url())
            .field("state", &self.state())
            .field("session_id", &self.session_id())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
