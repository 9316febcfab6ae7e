//! signalbus - Reconnecting WebSocket pub/sub client.
//!
//! This library connects to an analysis backend over a single WebSocket and
//! exchanges named JSON signals with it.
//!
//! # Architecture
//!
//! The client follows a handle/event-loop model:
//!
//! - **Handle ([`Client`])**: Registers listeners, queues outbound frames
//! - **Event loop**: Owns the socket, timers and outbox; routes inbound frames
//!
//! Key design principles:
//!
//! - One socket per client; stale sockets are rejected by generation number
//! - Frames are `{"signal": name, "load": any}` JSON text
//! - Sends never fail on transport conditions; frames wait for an open socket
//! - Lifecycle failures reach the user through one error callback
//!
//! # Quick Start
//!
//! ```no_run
//! use serde_json::{Value, json};
//! use signalbus::{Client, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder()
//!         .page_url("http://localhost:5000/parameters/index.html")
//!         .on_error(|message| match message {
//!             Some(message) => eprintln!("error: {message}"),
//!             None => eprintln!("connected"),
//!         })
//!         .build()?;
//!
//!     client.on("test_fn", |load: &Value| println!("echo: {load}"));
//!     client.send("test_fn", json!([1, 2]))?;
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     client.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`Client`] facade and [`ClientBuilder`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | WebSocket message types |
//! | [`router`] | Inbound frame dispatch |
//! | [`transport`] | Socket lifecycle and reconnect policy |
//!
//! # Features
//!
//! - `tls`: enables `wss://` endpoints through native-tls

// ============================================================================
// Modules
// ============================================================================

/// Client facade and configuration.
///
/// Use [`Client::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for sessions and actions.
pub mod identifiers;

/// WebSocket protocol message types.
pub mod protocol;

/// Inbound frame dispatch.
///
/// Independent of the transport; can be fed synthetic frames.
pub mod router;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Client, ClientBuilder, WeakClient};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ActionId, SessionId};

// Routing types
pub use router::{Dispatched, Listener, Router};

// Transport types
pub use transport::{ConnectionState, ErrorCallback, ReconnectPolicy};
