//! WebSocket transport layer.
//!
//! This module owns the socket to the peer: opening it, watching it,
//! reconnecting with backoff, and pushing queued frames through it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Client (Rust)  │                              │  Peer           │
//! │                 │         WebSocket            │                 │
//! │  Connection     │◄────────────────────────────►│  /ws endpoint   │
//! │  → EventLoop    │     ws(s)://host/path/ws     │                 │
//! │  → Router       │                              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::connect` - Open a socket, arm the open watchdog
//! 2. On open - Reset backoff, clear status, send the handshake, flush the outbox
//! 3. Inbound frames - Routed through the [`Router`](crate::router::Router)
//! 4. On unexpected close - Retry after a growing delay, give up after the cap
//! 5. `Connection::disconnect` - Close without reconnecting
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backoff` | Reconnect policy and backoff state |
//! | `connection` | WebSocket connection and event loop |
//! | `endpoint` | Socket URL derivation and request args |
//! | `status` | Error callback reporting |

// ============================================================================
// Submodules
// ============================================================================

/// Reconnect policy and backoff state.
pub mod backoff;

/// WebSocket connection and event loop.
pub mod connection;

/// Socket URL derivation.
pub mod endpoint;

/// User-facing status reporting.
pub mod status;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::{Backoff, BackoffStep, ReconnectPolicy};
pub use connection::{Connection, ConnectionState};
pub use endpoint::{derive_ws_url, encode_request_args};
pub use status::ErrorCallback;
