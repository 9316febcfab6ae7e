//! WebSocket protocol message types.
//!
//! This module defines the JSON text frames exchanged with the peer.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Shape |
//! |---------|-----------|-------|
//! | [`Handshake`] | Local → Remote | `{"__connect": id, "__request_args": "?.."}` |
//! | [`Envelope`] | Both | `{"signal": name, "load": any}` |
//! | [`Frame::Connect`] | Remote → Local | `signal = "__connect"` |
//! | [`Frame::Action`] | Remote → Local | `signal = "__action"` |
//! | [`Frame::Signal`] | Remote → Local | any other signal |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Envelope and handshake types |
//! | `frame` | Typed inbound frames |

// ============================================================================
// Submodules
// ============================================================================

/// Envelope and handshake message types.
pub mod envelope;

/// Typed inbound frames.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{ACTION_ID_KEY, Envelope, Handshake};
pub use frame::{ACTION_SIGNAL, CONNECT_SIGNAL, DATA_SIGNAL, Frame};
