//! Envelope and handshake message types.
//!
//! Every frame except the handshake is wrapped in the same envelope.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, to_string};

use crate::error::Result;
use crate::identifiers::SessionId;

// ============================================================================
// Constants
// ============================================================================

/// Payload key the peer looks for to report action start/end.
pub const ACTION_ID_KEY: &str = "__action_id";

// ============================================================================
// Envelope
// ============================================================================

/// The `{signal, load}` wrapper around every signal frame.
///
/// # Format
///
/// ```json
/// { "signal": "run", "load": { "steps": 10 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Signal name.
    pub signal: String,

    /// Arbitrary payload. Missing loads decode as `null`.
    #[serde(default)]
    pub load: Value,
}

impl Envelope {
    /// Creates a new envelope.
    #[inline]
    #[must_use]
    pub fn new(signal: impl Into<String>, load: Value) -> Self {
        Self {
            signal: signal.into(),
            load,
        }
    }

    /// Serializes the envelope into a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_text(&self) -> Result<String> {
        Ok(to_string(self)?)
    }
}

// ============================================================================
// Handshake
// ============================================================================

/// First frame sent on every freshly opened socket.
///
/// The peer recognizes it by the `__connect` key, not by an envelope.
///
/// # Format
///
/// ```json
/// { "__connect": "abc123", "__request_args": "?data=x" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Handshake {
    /// Session to resume, `null` for a fresh one.
    #[serde(rename = "__connect")]
    pub session_id: Option<SessionId>,

    /// Query string forwarded to the peer.
    #[serde(rename = "__request_args", skip_serializing_if = "Option::is_none")]
    pub request_args: Option<String>,
}

impl Handshake {
    /// Creates a handshake for the given session.
    #[inline]
    #[must_use]
    pub fn new(session_id: Option<SessionId>, request_args: Option<String>) -> Self {
        Self {
            session_id,
            request_args,
        }
    }

    /// Serializes the handshake into a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_text(&self) -> Result<String> {
        Ok(to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
