//! Typed inbound frames.
//!
//! Control signals (`__connect`, `__action`) are split out of the envelope
//! stream here so the router never hands them to ordinary listeners.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::{Value, from_str, from_value};

use crate::error::{Error, Result};
use crate::identifiers::{ActionId, SessionId};

use super::Envelope;

// ============================================================================
// Constants
// ============================================================================

/// Connect acknowledgement signal.
pub const CONNECT_SIGNAL: &str = "__connect";

/// Action completion signal.
pub const ACTION_SIGNAL: &str = "__action";

/// Keyed data update signal.
pub const DATA_SIGNAL: &str = "data";

// ============================================================================
// Loads
// ============================================================================

#[derive(Deserialize)]
struct ConnectLoad {
    #[serde(alias = "session_id")]
    analysis_id: Option<SessionId>,
}

#[derive(Deserialize)]
struct ActionLoad {
    id: ActionId,
    #[serde(default)]
    status: Value,
}

// ============================================================================
// Frame
// ============================================================================

/// An inbound frame, classified by signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Connect acknowledgement carrying the (new) session id.
    Connect {
        /// Session assigned by the peer.
        session_id: Option<SessionId>,
    },

    /// Action progress notification.
    Action {
        /// Action being reported.
        id: ActionId,
        /// Status payload (`"start"`, `"end"`, or peer-defined).
        status: Value,
    },

    /// Application signal.
    Signal(Envelope),
}

impl Frame {
    /// Parses a raw text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not a JSON envelope
    /// - [`Error::Protocol`] if a control signal has a malformed load
    pub fn parse(text: &str) -> Result<Self> {
        let envelope: Envelope = from_str(text)?;
        Self::from_envelope(envelope)
    }

    /// Classifies an already decoded envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if a control signal has a malformed load.
    pub fn from_envelope(envelope: Envelope) -> Result<Self> {
        match envelope.signal.as_str() {
            CONNECT_SIGNAL => {
                let load: ConnectLoad = from_value(envelope.load)
                    .map_err(|e| Error::protocol(format!("invalid __connect load: {e}")))?;
                Ok(Self::Connect {
                    session_id: load.analysis_id,
                })
            }

            ACTION_SIGNAL => {
                let load: ActionLoad = from_value(envelope.load)
                    .map_err(|e| Error::protocol(format!("invalid __action load: {e}")))?;
                Ok(Self::Action {
                    id: load.id,
                    status: load.status,
                })
            }

            _ => Ok(Self::Signal(envelope)),
        }
    }

    /// Returns the signal name this frame arrived under.
    #[must_use]
    pub fn signal(&self) -> &str {
        match self {
            Self::Connect { .. } => CONNECT_SIGNAL,
            Self::Action { .. } => ACTION_SIGNAL,
            Self::Signal(envelope) => &envelope.signal,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
