//! Error types for signalbus.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! API misuse returns [`Result<T>`] which uses [`Error`]. Connection
//! lifecycle failures are never returned; their [`Display`](std::fmt::Display)
//! text is handed to the client's error callback instead.
//!
//! ```ignore
//! use signalbus::{Client, Result};
//!
//! fn example(client: &Client) -> Result<()> {
//!     client.send("run", serde_json::json!({ "steps": 10 }))?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`], [`Error::Url`] |
//! | Lifecycle | [`Error::OpenFailed`], [`Error::ReconnectExhausted`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Protocol`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned by the client builder when no endpoint can be resolved.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument passed to a client operation.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// URL parse error.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Socket settled in a non-open state.
    ///
    /// The text is shown to the user as-is, so it carries no detail.
    #[error("Connection could not be opened. Please reload to try again.")]
    OpenFailed,

    /// Reconnect attempts exceeded the policy cap.
    #[error("Connection closed. Please reload to reconnect.")]
    ReconnectExhausted {
        /// Number of consecutive closes that led here.
        attempts: u32,
    },

    /// The client event loop is no longer running.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Inbound frame did not match the envelope format.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error from a connect attempt or a socket write.
    ///
    /// Logged by the event loop; the error callback only sees
    /// [`Error::OpenFailed`].
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a reconnect exhausted error.
    #[inline]
    pub fn reconnect_exhausted(attempts: u32) -> Self {
        Self::ReconnectExhausted { attempts }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection lifecycle error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::OpenFailed
                | Self::ReconnectExhausted { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_argument("load must be an object");
        assert_eq!(err.to_string(), "Invalid argument: load must be an object");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("missing url");
        assert_eq!(err.to_string(), "Configuration error: missing url");
    }

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(
            Error::OpenFailed.to_string(),
            "Connection could not be opened. Please reload to try again."
        );
        assert_eq!(
            Error::reconnect_exhausted(4).to_string(),
            "Connection closed. Please reload to reconnect."
        );
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::OpenFailed.is_connection_error());
        assert!(Error::reconnect_exhausted(4).is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::config("test").is_connection_error());
        assert!(!Error::protocol("test").is_connection_error());
    }

    #[test]
    fn test_from_websocket_error() {
        let err: Error = WsError::ConnectionClosed.into();
        assert!(matches!(err, Error::WebSocket(_)));
        assert!(err.is_connection_error());
        assert!(err.to_string().starts_with("WebSocket error: "));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_from_url_error() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = url_err.into();
        assert!(matches!(err, Error::Url(_)));
    }
}
