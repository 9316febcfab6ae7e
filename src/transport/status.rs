//! User-facing status reporting.
//!
//! The error callback is the only channel lifecycle failures travel
//! through. It gets `Some(message)` to show an error and `None` to clear it.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Error;
use crate::router::listeners::panic_message;

// ============================================================================
// Types
// ============================================================================

/// Error display callback type.
pub type ErrorCallback = Arc<dyn Fn(Option<&str>) + Send + Sync>;

// ============================================================================
// StatusReporter
// ============================================================================

/// Wraps the error callback with logging.
#[derive(Clone)]
pub(crate) struct StatusReporter {
    callback: ErrorCallback,
}

impl StatusReporter {
    /// Creates a reporter around `callback`.
    pub(crate) fn new(callback: ErrorCallback) -> Self {
        Self { callback }
    }

    /// Creates a reporter that only logs.
    pub(crate) fn silent() -> Self {
        Self::new(Arc::new(|_: Option<&str>| {}))
    }

    /// Shows `error` to the user.
    pub(crate) fn report(&self, error: &Error) {
        warn!(error = %error, "Connection status error");
        let message = error.to_string();
        self.notify(Some(&message));
    }

    /// Clears any error shown.
    pub(crate) fn clear(&self) {
        debug!("Connection status cleared");
        self.notify(None);
    }

    fn notify(&self, message: Option<&str>) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| (self.callback)(message))) {
            warn!(panic = panic_message(panic.as_ref()), "Error callback panicked");
        }
    }
}

impl fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusReporter").finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
