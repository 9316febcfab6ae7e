//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`Client`] instances.
//!
//! # Example
//!
//! ```no_run
//! use signalbus::Client;
//!
//! # async fn example() -> signalbus::Result<()> {
//! let client = Client::builder()
//!     .page_url("http://localhost:5000/parameters/index.html")
//!     .on_error(|message| {
//!         if let Some(message) = message {
//!             eprintln!("{message}");
//!         }
//!     })
//!     .request_arg("data", "requestargtest")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::transport::backoff::ReconnectPolicy;
use crate::transport::endpoint::{derive_ws_url, encode_request_args};
use crate::transport::status::ErrorCallback;

use super::core::Client;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Clone)]
pub struct ClientBuilder {
    /// Explicit socket URL.
    url: Option<String>,
    /// Page URL the socket URL is derived from.
    page_url: Option<String>,
    /// Session to resume.
    session_id: Option<SessionId>,
    /// Error display callback.
    on_error: Option<ErrorCallback>,
    /// Reconnect timing.
    policy: ReconnectPolicy,
    /// Request args sent with the handshake.
    request_args: Vec<(String, String)>,
    /// Whether `build` opens the socket.
    auto_connect: bool,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            url: None,
            page_url: None,
            session_id: None,
            on_error: None,
            policy: ReconnectPolicy::default(),
            request_args: Vec::new(),
            auto_connect: true,
        }
    }
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the socket URL.
    ///
    /// The URL is not validated here. A bad URL surfaces through the error
    /// callback once the first connect attempt fails.
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the page URL to derive the socket URL from.
    ///
    /// Ignored when [`url`](Self::url) is also set.
    #[inline]
    #[must_use]
    pub fn page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = Some(page_url.into());
        self
    }

    /// Resumes an existing session.
    #[inline]
    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the error display callback.
    ///
    /// Called with `Some(message)` to show an error and `None` to clear it.
    #[inline]
    #[must_use]
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<&str>) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Sets the reconnect timing.
    #[inline]
    #[must_use]
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Adds a request arg sent with every handshake.
    #[inline]
    #[must_use]
    pub fn request_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_args.push((key.into(), value.into()));
        self
    }

    /// Sets whether [`build`](Self::build) opens the socket. Defaults to `true`.
    #[inline]
    #[must_use]
    pub fn auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Builds the client and spawns its event loop.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if neither URL nor page URL is set
    /// - [`Error::Config`] if called outside a Tokio runtime
    /// - [`Error::Config`] or [`Error::Url`] if the page URL cannot be
    ///   turned into a socket URL
    pub fn build(self) -> Result<Client> {
        let url = self.resolve_url()?;

        Handle::try_current().map_err(|_| {
            Error::config("ClientBuilder::build must be called within a Tokio runtime")
        })?;

        let request_args = encode_request_args(&self.request_args);

        Client::spawn(
            url,
            self.session_id,
            self.on_error,
            self.policy,
            request_args,
            self.auto_connect,
        )
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Resolves the socket URL.
    fn resolve_url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let page_url = self.page_url.as_deref().ok_or_else(|| {
            Error::config(
                "Socket URL is required. Use .url() or .page_url() to set it.\n\
                 Example: Client::builder().url(\"ws://localhost:5000/ws\")",
            )
        })?;

        derive_ws_url(page_url)
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("url", &self.url)
            .field("page_url", &self.page_url)
            .field("session_id", &self.session_id)
            .field("on_error", &self.on_error.is_some())
            .field("policy", &self.policy)
            .field("request_args", &self.request_args)
            .field("auto_connect", &self.auto_connect)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
