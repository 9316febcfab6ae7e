//! Client facade and configuration.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Pub/sub handle over a reconnecting socket |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`WeakClient`] | Non-owning handle for use inside listeners |
//!
//! # Example
//!
//! ```no_run
//! use serde_json::Value;
//! use signalbus::{Client, Result};
//!
//! # async fn example() -> Result<()> {
//! let client = Client::builder()
//!     .url("ws://localhost:5000/parameters/ws")
//!     .build()?;
//!
//! client.on("log", |load: &Value| println!("{load}"));
//! client.send("run", ())?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Core client implementation.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{Client, WeakClient};
pub use builder::ClientBuilder;
