//! Message routing.
//!
//! Demultiplexes inbound frames into the session slot, action listeners
//! and named signal listeners.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`Router`] and dispatch outcomes |
//! | `listeners` | Ordered listener tables |

// ============================================================================
// Submodules
// ============================================================================

/// Router and dispatch.
pub mod core;

/// Ordered listener tables.
pub(crate) mod listeners;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{Dispatched, Router};
pub use listeners::Listener;
