//! Type-safe identifiers.
//!
//! Newtype wrappers keep session ids and action ids from being mixed up
//! with signal names or each other.
//!
//! | Type | Assigned by | Lifetime |
//! |------|-------------|----------|
//! | [`SessionId`] | Peer, via `__connect` | Survives reconnects |
//! | [`ActionId`] | Caller or [`ActionId::generate`] | One action |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// SessionId
// ============================================================================

/// Opaque identifier of the logical conversation with the peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session id from any string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// ActionId
// ============================================================================

/// Caller-chosen identifier of an action whose completion is reported
/// through `__action` frames.
///
/// Peers may echo numeric ids back as JSON numbers, so deserialization
/// accepts both strings and integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Creates an action id from any string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random action id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ActionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for ActionId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ActionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ActionIdVisitor;

        impl Visitor<'_> for ActionIdVisitor {
            type Value = ActionId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or numeric action id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ActionId, E> {
                Ok(ActionId::new(v))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<ActionId, E> {
                Ok(ActionId(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ActionId, E> {
                Ok(ActionId(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ActionId, E> {
                Ok(ActionId(v.to_string()))
            }

            // `3.0` keys the same listener as `3`.
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<ActionId, E> {
                if v.fract() == 0.0 && v.abs() < 1e21 {
                    let v = if v == 0.0 { 0.0 } else { v };
                    Ok(ActionId(format!("{v:.0}")))
                } else {
                    Ok(ActionId(v.to_string()))
                }
            }
        }

        deserializer.deserialize_any(ActionIdVisitor)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_transparent() {
        let id = SessionId::new("abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");

        let parsed: SessionId = serde_json::from_str("\"xyz\"").unwrap();
        assert_eq!(parsed.as_str(), "xyz");
    }

    #[test]
    fn test_action_id_from_number() {
        let id: ActionId = serde_json::from_str("42").unwrap();
        assert_eq!(id, ActionId::from(42u64));
        assert_eq!(id.as_str(), "42");
    }

    #[test]
    fn test_action_id_from_float() {
        let id: ActionId = serde_json::from_str("3.0").unwrap();
        assert_eq!(id, ActionId::from(3u64));

        let id: ActionId = serde_json::from_str("-0.0").unwrap();
        assert_eq!(id.as_str(), "0");

        let id: ActionId = serde_json::from_str("1.5").unwrap();
        assert_eq!(id.as_str(), "1.5");
    }

    #[test]
    fn test_action_id_from_string() {
        let id: ActionId = serde_json::from_str("\"run-1\"").unwrap();
        assert_eq!(id, ActionId::from("run-1"));
    }

    #[test]
    fn test_action_id_rejects_objects() {
        assert!(serde_json::from_str::<ActionId>("{}").is_err());
    }

    #[test]
    fn test_generated_action_ids_differ() {
        assert_ne!(ActionId::generate(), ActionId::generate());
    }
}
