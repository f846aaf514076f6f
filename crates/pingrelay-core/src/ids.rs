//! Branded connection identifier.
//!
//! Every live transport connection is keyed by a [`ConnectionId`], a newtype
//! over `String` so a connection key can't be confused with an arbitrary
//! string payload field. Fresh ids are UUID v7 (time-ordered) generated via
//! [`uuid::Uuid::now_v7`].

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::{RelayError, Result};

/// Unique identifier for one live client connection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create a new random ID (UUID v7, time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Validate and wrap an existing identifier.
    ///
    /// Rejects blank strings and strings that read as a number: connection
    /// ids are opaque identifiers, never numeric values.
    pub fn parse(raw: &str) -> Result<Self> {
        if is_identifier_shaped(raw) {
            Ok(Self(raw.to_owned()))
        } else {
            Err(RelayError::InvalidConnection {
                id: raw.to_owned(),
            })
        }
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume self and return the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Whether `raw` has the shape of a connection id.
pub fn is_identifier_shaped(raw: &str) -> bool {
    let trimmed = raw.trim();
    !trimmed.is_empty() && trimmed.parse::<f64>().is_err()
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for ConnectionId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ConnectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ConnectionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ConnectionId> for String {
    fn from(id: ConnectionId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn new_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn new_id_is_uuid_v7() {
        let id = ConnectionId::new();
        let parsed = Uuid::parse_str(id.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 7);
    }

    #[test]
    fn new_id_passes_validation() {
        let id = ConnectionId::new();
        assert!(ConnectionId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn parse_accepts_socket_style_ids() {
        let id = ConnectionId::parse("Xk3_9aQ-bbQ2AAAB").unwrap();
        assert_eq!(id.as_str(), "Xk3_9aQ-bbQ2AAAB");
    }

    #[test]
    fn parse_rejects_empty() {
        assert_matches!(
            ConnectionId::parse(""),
            Err(RelayError::InvalidConnection { .. })
        );
    }

    #[test]
    fn parse_rejects_blank() {
        assert!(ConnectionId::parse("   ").is_err());
    }

    #[test]
    fn parse_rejects_numeric() {
        assert!(ConnectionId::parse("42").is_err());
        assert!(ConnectionId::parse("3.5").is_err());
        assert!(ConnectionId::parse("-7").is_err());
    }

    #[test]
    fn display_and_deref() {
        let id = ConnectionId::parse("conn_a").unwrap();
        assert_eq!(format!("{id}"), "conn_a");
        assert_eq!(id.len(), 6);
    }

    #[test]
    fn serde_is_transparent() {
        let id = ConnectionId::parse("conn_a").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"conn_a\"");
        let back: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn into_inner_returns_string() {
        let id = ConnectionId::parse("conn_b").unwrap();
        assert_eq!(id.into_inner(), "conn_b");
    }
}
