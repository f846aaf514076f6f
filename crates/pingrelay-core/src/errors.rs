//! Error types for the relay core.
//!
//! The relay absorbs bad input locally rather than raising it to the
//! transport, so these errors surface at construction seams
//! (`ConnectionId::parse`, envelope codec) and are turned into drops by the
//! callers.

use thiserror::Error;

/// Errors produced by the relay core.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A connection id was empty or not identifier-shaped.
    #[error("invalid connection id: {id:?}")]
    InvalidConnection {
        /// The rejected raw id.
        id: String,
    },

    /// A payload was missing or lacked a required field.
    #[error("invalid payload: {reason}")]
    InvalidPayload {
        /// What was wrong with it.
        reason: String,
    },

    /// Encoding an outbound envelope failed.
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),

    /// Decoding an inbound frame failed.
    #[error("failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),
}

impl RelayError {
    /// Short machine-readable label, used as a metrics/log reason.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidConnection { .. } => "invalid_connection",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::Encode(_) => "encode",
            Self::Decode(_) => "decode",
        }
    }
}

/// Result type for relay core operations.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_connection_display() {
        let err = RelayError::InvalidConnection { id: String::new() };
        assert_eq!(err.to_string(), "invalid connection id: \"\"");
    }

    #[test]
    fn invalid_payload_display() {
        let err = RelayError::InvalidPayload {
            reason: "missing pongTime".into(),
        };
        assert_eq!(err.to_string(), "invalid payload: missing pongTime");
    }

    #[test]
    fn decode_error_keeps_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = RelayError::Decode(json_err);
        assert!(err.to_string().starts_with("failed to decode frame"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn reasons_are_snake_case() {
        let errs = [
            RelayError::InvalidConnection { id: "1".into() },
            RelayError::InvalidPayload { reason: "x".into() },
        ];
        for err in errs {
            assert!(err.reason().chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
