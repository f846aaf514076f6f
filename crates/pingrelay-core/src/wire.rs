//! Wire envelope and message tags.
//!
//! Every frame is a JSON text frame `{"type": <tag>, "data": <payload>}`.
//! The tag strings must match on both ends of the protocol; defaults match
//! the browser client library.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{RelayError, Result};

/// Default tag for opaque application messages.
pub const DEFAULT_MESSAGE_TAG: &str = "mjs_msg";
/// Default tag for ping requests.
pub const DEFAULT_PING_TAG: &str = "mjs_ping";
/// Default tag for ping replies.
pub const DEFAULT_PING_REPLY_TAG: &str = "mjs_ping_reply";

/// The three tags the relay listens on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tags {
    /// Application message tag.
    pub message: String,
    /// Ping request tag.
    pub ping: String,
    /// Ping reply tag.
    pub ping_reply: String,
}

impl Default for Tags {
    fn default() -> Self {
        Self {
            message: DEFAULT_MESSAGE_TAG.into(),
            ping: DEFAULT_PING_TAG.into(),
            ping_reply: DEFAULT_PING_REPLY_TAG.into(),
        }
    }
}

/// What an inbound tag means to the relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagKind {
    /// Application message.
    Message,
    /// Ping request.
    Ping,
    /// Ping reply.
    PingReply,
}

impl Tags {
    /// Classify a tag string. Unknown tags yield `None`.
    pub fn classify(&self, tag: &str) -> Option<TagKind> {
        if tag == self.message {
            Some(TagKind::Message)
        } else if tag == self.ping {
            Some(TagKind::Ping)
        } else if tag == self.ping_reply {
            Some(TagKind::PingReply)
        } else {
            None
        }
    }

    /// The tag string for a kind.
    pub fn tag(&self, kind: TagKind) -> &str {
        match kind {
            TagKind::Message => &self.message,
            TagKind::Ping => &self.ping,
            TagKind::PingReply => &self.ping_reply,
        }
    }

    /// Whether all three tags are non-empty and distinct.
    pub fn is_valid(&self) -> bool {
        let all = [&self.message, &self.ping, &self.ping_reply];
        all.iter().all(|t| !t.is_empty())
            && self.message != self.ping
            && self.message != self.ping_reply
            && self.ping != self.ping_reply
    }
}

/// One tagged frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event tag.
    #[serde(rename = "type")]
    pub tag: String,
    /// Payload, absent when the sender emitted no data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// Build an envelope carrying `data`.
    pub fn new(tag: impl Into<String>, data: Value) -> Self {
        Self {
            tag: tag.into(),
            data: Some(data),
        }
    }

    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(RelayError::Decode)
    }

    /// Encode to a text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(RelayError::Encode)
    }
}
