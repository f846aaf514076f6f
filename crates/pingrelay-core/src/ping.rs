//! Ping protocol payloads.
//!
//! Either side may initiate. A `ping` always gets an immediate reply stamped
//! with `pongTime`; a `ping-reply` to a ping we issued carries back our
//! `pingTime` together with the peer's `pongTime` and feeds
//! [`Session::apply_ping_reply`](crate::session::Session::apply_ping_reply).

use serde_json::{Map, Value};

use crate::errors::{RelayError, Result};

/// Field set by the ping issuer.
pub const PING_TIME_FIELD: &str = "pingTime";

/// Field stamped by the ping receiver.
pub const PONG_TIME_FIELD: &str = "pongTime";

/// Largest accepted timestamp magnitude (2^53 - 1, the JSON-safe integer range).
pub const MAX_TIMESTAMP_MS: i64 = 9_007_199_254_740_991;

/// The two timestamps of a completed ping exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PingReply {
    /// When we issued the ping (our clock, epoch-ms).
    pub ping_time: i64,
    /// When the peer received it (peer clock, epoch-ms).
    pub pong_time: i64,
}

impl PingReply {
    /// Extract both timestamps from a reply payload.
    ///
    /// Returns `None` if either field is missing, null, non-numeric or
    /// outside `±MAX_TIMESTAMP_MS`.
    pub fn parse(payload: &Value) -> Option<Self> {
        Self::try_parse(payload).ok()
    }

    /// Like [`PingReply::parse`] but says which field was wrong.
    pub fn try_parse(payload: &Value) -> Result<Self> {
        let ping_time = timestamp_field(payload, PING_TIME_FIELD)?;
        let pong_time = timestamp_field(payload, PONG_TIME_FIELD)?;
        Ok(Self {
            ping_time,
            pong_time,
        })
    }
}

fn timestamp_field(payload: &Value, field: &str) -> Result<i64> {
    payload
        .get(field)
        .and_then(read_timestamp)
        .ok_or_else(|| RelayError::InvalidPayload {
            reason: format!("missing, non-numeric or out-of-range {field}"),
        })
}

/// Read a JSON number as whole epoch-ms. Fractions are floored.
///
/// Values beyond `±MAX_TIMESTAMP_MS` are rejected so later arithmetic on
/// them cannot overflow.
pub fn read_timestamp(value: &Value) -> Option<i64> {
    if let Some(ms) = value.as_i64() {
        return (-MAX_TIMESTAMP_MS..=MAX_TIMESTAMP_MS).contains(&ms).then_some(ms);
    }
    let ms = value.as_f64()?.floor();
    let bound = MAX_TIMESTAMP_MS as f64;
    (ms.is_finite() && (-bound..=bound).contains(&ms)).then(|| ms as i64)
}

/// Build the payload for a ping we issue at `now_ms`.
pub fn ping_request(now_ms: i64) -> Value {
    let mut data = Map::new();
    let _ = data.insert(PING_TIME_FIELD.into(), Value::from(now_ms));
    Value::Object(data)
}

/// Stamp an inbound ping with `pongTime = now_ms`, producing the reply.
///
/// Object payloads keep all of their fields. Anything else is replaced by
/// an object carrying only `pongTime`.
pub fn stamp_pong(payload: Option<Value>, now_ms: i64) -> Value {
    let mut data = match payload {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    let _ = data.insert(PONG_TIME_FIELD.into(), Value::from(now_ms));
    Value::Object(data)
}
