//! Server configuration.
//!
//! Loading flow:
//! 1. Start with compiled [`ServerConfig::default()`]
//! 2. If a JSON config file is given and exists, deep-merge it over defaults
//! 3. Apply `PINGRELAY_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::Path;
use std::time::Duration;

use pingrelay_core::Tags;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file from disk.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse JSON in the config file.
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A config value was invalid.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Configuration for the relay server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (default `3550`, `0` auto-assigns).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Interval between WebSocket-level Ping frames, in seconds.
    pub keepalive_interval_secs: u64,
    /// Disconnect a client silent for this long, in seconds.
    pub pong_timeout_secs: u64,
    /// Time open sessions get to close on shutdown, in seconds.
    pub drain_timeout_secs: u64,
    /// Interval between relay pings issued to each client, in ms. `0` disables.
    pub auto_ping_interval_ms: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound frame buffer per connection.
    pub send_buffer: usize,
    /// Forward every inbound message to all other clients.
    pub relay_messages: bool,
    /// Message tags, must match the client library.
    pub tags: Tags,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3550,
            max_connections: 1000,
            keepalive_interval_secs: 30,
            pong_timeout_secs: 60,
            drain_timeout_secs: 10,
            auto_ping_interval_ms: 2000,
            max_message_size: 1024 * 1024, // 1 MB
            send_buffer: 256,
            relay_messages: true,
            tags: Tags::default(),
            log_level: "info".into(),
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// WebSocket keepalive Ping interval.
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs.max(1))
    }

    /// Silence allowed before disconnecting.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs.max(1))
    }

    /// Session drain budget on shutdown. Zero skips the wait.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    /// Relay ping interval, `None` when disabled.
    pub fn auto_ping_interval(&self) -> Option<Duration> {
        (self.auto_ping_interval_ms > 0).then(|| Duration::from_millis(self.auto_ping_interval_ms))
    }

    /// Reject configurations the server can't run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tags.is_valid() {
            return Err(ConfigError::InvalidValue(
                "tags must be non-empty and distinct".into(),
            ));
        }
        if self.send_buffer == 0 {
            return Err(ConfigError::InvalidValue("send_buffer must be > 0".into()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "max_connections must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Load config from an optional JSON file with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let defaults = serde_json::to_value(ServerConfig::default())?;

    let merged = match path {
        Some(path) if path.exists() => {
            debug!(?path, "loading config from file");
            let content = std::fs::read_to_string(path)?;
            let user: Value = serde_json::from_str(&content)?;
            deep_merge(defaults, user)
        }
        Some(path) => {
            debug!(?path, "config file not found, using defaults");
            defaults
        }
        None => defaults,
    };

    let mut config: ServerConfig = serde_json::from_value(merged)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config.validate()?;
    Ok(config)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment overrides read through `lookup`.
///
/// Invalid values are ignored with a warning (file/default value stays).
pub fn apply_env_overrides(config: &mut ServerConfig, lookup: impl Fn(&str) -> Option<String>) {
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = string("PINGRELAY_HOST") {
        config.host = v;
    }
    if let Some(v) = string("PINGRELAY_PORT") {
        match parse_u16_range(&v, 0, 65535) {
            Some(port) => config.port = port,
            None => warn!(key = "PINGRELAY_PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = string("PINGRELAY_MAX_CONNECTIONS") {
        match parse_u64_range(&v, 1, 1_000_000) {
            Some(n) => config.max_connections = n as usize,
            None => warn!(key = "PINGRELAY_MAX_CONNECTIONS", value = %v, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = string("PINGRELAY_AUTO_PING_MS") {
        match parse_u64_range(&v, 0, 3_600_000) {
            Some(ms) => config.auto_ping_interval_ms = ms,
            None => warn!(key = "PINGRELAY_AUTO_PING_MS", value = %v, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = string("PINGRELAY_DRAIN_TIMEOUT_SECS") {
        match parse_u64_range(&v, 0, 600) {
            Some(secs) => config.drain_timeout_secs = secs,
            None => warn!(key = "PINGRELAY_DRAIN_TIMEOUT_SECS", value = %v, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = string("PINGRELAY_RELAY_MESSAGES") {
        match parse_bool(&v) {
            Some(b) => config.relay_messages = b,
            None => warn!(key = "PINGRELAY_RELAY_MESSAGES", value = %v, "invalid boolean env var, ignoring"),
        }
    }
    if let Some(v) = string("PINGRELAY_LOG_LEVEL") {
        config.log_level = v;
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
