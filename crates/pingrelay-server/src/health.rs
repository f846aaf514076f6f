//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

use crate::relay::RelayFacade;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while serving, `"draining"` once shutdown has begun.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current WebSocket connection count.
    pub connections: usize,
    /// Number of registered relay sessions.
    pub sessions: usize,
    /// Sessions that have answered at least one ping.
    pub measured_sessions: usize,
    /// Mean `latency_average` over measured sessions, rounded (ms).
    pub mean_latency_ms: Option<i64>,
}

/// Build a health response from the relay's live state.
pub fn health_check(start_time: Instant, relay: &RelayFacade, draining: bool) -> HealthResponse {
    let sessions = relay.sessions();
    let measured: Vec<i64> = sessions
        .iter()
        .filter(|s| s.ping_replies > 0)
        .map(|s| s.latency_average)
        .collect();
    let mean_latency_ms = (!measured.is_empty()).then(|| {
        let sum: i128 = measured.iter().copied().map(i128::from).sum();
        (sum as f64 / measured.len() as f64).round() as i64
    });
    HealthResponse {
        status: if draining { "draining" } else { "ok" },
        uptime_secs: start_time.elapsed().as_secs(),
        connections: relay.hub().connection_count(),
        sessions: sessions.len(),
        measured_sessions: measured.len(),
        mean_latency_ms,
    }
}
