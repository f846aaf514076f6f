//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at server startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket connection lifetime seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Upgrades refused because the server was full (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Outbound frames dropped on a full or closed channel (counter).
pub const WS_SEND_DROPS_TOTAL: &str = "ws_send_drops_total";
/// Registered relay sessions (gauge).
pub const RELAY_SESSIONS_ACTIVE: &str = "relay_sessions_active";
/// Inbound events accepted, labelled by kind (counter).
pub const RELAY_EVENTS_TOTAL: &str = "relay_events_total";
/// Inbound events dropped, labelled by reason (counter).
pub const RELAY_EVENTS_DROPPED_TOTAL: &str = "relay_events_dropped_total";
/// Pings issued by the server (counter).
pub const RELAY_PINGS_SENT_TOTAL: &str = "relay_pings_sent_total";
/// Valid ping replies applied (counter).
pub const RELAY_PING_REPLIES_TOTAL: &str = "relay_ping_replies_total";
/// One-way latency samples in ms (histogram).
pub const RELAY_LATENCY_MS: &str = "relay_latency_ms";
/// Observers that panicked during dispatch (counter).
pub const RELAY_OBSERVER_PANICS_TOTAL: &str = "relay_observer_panics_total";
