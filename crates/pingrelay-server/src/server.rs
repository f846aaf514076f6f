//! `RelayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use pingrelay_core::{ConnectionId, SystemClock};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::metrics::WS_CONNECTIONS_REJECTED_TOTAL;
use crate::relay::RelayFacade;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::{SessionSettings, run_ws_session};

/// Errors starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Other listener I/O failure.
    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The relay every session feeds.
    pub relay: Arc<RelayFacade>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Per-connection settings.
    pub settings: SessionSettings,
    /// Connection cap.
    pub max_connections: usize,
    /// Max inbound WebSocket message size.
    pub max_message_size: usize,
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
    relay: Arc<RelayFacade>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl RelayServer {
    /// Create a server on the system clock.
    pub fn new(config: ServerConfig, metrics: Option<PrometheusHandle>) -> Self {
        let relay = RelayFacade::new(config.tags.clone(), Arc::new(SystemClock));
        Self::with_relay(config, relay, metrics)
    }

    /// Create a server around an existing relay.
    ///
    /// Observers registered on `relay` beforehand stay attached.
    pub fn with_relay(
        config: ServerConfig,
        relay: RelayFacade,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        if config.relay_messages {
            let _ = relay.enable_message_relay();
        }
        let drain_timeout = config.drain_timeout();
        Self {
            config,
            relay: Arc::new(relay),
            shutdown: Arc::new(ShutdownCoordinator::with_drain_timeout(
                drain_timeout,
            )),
            start_time: Instant::now(),
            metrics,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            relay: Arc::clone(&self.relay),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
            settings: SessionSettings::from_config(&self.config),
            max_connections: self.config.max_connections,
            max_message_size: self.config.max_message_size,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    /// Once the listener stops, open sessions are drained (each runs its
    /// disconnect path) before the relay sweeps whatever is left.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "pingrelay listening");

        let router = self.router();
        let token = self.shutdown.token();
        let shutdown = Arc::clone(&self.shutdown);
        let relay = Arc::clone(&self.relay);
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server error");
            }
            shutdown.shutdown();
            let _ = shutdown.drain_sessions().await;
            relay.shutdown();
            info!("listener stopped");
        });
        Ok((local_addr, handle))
    }

    /// The relay facade.
    pub fn relay(&self) -> &Arc<RelayFacade> {
        &self.relay
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        &state.relay,
        state.shutdown.is_shutting_down(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// GET /ws
async fn ws_handler(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let active = state.relay.hub().connection_count();
    if active >= state.max_connections {
        warn!(active, max = state.max_connections, "rejecting upgrade, server full");
        counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    let Some(guard) = state.shutdown.session_guard() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    };

    let relay = Arc::clone(&state.relay);
    let token = state.shutdown.token();
    let settings = state.settings;
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| async move {
            run_ws_session(socket, ConnectionId::new(), relay, settings, token).await;
            drop(guard);
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::test_support::connection;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    fn make_server() -> RelayServer {
        RelayServer::new(ServerConfig::default(), None)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn health_endpoint_reports_counts() {
        let server = make_server();
        let (conn, _rx) = connection("c1");
        let _ = server.relay().on_connect(&conn);
        let (status, body) = get_json(server.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 1);
        assert_eq!(body["sessions"], 1);
    }

    #[tokio::test]
    async fn health_reports_draining_after_shutdown() {
        let server = make_server();
        server.shutdown().shutdown();
        let (status, body) = get_json(server.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "draining");
    }

    #[tokio::test]
    async fn metrics_endpoint_without_recorder_is_404() {
        let (status, _) = get_json(make_server().router(), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_endpoint_with_handle_is_ok() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let server = RelayServer::new(ServerConfig::default(), Some(handle));
        let (status, _) = get_json(server.router(), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn ws_without_upgrade_headers_is_client_error() {
        let (status, _) = get_json(make_server().router(), "/ws").await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn ws_rejected_when_full() {
        let config = ServerConfig {
            max_connections: 1,
            ..ServerConfig::default()
        };
        let server = RelayServer::new(config, None);
        let (conn, _rx) = connection("c1");
        let _ = server.relay().on_connect(&conn);
        let (status, _) = get_json(server.router(), "/ws").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let (status, _) = get_json(make_server().router(), "/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn message_relay_follows_config() {
        let on = make_server();
        assert_eq!(
            on.relay().dispatcher().observer_count(crate::dispatcher::EventKind::Message),
            1
        );
        let off = RelayServer::new(
            ServerConfig {
                relay_messages: false,
                ..ServerConfig::default()
            },
            None,
        );
        assert_eq!(
            off.relay().dispatcher().observer_count(crate::dispatcher::EventKind::Message),
            0
        );
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port_and_stops() {
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..ServerConfig::default()
        };
        let server = RelayServer::new(config, None);
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        server.shutdown().graceful_shutdown(vec![handle], None).await;
        assert!(server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: taken.local_addr().unwrap().port(),
            ..ServerConfig::default()
        };
        let err = RelayServer::new(config, None).listen().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }
}
