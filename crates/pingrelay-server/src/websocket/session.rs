//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use pingrelay_core::ConnectionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use crate::config::ServerConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::relay::RelayFacade;

/// Per-connection timing and buffering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    /// Outbound frame buffer.
    pub send_buffer: usize,
    /// Interval between WebSocket-level Ping frames.
    pub keepalive_interval: Duration,
    /// Silence allowed before disconnecting.
    pub pong_timeout: Duration,
    /// Interval between relay pings, `None` when disabled.
    pub auto_ping_interval: Option<Duration>,
}

impl SessionSettings {
    /// Derive session settings from server config.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            send_buffer: config.send_buffer.max(1),
            keepalive_interval: config.keepalive_interval(),
            pong_timeout: config.pong_timeout(),
            auto_ping_interval: config.auto_ping_interval(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection with the relay (fires connect observers)
/// 2. Routes incoming text frames through [`RelayFacade::on_frame`]
/// 3. Forwards queued outbound frames and sends keepalive Ping frames
/// 4. Issues relay pings on the configured interval
/// 5. Fires disconnect observers and cleans up when the socket or server closes
#[instrument(skip_all, fields(connection_id = %connection_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    connection_id: ConnectionId,
    relay: Arc<RelayFacade>,
    settings: SessionSettings,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(settings.send_buffer);
    let connection = Arc::new(ClientConnection::new(connection_id, send_tx));

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    if !relay.on_connect(&connection).is_handled() {
        warn!("relay refused connection");
        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        return;
    }

    // Outbound forwarder with periodic keepalive Ping frames.
    let outbound_conn = Arc::clone(&connection);
    let mut outbound = tokio::spawn(async move {
        let mut keepalive = tokio::time::interval(settings.keepalive_interval);
        let _ = keepalive.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    let Some(frame) = frame else { break };
                    if ws_tx.send(Message::Text(String::clone(&frame).into())).await.is_err() {
                        break;
                    }
                }
                _ = keepalive.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_seen_elapsed() > settings.pong_timeout
                    {
                        warn!(timeout = ?settings.pong_timeout, "client unresponsive, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    let pinger = settings.auto_ping_interval.map(|period| {
        let relay = Arc::clone(&relay);
        let conn = Arc::clone(&connection);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            let _ = ticks.tick().await;
            loop {
                let _ = ticks.tick().await;
                if conn.is_closed() {
                    break;
                }
                if !relay.ping_socket(&conn) {
                    debug!("relay ping not queued");
                }
            }
        })
    });

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                let Some(Ok(msg)) = msg else { break };
                connection.mark_alive();
                match msg {
                    Message::Text(text) => {
                        let _ = relay.on_frame(&connection, text.as_str());
                    }
                    Message::Binary(data) => match std::str::from_utf8(&data) {
                        Ok(text) => {
                            let _ = relay.on_frame(&connection, text);
                        }
                        Err(_) => {
                            debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                        }
                    },
                    Message::Close(_) => {
                        info!("client sent close frame");
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            _ = &mut outbound => {
                debug!("outbound task finished");
                break;
            }
            () = shutdown.cancelled() => {
                info!("server shutting down, closing session");
                break;
            }
        }
    }

    let _ = relay.on_disconnect(&connection);
    info!(
        dropped_frames = connection.drop_count(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
    if let Some(pinger) = pinger {
        pinger.abort();
    }
    outbound.abort();
}
