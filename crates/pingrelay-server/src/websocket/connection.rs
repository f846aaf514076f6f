//! WebSocket client connection handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::counter;
use parking_lot::Mutex;
use pingrelay_core::{ConnectionId, Envelope};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

use crate::metrics::WS_SEND_DROPS_TOTAL;

/// Represents a connected WebSocket client.
///
/// Outbound frames go through a bounded channel to the connection's write
/// task; sending never blocks.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has shown activity since the last keepalive check.
    pub is_alive: AtomicBool,
    /// When the last Pong (or any activity) was received.
    last_seen: Mutex<Instant>,
    /// Count of frames dropped due to full channel.
    pub dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_seen: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Queue an already encoded text frame.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            counter!(WS_SEND_DROPS_TOTAL).increment(1);
            false
        }
    }

    /// Wrap `payload` in a `{type, data}` envelope under `tag` and queue it.
    pub fn emit(&self, tag: &str, payload: Value) -> bool {
        match Envelope::new(tag, payload).encode() {
            Ok(frame) => self.send(Arc::new(frame)),
            Err(e) => {
                warn!(connection_id = %self.id, tag, error = %e, "failed to encode frame");
                false
            }
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Whether the write side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Mark the connection as alive (pong or any frame received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_seen.lock() = Instant::now();
    }

    /// Duration since the last activity (or connection establishment).
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Check and reset the alive flag for keepalive.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("dropped_messages", &self.drop_count())
            .finish_non_exhaustive()
    }
}
