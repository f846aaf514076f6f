//! Fan-out of tagged frames to connected WebSocket clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use pingrelay_core::Envelope;
use serde_json::Value;
use tracing::{debug, warn};

use super::connection::ClientConnection;

/// Maximum total lifetime drops before forcibly detaching a slow client.
pub const MAX_TOTAL_DROPS: u64 = 100;

/// Live outbound connection handles, indexed by connection ID.
pub struct ConnectionHub {
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
    /// Tracks the map size without taking the lock.
    active_count: AtomicUsize,
}

impl ConnectionHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Add a connection.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write();
        if conns
            .insert(connection.id.to_string(), connection)
            .is_none()
        {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a connection by ID. Returns whether it was present.
    pub fn remove(&self, connection_id: &str) -> bool {
        let mut conns = self.connections.write();
        let removed = conns.remove(connection_id).is_some();
        if removed {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Detach every connection.
    pub fn clear(&self) {
        let mut conns = self.connections.write();
        conns.clear();
        self.active_count.store(0, Ordering::Relaxed);
    }

    /// Number of active connections.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Send `payload` under `tag` to every connection except `except`.
    ///
    /// The frame is encoded once. Clients whose lifetime drops reach
    /// [`MAX_TOTAL_DROPS`] are detached from the hub. Returns the number of
    /// clients the frame was queued for.
    pub fn broadcast(&self, tag: &str, payload: Value, except: Option<&str>) -> usize {
        let frame = match Envelope::new(tag, payload).encode() {
            Ok(f) => Arc::new(f),
            Err(e) => {
                warn!(tag, error = %e, "failed to encode broadcast frame");
                return 0;
            }
        };
        let mut delivered = 0;
        let mut to_remove = Vec::new();
        {
            let conns = self.connections.read();
            for conn in conns.values() {
                if Some(conn.id.as_str()) == except {
                    continue;
                }
                if conn.send(Arc::clone(&frame)) {
                    delivered += 1;
                } else {
                    let drops = conn.drop_count();
                    if drops >= MAX_TOTAL_DROPS {
                        warn!(connection_id = %conn.id, drops, "detaching slow client");
                        to_remove.push(conn.id.to_string());
                    } else {
                        warn!(connection_id = %conn.id, total_drops = drops, "failed to queue frame (channel full)");
                    }
                }
            }
        }
        debug!(tag, delivered, "broadcast frame");
        for id in &to_remove {
            let _ = self.remove(id);
        }
        delivered
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}
