//! Event observers.
//!
//! Maintains, per [`EventKind`], an ordered list of observer callbacks.
//! Observers run in registration order and are detached by the
//! [`SubscriptionId`] returned from [`EventDispatcher::subscribe`].

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use parking_lot::RwLock;
use pingrelay_core::Session;
use serde_json::Value;
use tracing::{debug, error};

use crate::metrics::RELAY_OBSERVER_PANICS_TOTAL;
use crate::websocket::connection::ClientConnection;

/// Kinds of relay events observers can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A client connected and its session was registered.
    Connect,
    /// A client is disconnecting; its session is still registered.
    Disconnect,
    /// A client sent an application message.
    Message,
    /// A client pinged us and was answered.
    Ping,
    /// A client answered one of our pings.
    PingReply,
}

impl EventKind {
    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Message => "message",
            Self::Ping => "ping",
            Self::PingReply => "ping_reply",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an observer is handed.
#[derive(Clone, Copy, Debug)]
pub struct RelayEvent<'a> {
    /// Which event fired.
    pub kind: EventKind,
    /// The connection it concerns.
    pub connection: &'a ClientConnection,
    /// The session state after the relay handled the event.
    pub session: Option<&'a Session>,
    /// The event payload (stamped for pings, raw otherwise).
    pub payload: Option<&'a Value>,
}

/// Observer callback.
pub type Observer = Arc<dyn Fn(&RelayEvent<'_>) + Send + Sync>;

/// Token identifying one subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Per-kind ordered observer lists.
pub struct EventDispatcher {
    next_id: AtomicU64,
    observers: RwLock<HashMap<EventKind, Vec<(SubscriptionId, Observer)>>>,
}

impl EventDispatcher {
    /// Create a dispatcher with no observers.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            observers: RwLock::new(HashMap::new()),
        }
    }

    /// Append an observer for `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, observer: F) -> SubscriptionId
    where
        F: Fn(&RelayEvent<'_>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(observer)));
        debug!(kind = %kind, subscription = id.0, "observer subscribed");
        id
    }

    /// Detach an observer. Returns `false` if the token is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        for list in observers.values_mut() {
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                let _ = list.remove(pos);
                debug!(subscription = id.0, "observer unsubscribed");
                return true;
            }
        }
        false
    }

    /// Subscribe to connects.
    pub fn on_connect<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&RelayEvent<'_>) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Connect, observer)
    }

    /// Subscribe to disconnects.
    pub fn on_disconnect<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&RelayEvent<'_>) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Disconnect, observer)
    }

    /// Subscribe to application messages.
    pub fn on_message<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&RelayEvent<'_>) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Message, observer)
    }

    /// Subscribe to inbound pings.
    pub fn on_ping<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&RelayEvent<'_>) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Ping, observer)
    }

    /// Subscribe to ping replies.
    pub fn on_ping_reply<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&RelayEvent<'_>) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::PingReply, observer)
    }

    /// Number of observers for `kind`.
    pub fn observer_count(&self, kind: EventKind) -> usize {
        self.observers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Invoke every observer of `event.kind` in registration order.
    ///
    /// The list is snapshotted first, so observers may subscribe or
    /// unsubscribe while running. A panicking observer is logged and the
    /// rest still run. Returns how many observers completed.
    pub fn dispatch(&self, event: &RelayEvent<'_>) -> usize {
        let snapshot: Vec<(SubscriptionId, Observer)> = self
            .observers
            .read()
            .get(&event.kind)
            .cloned()
            .unwrap_or_default();

        let mut completed = 0;
        for (id, observer) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| observer(event))).is_ok() {
                completed += 1;
            } else {
                error!(
                    kind = %event.kind,
                    subscription = id.0,
                    connection_id = %event.connection.id,
                    "observer panicked"
                );
                counter!(RELAY_OBSERVER_PANICS_TOTAL, "kind" => event.kind.as_str()).increment(1);
            }
        }
        completed
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total: usize = self.observers.read().values().map(Vec::len).sum();
        f.debug_struct("EventDispatcher")
            .field("observers", &total)
            .finish_non_exhaustive()
    }
}
