//! Live session registry.
//!
//! Owns one [`Session`] per live connection, keyed by [`ConnectionId`]. The
//! map is the only structure touched concurrently by different connections'
//! handlers, so it is a sharded `DashMap`. A registry is an explicit object
//! constructed with the server and torn down with it; independent registries
//! never share state.

use std::sync::Arc;

use dashmap::DashMap;
use metrics::gauge;
use pingrelay_core::ids::is_identifier_shaped;
use pingrelay_core::{Clock, ConnectionId, RelayError, Session, SystemClock};
use tracing::{debug, warn};

use crate::metrics::RELAY_SESSIONS_ACTIVE;

/// Registry of live sessions.
pub struct SessionRegistry {
    sessions: DashMap<ConnectionId, Session>,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    /// Create an empty registry stamping sessions with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            clock,
        }
    }

    /// Register a new session for `connection_id` and return a snapshot.
    ///
    /// Fails with [`RelayError::InvalidConnection`] for blank or
    /// non-identifier ids. Adding an id that is already live replaces the
    /// old entry; callers remove first.
    pub fn add_session(&self, connection_id: &str) -> Result<Session, RelayError> {
        let id = ConnectionId::parse(connection_id)?;
        let session = Session::new(id.clone(), self.clock.now_ms());
        if self.sessions.insert(id, session.clone()).is_some() {
            warn!(connection_id, "session replaced an existing entry");
        } else {
            gauge!(RELAY_SESSIONS_ACTIVE).increment(1.0);
        }
        debug!(connection_id, "session added");
        Ok(session)
    }

    /// Remove the session for `connection_id`.
    ///
    /// Returns `false` if nothing was registered under that id.
    pub fn remove_session(&self, connection_id: &str) -> bool {
        let removed = self.sessions.remove(connection_id).is_some();
        if removed {
            gauge!(RELAY_SESSIONS_ACTIVE).decrement(1.0);
            debug!(connection_id, "session removed");
        }
        removed
    }

    /// Snapshot of the session for `connection_id`, if live.
    pub fn find_session(&self, connection_id: &str) -> Option<Session> {
        if !is_identifier_shaped(connection_id) {
            return None;
        }
        self.sessions.get(connection_id).map(|s| s.value().clone())
    }

    /// Mutate the session for `connection_id` in place.
    ///
    /// Returns `None` without calling `f` if the session isn't live.
    pub fn update_session<R>(
        &self,
        connection_id: &str,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        if !is_identifier_shaped(connection_id) {
            return None;
        }
        self.sessions
            .get_mut(connection_id)
            .map(|mut entry| f(entry.value_mut()))
    }

    /// Whether a session is live for `connection_id`.
    pub fn contains(&self, connection_id: &str) -> bool {
        self.sessions.contains_key(connection_id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of all live sessions, in no particular order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Snapshots of all live sessions, in no particular order.
    pub fn snapshot(&self) -> Vec<Session> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }

    /// Drop every session. Used at shutdown.
    pub fn clear(&self) {
        let count = self.sessions.len();
        self.sessions.clear();
        gauge!(RELAY_SESSIONS_ACTIVE).decrement(count as f64);
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}
