//! Server shutdown: one cancellation signal for the listener and every
//! WebSocket session, plus tracking of the live sessions so the relay is
//! only swept once each of them has run its disconnect path.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TaskTrackerToken;
use tracing::{info, warn};

/// Default time sessions get to finish their disconnect path.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Held by a running session; the drain waits until every guard is dropped.
pub type SessionGuard = TaskTrackerToken;

/// Cancellation plus session accounting for one server instance.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    sessions: TaskTracker,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    /// Coordinator with [`DEFAULT_DRAIN_TIMEOUT`].
    pub fn new() -> Self {
        Self::with_drain_timeout(DEFAULT_DRAIN_TIMEOUT)
    }

    /// Coordinator giving sessions `drain_timeout` to close after shutdown.
    pub fn with_drain_timeout(drain_timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            sessions: TaskTracker::new(),
            drain_timeout,
        }
    }

    /// A clone of the cancellation token sessions select on.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Signal every session and the listener to stop. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
        let _ = self.sessions.close();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Register a session about to start. `None` once shutdown has begun,
    /// so no new session can slip in behind the drain.
    pub fn session_guard(&self) -> Option<SessionGuard> {
        if self.is_shutting_down() {
            return None;
        }
        Some(self.sessions.token())
    }

    /// Sessions currently holding a guard.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Wait for every guarded session to finish, up to the drain timeout.
    ///
    /// Returns `false` if some sessions were still running at the deadline.
    pub async fn drain_sessions(&self) -> bool {
        let _ = self.sessions.close();
        let pending = self.sessions.len();
        if pending == 0 {
            return true;
        }
        info!(pending, timeout_secs = self.drain_timeout.as_secs(), "draining sessions");
        if tokio::time::timeout(self.drain_timeout, self.sessions.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = self.sessions.len(),
                "session drain timed out, sweeping leftovers"
            );
            return false;
        }
        true
    }

    /// Signal shutdown and wait up to `timeout` for `handles` (the serve
    /// task from [`RelayServer::listen`](crate::server::RelayServer::listen),
    /// which itself drains sessions before returning).
    pub async fn graceful_shutdown(&self, handles: Vec<JoinHandle<()>>, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(self.drain_timeout + Duration::from_secs(1));
        self.shutdown();
        info!(
            task_count = handles.len(),
            sessions = self.active_sessions(),
            "waiting for server tasks"
        );
        let drain = futures::future::join_all(handles);
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!("shutdown timed out after {timeout:?}, some tasks may still be running");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
