//! Per-connection latency and clock-offset state.

use std::collections::VecDeque;

use serde::Serialize;

use crate::ids::ConnectionId;
use crate::ping::PingReply;

/// Number of latency samples kept for smoothing.
pub const LATENCY_WINDOW_SIZE: usize = 10;

/// Bounded FIFO of latency samples (ms). The oldest sample is evicted when
/// a push would exceed the capacity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LatencyWindow {
    samples: VecDeque<i64>,
    capacity: usize,
}

impl LatencyWindow {
    /// Create an empty window holding at most `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a sample, evicting the oldest one if the window is full.
    pub fn push(&mut self, latency_ms: i64) {
        if self.samples.len() >= self.capacity {
            let _ = self.samples.pop_front();
        }
        self.samples.push_back(latency_ms);
    }

    /// Arithmetic mean of the current samples, rounded half-up.
    ///
    /// Returns `0` for an empty window.
    pub fn average(&self) -> i64 {
        if self.samples.is_empty() {
            return 0;
        }
        let sum: i128 = self.samples().map(i128::from).sum();
        let mean = sum as f64 / self.samples.len() as f64;
        (mean + 0.5).floor() as i64
    }

    /// Samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = i64> + '_ {
        self.samples.iter().copied()
    }

    /// Samples as a `Vec`, oldest first.
    pub fn to_vec(&self) -> Vec<i64> {
        self.samples().collect()
    }

    /// Number of samples held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::with_capacity(LATENCY_WINDOW_SIZE)
    }
}

impl Serialize for LatencyWindow {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.samples())
    }
}

/// Server-side record of one live connection's latency and clock state.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Connection this session belongs to.
    pub id: ConnectionId,
    /// Last measured full round trip (ms).
    pub round_trip_time: i64,
    /// Recent one-way latency samples (ms).
    pub latency_log: LatencyWindow,
    /// Rounded mean of `latency_log` (ms).
    pub latency_average: i64,
    /// Coarse one-shot offset estimate from the latest reply (ms). Kept
    /// fractional: half of an odd round trip lands on `.5`.
    pub instant_time_diff: f64,
    /// Smoothed estimate of this peer's clock offset from ours (ms).
    pub time_diff: i64,
    /// Epoch-ms of the most recent ping activity in either direction.
    pub last_ping_time: i64,
    /// Epoch-ms at which the session was registered.
    pub created_at: i64,
    /// Valid ping replies applied so far.
    pub ping_replies: u64,
}

impl Session {
    /// Create a fresh session for `id`, registered at `now_ms`.
    pub fn new(id: ConnectionId, now_ms: i64) -> Self {
        Self {
            id,
            round_trip_time: 0,
            latency_log: LatencyWindow::default(),
            latency_average: 0,
            instant_time_diff: 0.0,
            time_diff: 0,
            last_ping_time: 0,
            created_at: now_ms,
            ping_replies: 0,
        }
    }

    /// Record that the peer pinged us at `now_ms`.
    ///
    /// Latency state is untouched: the reply we send serves the peer's
    /// offset estimate, not ours.
    pub fn note_inbound_ping(&mut self, now_ms: i64) {
        self.last_ping_time = now_ms;
    }

    /// Apply a validated reply to a ping we issued, received at `now_ms`.
    ///
    /// Arithmetic saturates, so extreme timestamps clamp instead of
    /// overflowing. Returns the latency sample that was pushed into the window.
    pub fn apply_ping_reply(&mut self, reply: PingReply, now_ms: i64) -> i64 {
        self.round_trip_time = now_ms.saturating_sub(reply.ping_time).max(0);
        self.instant_time_diff =
            now_ms.saturating_sub(reply.pong_time) as f64 + self.round_trip_time as f64 / 2.0;

        let latency = self.round_trip_time.div_euclid(2);
        self.recalculate_time_diff(latency, reply.pong_time, now_ms);

        self.last_ping_time = now_ms;
        self.ping_replies += 1;
        latency
    }

    fn recalculate_time_diff(&mut self, latency: i64, pong_time: i64, now_ms: i64) {
        self.latency_log.push(latency);
        self.latency_average = self.latency_log.average();
        self.time_diff = now_ms.saturating_sub(pong_time.saturating_add(self.latency_average));
    }
}
