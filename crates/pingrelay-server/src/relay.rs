//! `RelayFacade`: the entry point transport events flow through.
//!
//! Wires connection lifecycle and inbound frames to the [`SessionRegistry`],
//! the ping protocol and the [`EventDispatcher`]. Nothing here returns an
//! error to the transport: malformed input and events for sessions that are
//! already gone are dropped, logged and counted.

use std::sync::Arc;

use metrics::{counter, histogram};
use pingrelay_core::ping::{self, PingReply};
use pingrelay_core::{Clock, Envelope, Session, SystemClock, TagKind, Tags};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dispatcher::{EventDispatcher, EventKind, RelayEvent};
use crate::metrics::{
    RELAY_EVENTS_DROPPED_TOTAL, RELAY_EVENTS_TOTAL, RELAY_LATENCY_MS, RELAY_PING_REPLIES_TOTAL,
    RELAY_PINGS_SENT_TOTAL,
};
use crate::registry::SessionRegistry;
use crate::websocket::connection::ClientConnection;
use crate::websocket::hub::ConnectionHub;

/// Why an inbound event was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The connection id was not identifier-shaped.
    InvalidConnection,
    /// No session is registered for the connection.
    MissingSession,
    /// The payload was absent where one is required.
    MissingPayload,
    /// A ping reply lacked valid timestamps.
    InvalidPingReply,
    /// The frame was not a valid envelope.
    UndecodableFrame,
    /// The envelope tag is not one the relay listens on.
    UnknownTag,
}

impl DropReason {
    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidConnection => "invalid_connection",
            Self::MissingSession => "missing_session",
            Self::MissingPayload => "missing_payload",
            Self::InvalidPingReply => "invalid_ping_reply",
            Self::UndecodableFrame => "undecodable_frame",
            Self::UnknownTag => "unknown_tag",
        }
    }
}

/// What happened to one inbound event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Handled; this many observers ran.
    Handled(usize),
    /// Dropped without touching state.
    Dropped(DropReason),
}

impl Outcome {
    /// Whether the event was handled.
    pub fn is_handled(self) -> bool {
        matches!(self, Self::Handled(_))
    }
}

/// Public relay surface over registry, ping protocol and observers.
pub struct RelayFacade {
    registry: SessionRegistry,
    dispatcher: EventDispatcher,
    hub: Arc<ConnectionHub>,
    clock: Arc<dyn Clock>,
    tags: Tags,
}

impl RelayFacade {
    /// Create a relay reading time from `clock`.
    pub fn new(tags: Tags, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: SessionRegistry::new(Arc::clone(&clock)),
            dispatcher: EventDispatcher::new(),
            hub: Arc::new(ConnectionHub::new()),
            clock,
            tags,
        }
    }

    /// Create a relay on the system clock.
    pub fn with_system_clock(tags: Tags) -> Self {
        Self::new(tags, Arc::new(SystemClock))
    }

    /// The session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The observer dispatcher; register application logic here.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// The live connection hub.
    pub fn hub(&self) -> &Arc<ConnectionHub> {
        &self.hub
    }

    /// The message tags in use.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Snapshot of one session.
    pub fn session(&self, connection_id: &str) -> Option<Session> {
        self.registry.find_session(connection_id)
    }

    /// Snapshots of all live sessions.
    pub fn sessions(&self) -> Vec<Session> {
        self.registry.snapshot()
    }

    /// A client connected: register its session, then fire connect observers.
    pub fn on_connect(&self, connection: &Arc<ClientConnection>) -> Outcome {
        let session = match self.registry.add_session(connection.id.as_str()) {
            Ok(session) => session,
            Err(e) => {
                warn!(connection_id = %connection.id, error = %e, "rejecting connection");
                return dropped(connection, EventKind::Connect, DropReason::InvalidConnection);
            }
        };
        self.hub.add(Arc::clone(connection));
        info!(connection_id = %connection.id, "session registered");
        self.fire(EventKind::Connect, connection, Some(&session), None)
    }

    /// A client is leaving: fire disconnect observers while its session is
    /// still readable, then remove it.
    pub fn on_disconnect(&self, connection: &ClientConnection) -> Outcome {
        let id = connection.id.as_str();
        let Some(session) = self.registry.find_session(id) else {
            let _ = self.hub.remove(id);
            return dropped(connection, EventKind::Disconnect, DropReason::MissingSession);
        };
        let outcome = self.fire(EventKind::Disconnect, connection, Some(&session), None);
        let _ = self.registry.remove_session(id);
        let _ = self.hub.remove(id);
        info!(
            connection_id = id,
            latency_average = session.latency_average,
            time_diff = session.time_diff,
            "session removed"
        );
        outcome
    }

    /// Application message: pass the raw payload to message observers.
    pub fn on_message(&self, connection: &ClientConnection, payload: Option<Value>) -> Outcome {
        let Some(payload) = payload.filter(|p| !p.is_null()) else {
            return dropped(connection, EventKind::Message, DropReason::MissingPayload);
        };
        let Some(session) = self.registry.find_session(connection.id.as_str()) else {
            return dropped(connection, EventKind::Message, DropReason::MissingSession);
        };
        self.fire(EventKind::Message, connection, Some(&session), Some(&payload))
    }

    /// The peer sent a ping: stamp `pongTime`, reply on the reply tag and
    /// note the activity. Latency state is left alone.
    pub fn on_ping(&self, connection: &ClientConnection, payload: Option<Value>) -> Outcome {
        let now = self.clock.now_ms();
        let Some(session) = self
            .registry
            .update_session(connection.id.as_str(), |s| {
                s.note_inbound_ping(now);
                s.clone()
            })
        else {
            return dropped(connection, EventKind::Ping, DropReason::MissingSession);
        };
        let reply = ping::stamp_pong(payload, now);
        if !connection.emit(&self.tags.ping_reply, reply.clone()) {
            debug!(connection_id = %connection.id, "ping reply not queued");
        }
        self.fire(EventKind::Ping, connection, Some(&session), Some(&reply))
    }

    /// The peer answered one of our pings: update RTT, latency window and
    /// clock offset, then fire ping-reply observers.
    pub fn on_ping_reply(&self, connection: &ClientConnection, payload: Option<Value>) -> Outcome {
        let id = connection.id.as_str();
        if !self.registry.contains(id) {
            return dropped(connection, EventKind::PingReply, DropReason::MissingSession);
        }
        let Some(payload) = payload else {
            return dropped(connection, EventKind::PingReply, DropReason::MissingPayload);
        };
        let reply = match PingReply::try_parse(&payload) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(connection_id = id, error = %e, "malformed ping reply");
                return dropped(connection, EventKind::PingReply, DropReason::InvalidPingReply);
            }
        };

        let now = self.clock.now_ms();
        let Some((latency, session)) = self.registry.update_session(id, |s| {
            let latency = s.apply_ping_reply(reply, now);
            (latency, s.clone())
        }) else {
            return dropped(connection, EventKind::PingReply, DropReason::MissingSession);
        };

        counter!(RELAY_PING_REPLIES_TOTAL).increment(1);
        histogram!(RELAY_LATENCY_MS).record(latency as f64);
        debug!(
            connection_id = id,
            round_trip_time = session.round_trip_time,
            latency,
            latency_average = session.latency_average,
            time_diff = session.time_diff,
            "ping reply applied"
        );
        self.fire(EventKind::PingReply, connection, Some(&session), Some(&payload))
    }

    /// Decode one inbound text frame and route it by tag.
    pub fn on_frame(&self, connection: &ClientConnection, text: &str) -> Outcome {
        let envelope = match Envelope::decode(text) {
            Ok(env) => env,
            Err(e) => {
                warn!(connection_id = %connection.id, error = %e, "undecodable frame");
                return dropped_frame(connection, DropReason::UndecodableFrame);
            }
        };
        match self.tags.classify(&envelope.tag) {
            Some(TagKind::Message) => self.on_message(connection, envelope.data),
            Some(TagKind::Ping) => self.on_ping(connection, envelope.data),
            Some(TagKind::PingReply) => self.on_ping_reply(connection, envelope.data),
            None => {
                debug!(connection_id = %connection.id, tag = %envelope.tag, "unknown tag");
                dropped_frame(connection, DropReason::UnknownTag)
            }
        }
    }

    /// Send an application message to one client.
    pub fn send_message(&self, connection: &ClientConnection, payload: Value) -> bool {
        connection.emit(&self.tags.message, payload)
    }

    /// Send an application message to every client except `except`.
    pub fn broadcast_message(&self, payload: Value, except: Option<&str>) -> usize {
        self.hub.broadcast(&self.tags.message, payload, except)
    }

    /// Issue a ping stamped with `pingTime = now`. The reply, if any,
    /// arrives later through [`RelayFacade::on_ping_reply`].
    pub fn ping_socket(&self, connection: &ClientConnection) -> bool {
        let request = ping::ping_request(self.clock.now_ms());
        let queued = connection.emit(&self.tags.ping, request);
        if queued {
            counter!(RELAY_PINGS_SENT_TOTAL).increment(1);
        }
        queued
    }

    /// Forward every inbound message to all other clients.
    ///
    /// Installed as a message observer; the hub is held weakly so the
    /// observer never keeps a torn-down relay's connections alive.
    pub fn enable_message_relay(&self) -> crate::dispatcher::SubscriptionId {
        let hub = Arc::downgrade(&self.hub);
        let tag = self.tags.message.clone();
        self.dispatcher.on_message(move |event| {
            if let (Some(hub), Some(payload)) = (hub.upgrade(), event.payload) {
                let _ = hub.broadcast(&tag, payload.clone(), Some(event.connection.id.as_str()));
            }
        })
    }

    /// Drop all sessions and connections. Used at shutdown.
    pub fn shutdown(&self) {
        let sessions = self.registry.len();
        self.registry.clear();
        self.hub.clear();
        info!(sessions, "relay torn down");
    }

    fn fire(
        &self,
        kind: EventKind,
        connection: &ClientConnection,
        session: Option<&Session>,
        payload: Option<&Value>,
    ) -> Outcome {
        counter!(RELAY_EVENTS_TOTAL, "kind" => kind.as_str()).increment(1);
        let event = RelayEvent {
            kind,
            connection,
            session,
            payload,
        };
        Outcome::Handled(self.dispatcher.dispatch(&event))
    }
}

fn dropped(connection: &ClientConnection, kind: EventKind, reason: DropReason) -> Outcome {
    debug!(connection_id = %connection.id, kind = %kind, reason = reason.as_str(), "event dropped");
    counter!(RELAY_EVENTS_DROPPED_TOTAL, "reason" => reason.as_str()).increment(1);
    Outcome::Dropped(reason)
}

fn dropped_frame(connection: &ClientConnection, reason: DropReason) -> Outcome {
    debug!(connection_id = %connection.id, reason = reason.as_str(), "frame dropped");
    counter!(RELAY_EVENTS_DROPPED_TOTAL, "reason" => reason.as_str()).increment(1);
    Outcome::Dropped(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::connection::test_support::{connection, drain};
    use parking_lot::Mutex;
    use pingrelay_core::ManualClock;
    use serde_json::json;

    fn relay_at(now: i64) -> (RelayFacade, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let relay = RelayFacade::new(Tags::default(), Arc::clone(&clock) as Arc<dyn Clock>);
        (relay, clock)
    }

    #[test]
    fn connect_registers_before_observers_run() {
        let (relay, _clock) = relay_at(0);
        let relay = Arc::new(relay);
        let seen = Arc::new(Mutex::new(None));
        {
            let weak = Arc::downgrade(&relay);
            let seen = Arc::clone(&seen);
            let _ = relay.dispatcher().on_connect(move |e| {
                let live = weak
                    .upgrade()
                    .and_then(|r| r.session(e.connection.id.as_str()))
                    .is_some();
                *seen.lock() = Some(live);
            });
        }
        let (conn, _rx) = connection("c1");
        assert_eq!(relay.on_connect(&conn), Outcome::Handled(1));
        assert_eq!(*seen.lock(), Some(true));
        assert_eq!(relay.hub().connection_count(), 1);
    }

    #[test]
    fn disconnect_observers_see_final_state_then_session_is_gone() {
        let (relay, clock) = relay_at(1000);
        let (conn, _rx) = connection("c1");
        let _ = relay.on_connect(&conn);
        clock.set(1100);
        let _ = relay.on_ping_reply(&conn, Some(json!({"pingTime": 1000, "pongTime": 1050})));

        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        let _ = relay
            .dispatcher()
            .on_disconnect(move |e| *s.lock() = e.session.map(|s| s.latency_average));
        assert!(relay.on_disconnect(&conn).is_handled());
        assert_eq!(*seen.lock(), Some(50));
        assert!(relay.session("c1").is_none());
        assert_eq!(relay.hub().connection_count(), 0);
    }

    #[test]
    fn disconnect_of_unknown_connection_is_noop() {
        let (relay, _clock) = relay_at(0);
        let (conn, _rx) = connection("ghost");
        assert_eq!(
            relay.on_disconnect(&conn),
            Outcome::Dropped(DropReason::MissingSession)
        );
        assert!(!relay.registry().remove_session("ghost"));
    }

    #[test]
    fn ping_reply_scenario() {
        let (relay, clock) = relay_at(1000);
        let (conn, mut rx) = connection("c1");
        let _ = relay.on_connect(&conn);
        assert!(relay.ping_socket(&conn));
        let sent = drain(&mut rx);
        assert_eq!(sent[0].tag, "mjs_ping");
        assert_eq!(sent[0].data, Some(json!({"pingTime": 1000})));

        clock.set(1100);
        let outcome = relay.on_ping_reply(&conn, Some(json!({"pingTime": 1000, "pongTime": 1050})));
        assert!(outcome.is_handled());
        let s = relay.session("c1").unwrap();
        assert_eq!(s.round_trip_time, 100);
        assert_eq!(s.latency_log.to_vec(), vec![50]);
        assert_eq!(s.latency_average, 50);
        assert_eq!(s.time_diff, 0);
        assert_eq!(s.last_ping_time, 1100);
    }

    #[test]
    fn two_replies_average_to_sixty() {
        let (relay, clock) = relay_at(1000);
        let (conn, _rx) = connection("c1");
        let _ = relay.on_connect(&conn);
        clock.set(1100);
        let _ = relay.on_ping_reply(&conn, Some(json!({"pingTime": 1000, "pongTime": 1050})));
        clock.set(2140);
        let _ = relay.on_ping_reply(&conn, Some(json!({"pingTime": 2000, "pongTime": 2070})));
        assert_eq!(relay.session("c1").unwrap().latency_average, 60);
    }

    #[test]
    fn reply_missing_pong_time_leaves_state_unchanged() {
        let (relay, clock) = relay_at(1000);
        let (conn, _rx) = connection("c1");
        let _ = relay.on_connect(&conn);
        clock.set(1100);
        let _ = relay.on_ping_reply(&conn, Some(json!({"pingTime": 1000, "pongTime": 1050})));
        let before = relay.session("c1").unwrap();

        let fired = Arc::new(Mutex::new(0));
        let f = Arc::clone(&fired);
        let _ = relay.dispatcher().on_ping_reply(move |_| *f.lock() += 1);

        clock.set(3000);
        for bad in [
            json!({"pingTime": 2000}),
            json!({"pingTime": 2000, "pongTime": null}),
            json!({"pingTime": "x", "pongTime": 2500}),
            json!(null),
        ] {
            assert_eq!(
                relay.on_ping_reply(&conn, Some(bad)),
                Outcome::Dropped(DropReason::InvalidPingReply)
            );
        }
        assert_eq!(
            relay.on_ping_reply(&conn, None),
            Outcome::Dropped(DropReason::MissingPayload)
        );
        let after = relay.session("c1").unwrap();
        assert_eq!(after.round_trip_time, before.round_trip_time);
        assert_eq!(after.latency_log, before.latency_log);
        assert_eq!(after.latency_average, before.latency_average);
        assert_eq!(after.time_diff, before.time_diff);
        assert_eq!(after.last_ping_time, before.last_ping_time);
        assert_eq!(*fired.lock(), 0);
    }

    #[test]
    fn out_of_range_timestamps_are_rejected_without_mutation() {
        let (relay, clock) = relay_at(1000);
        let (conn, _rx) = connection("c1");
        let _ = relay.on_connect(&conn);
        clock.set(1100);
        let _ = relay.on_ping_reply(&conn, Some(json!({"pingTime": 1000, "pongTime": 1050})));
        let before = relay.session("c1").unwrap();

        clock.set(5000);
        for extreme in [
            json!({"pingTime": 0, "pongTime": i64::MAX}),
            json!({"pingTime": -1e300, "pongTime": 0}),
            json!({"pingTime": i64::MIN, "pongTime": i64::MIN}),
        ] {
            assert_eq!(
                relay.on_ping_reply(&conn, Some(extreme)),
                Outcome::Dropped(DropReason::InvalidPingReply)
            );
        }
        let after = relay.session("c1").unwrap();
        assert_eq!(after.latency_log, before.latency_log);
        assert_eq!(after.round_trip_time, before.round_trip_time);
        assert_eq!(after.time_diff, before.time_diff);
        assert_eq!(after.ping_replies, 1);

        let frame = r#"{"type":"mjs_ping_reply","data":{"pingTime":0,"pongTime":9223372036854775807}}"#;
        assert_eq!(
            relay.on_frame(&conn, frame),
            Outcome::Dropped(DropReason::InvalidPingReply)
        );
        assert!(relay.session("c1").is_some());
    }

    #[test]
    fn eleven_replies_keep_ten_samples() {
        let (relay, clock) = relay_at(0);
        let (conn, _rx) = connection("c1");
        let _ = relay.on_connect(&conn);
        for i in 1..=11 {
            let ping_time = i * 10_000;
            clock.set(ping_time + 2 * i);
            let _ = relay.on_ping_reply(
                &conn,
                Some(json!({"pingTime": ping_time, "pongTime": ping_time})),
            );
        }
        let s = relay.session("c1").unwrap();
        assert_eq!(s.latency_log.len(), 10);
        assert_eq!(s.latency_log.to_vec(), (2..=11).collect::<Vec<i64>>());
    }

    #[test]
    fn late_reply_after_disconnect_is_noop() {
        let (relay, _clock) = relay_at(0);
        let (conn, _rx) = connection("c1");
        let _ = relay.on_connect(&conn);
        let _ = relay.on_disconnect(&conn);
        assert_eq!(
            relay.on_ping_reply(&conn, Some(json!({"pingTime": 0, "pongTime": 0}))),
            Outcome::Dropped(DropReason::MissingSession)
        );
        assert!(relay.session("c1").is_none());
    }

    #[test]
    fn inbound_ping_is_answered_with_pong_time() {
        let (relay, clock) = relay_at(0);
        let (conn, mut rx) = connection("c1");
        let _ = relay.on_connect(&conn);
        clock.set(2000);

        let observed = Arc::new(Mutex::new(None));
        let o = Arc::clone(&observed);
        let _ = relay.dispatcher().on_ping(move |e| *o.lock() = e.payload.cloned());

        assert!(relay.on_ping(&conn, Some(json!({}))).is_handled());
        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].tag, "mjs_ping_reply");
        assert_eq!(frames[0].data, Some(json!({"pongTime": 2000})));
        assert_eq!(*observed.lock(), Some(json!({"pongTime": 2000})));

        let s = relay.session("c1").unwrap();
        assert_eq!(s.last_ping_time, 2000);
        assert!(s.latency_log.is_empty());
        assert_eq!(s.ping_replies, 0);
    }

    #[test]
    fn inbound_ping_preserves_fields() {
        let (relay, clock) = relay_at(0);
        let (conn, mut rx) = connection("c1");
        let _ = relay.on_connect(&conn);
        clock.set(2000);
        let _ = relay.on_ping(&conn, Some(json!({"pingTime": 1990, "nonce": "abc"})));
        assert_eq!(
            drain(&mut rx)[0].data,
            Some(json!({"pingTime": 1990, "nonce": "abc", "pongTime": 2000}))
        );
    }

    #[test]
    fn inbound_ping_without_session_gets_no_reply() {
        let (relay, _clock) = relay_at(0);
        let (conn, mut rx) = connection("c1");
        assert_eq!(
            relay.on_ping(&conn, Some(json!({}))),
            Outcome::Dropped(DropReason::MissingSession)
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn message_passes_payload_unaltered() {
        let (relay, _clock) = relay_at(0);
        let (conn, _rx) = connection("c1");
        let _ = relay.on_connect(&conn);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _ = relay
            .dispatcher()
            .on_message(move |e| s.lock().push(e.payload.cloned()));
        let payload = json!({"move": [1, 2], "nested": {"k": null}});
        assert!(relay.on_message(&conn, Some(payload.clone())).is_handled());
        assert_eq!(*seen.lock(), vec![Some(payload)]);
    }

    #[test]
    fn absent_message_payload_is_noop() {
        let (relay, _clock) = relay_at(0);
        let (conn, _rx) = connection("c1");
        let _ = relay.on_connect(&conn);
        let hits = Arc::new(Mutex::new(0));
        let h = Arc::clone(&hits);
        let _ = relay.dispatcher().on_message(move |_| *h.lock() += 1);
        assert_eq!(
            relay.on_message(&conn, None),
            Outcome::Dropped(DropReason::MissingPayload)
        );
        assert_eq!(
            relay.on_message(&conn, Some(Value::Null)),
            Outcome::Dropped(DropReason::MissingPayload)
        );
        assert_eq!(*hits.lock(), 0);
    }

    #[test]
    fn frames_route_by_tag() {
        let (relay, clock) = relay_at(0);
        let (conn, mut rx) = connection("c1");
        let _ = relay.on_connect(&conn);
        clock.set(500);
        assert!(relay.on_frame(&conn, r#"{"type":"mjs_ping","data":{}}"#).is_handled());
        assert_eq!(drain(&mut rx)[0].tag, "mjs_ping_reply");
        assert!(relay.on_frame(&conn, r#"{"type":"mjs_msg","data":"hi"}"#).is_handled());
        assert_eq!(
            relay.on_frame(&conn, r#"{"type":"other","data":1}"#),
            Outcome::Dropped(DropReason::UnknownTag)
        );
        assert_eq!(
            relay.on_frame(&conn, "garbage"),
            Outcome::Dropped(DropReason::UndecodableFrame)
        );
    }

    #[test]
    fn custom_tags_are_honoured() {
        let tags = Tags {
            message: "msg".into(),
            ping: "p".into(),
            ping_reply: "pr".into(),
        };
        let relay = RelayFacade::new(tags, Arc::new(ManualClock::new(7)));
        let (conn, mut rx) = connection("c1");
        let _ = relay.on_connect(&conn);
        assert!(relay.on_frame(&conn, r#"{"type":"p","data":{}}"#).is_handled());
        assert_eq!(drain(&mut rx)[0].tag, "pr");
        assert!(relay.send_message(&conn, json!(1)));
        assert_eq!(drain(&mut rx)[0].tag, "msg");
    }

    #[test]
    fn message_relay_forwards_to_others() {
        let (relay, _clock) = relay_at(0);
        let _ = relay.enable_message_relay();
        let (a, mut rx_a) = connection("a");
        let (b, mut rx_b) = connection("b");
        let _ = relay.on_connect(&a);
        let _ = relay.on_connect(&b);
        let _ = relay.on_message(&a, Some(json!({"chat": "hello"})));
        assert!(drain(&mut rx_a).is_empty());
        let got = drain(&mut rx_b);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].tag, "mjs_msg");
        assert_eq!(got[0].data, Some(json!({"chat": "hello"})));
    }

    #[test]
    fn broadcast_message_excludes_sender() {
        let (relay, _clock) = relay_at(0);
        let (a, _rx_a) = connection("a");
        let (b, _rx_b) = connection("b");
        let _ = relay.on_connect(&a);
        let _ = relay.on_connect(&b);
        assert_eq!(relay.broadcast_message(json!(1), Some("a")), 1);
        assert_eq!(relay.broadcast_message(json!(1), None), 2);
    }

    #[test]
    fn shutdown_clears_everything() {
        let (relay, _clock) = relay_at(0);
        let (a, _rx_a) = connection("a");
        let _ = relay.on_connect(&a);
        relay.shutdown();
        assert!(relay.sessions().is_empty());
        assert_eq!(relay.hub().connection_count(), 0);
    }
}
