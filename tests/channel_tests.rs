//! Tests for the channel broadcaster: pattern addressing, authorization
//! gating, subscription dispatch and connection lifecycle.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use wharf::ids::ConnectionId;
use wharf::websocket::{
    Channel, ChannelBroadcaster, ConnectionHandle, ConnectionInfo, Envelope, Subscription,
};

fn connection() -> (ConnectionHandle, mpsc::Receiver<String>, ConnectionInfo) {
    let (tx, rx) = mpsc::channel();
    let info = ConnectionInfo {
        id: ConnectionId::new(),
        remote_addr: None,
    };
    (ConnectionHandle::new(info.clone(), tx), rx, info)
}

fn received(rx: &mpsc::Receiver<String>) -> Vec<Envelope> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_str(&frame).expect("envelope"));
    }
    frames
}

struct Rooms;

impl Channel for Rooms {
    fn name(&self) -> &str {
        "rooms/:id"
    }
}

struct Lobby;

impl Channel for Lobby {
    fn name(&self) -> &str {
        "lobby"
    }
}

struct Private;

impl Channel for Private {
    fn name(&self) -> &str {
        "private"
    }

    fn authorize(&self, _connection: &ConnectionInfo) -> bool {
        false
    }
}

struct Recording {
    seen: Arc<Mutex<Vec<Value>>>,
}

impl Channel for Recording {
    fn name(&self) -> &str {
        "rooms/:id"
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        let seen = Arc::clone(&self.seen);
        vec![Subscription::new("message", move |payload: &Value| {
            seen.lock().expect("lock").push(payload.clone());
        })]
    }
}

#[test]
fn broadcast_on_a_pattern_reaches_only_matching_channels() {
    let broadcaster = ChannelBroadcaster::new();
    broadcaster.register(Arc::new(Rooms)).expect("rooms");
    broadcaster.register(Arc::new(Lobby)).expect("lobby");

    let (handle, rx, _info) = connection();
    broadcaster.attach(handle);

    broadcaster.broadcast(&json!({"text": "hi"}), Some("rooms/7"));

    let frames = received(&rx);
    // One delivery via the rooms registration; the lobby pattern does not
    // match "rooms/7".
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].channel, "rooms/7");
    assert_eq!(frames[0].payload, json!({"text": "hi"}));
}

#[test]
fn broadcast_without_a_name_uses_the_channel_pattern() {
    let broadcaster = ChannelBroadcaster::new();
    broadcaster.register(Arc::new(Lobby)).expect("lobby");
    let (handle, rx, _info) = connection();
    broadcaster.attach(handle);

    broadcaster.broadcast(&json!({"n": 1}), None);

    let frames = received(&rx);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].channel, "lobby");
}

#[test]
fn unauthorized_connections_are_never_attached() {
    let broadcaster = ChannelBroadcaster::new();
    broadcaster.register(Arc::new(Private)).expect("private");
    broadcaster.register(Arc::new(Lobby)).expect("lobby");

    let (handle, rx, _info) = connection();
    broadcaster.attach(handle);

    assert_eq!(broadcaster.live_connections("private"), 0);
    assert_eq!(broadcaster.live_connections("lobby"), 1);

    broadcaster.broadcast(&json!({}), Some("private"));
    assert!(received(&rx).is_empty());
}

#[test]
fn inbound_envelopes_invoke_matching_subscriptions() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let broadcaster = ChannelBroadcaster::new();
    broadcaster
        .register(Arc::new(Recording {
            seen: Arc::clone(&seen),
        }))
        .expect("register");

    let (handle, _rx, info) = connection();
    broadcaster.attach(handle);

    broadcaster.dispatch(&info, r#"{"channel":"rooms/42","payload":{"x":1}}"#);
    broadcaster.dispatch(&info, r#"{"channel":"elsewhere","payload":{"x":2}}"#);
    broadcaster.dispatch(&info, "not json at all");

    let seen = seen.lock().expect("lock");
    assert_eq!(seen.as_slice(), &[json!({"x": 1})]);
}

#[test]
fn detach_removes_the_connection_everywhere() {
    let broadcaster = ChannelBroadcaster::new();
    broadcaster.register(Arc::new(Rooms)).expect("rooms");
    broadcaster.register(Arc::new(Lobby)).expect("lobby");

    let (handle, rx, info) = connection();
    broadcaster.attach(handle);
    assert_eq!(broadcaster.live_connections("lobby"), 1);

    broadcaster.detach(info.id);
    assert_eq!(broadcaster.live_connections("lobby"), 0);
    assert_eq!(broadcaster.live_connections("rooms/:id"), 0);

    broadcaster.broadcast(&json!({}), Some("lobby"));
    assert!(received(&rx).is_empty());
}

#[test]
fn broadcasting_into_an_empty_channel_is_a_silent_noop() {
    let broadcaster = ChannelBroadcaster::new();
    broadcaster.register(Arc::new(Lobby)).expect("lobby");
    // No connections attached; must not panic or error.
    broadcaster.broadcast(&json!({"quiet": true}), None);
}

#[test]
fn dead_outboxes_are_pruned_on_broadcast() {
    let broadcaster = ChannelBroadcaster::new();
    broadcaster.register(Arc::new(Lobby)).expect("lobby");

    let (handle, rx, _info) = connection();
    broadcaster.attach(handle);
    drop(rx);

    broadcaster.broadcast(&json!({}), None);
    assert_eq!(broadcaster.live_connections("lobby"), 0);
}

#[test]
fn envelope_wire_format_round_trips() {
    let envelope = Envelope {
        channel: "rooms/9".to_string(),
        payload: json!({"body": "hello", "from": "u1"}),
    };
    let text = serde_json::to_string(&envelope).expect("serialize");
    let parsed: Envelope = serde_json::from_str(&text).expect("parse");
    assert_eq!(parsed, envelope);
    assert!(text.contains("\"channel\":\"rooms/9\""));
}
