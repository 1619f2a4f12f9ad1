use std::net::SocketAddr;
use std::sync::mpsc;
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::ids::ConnectionId;
use crate::router::PathPattern;

/// Wire format, both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub channel: String,
    pub payload: Value,
}

/// What a channel's `authorize` predicate gets to look at.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub remote_addr: Option<SocketAddr>,
}

/// A live connection: an id plus the outbox draining to its socket.
///
/// Delivery is decoupled from the connection's blocking read loop: a
/// broadcast enqueues; the connection coroutine writes.
#[derive(Clone)]
pub struct ConnectionHandle {
    info: ConnectionInfo,
    outbox: mpsc::Sender<String>,
}

impl ConnectionHandle {
    #[must_use]
    pub fn new(info: ConnectionInfo, outbox: mpsc::Sender<String>) -> Self {
        Self { info, outbox }
    }

    #[must_use]
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Enqueue a frame. `false` means the connection is gone.
    pub fn send(&self, text: String) -> bool {
        self.outbox.send(text).is_ok()
    }
}

/// A message handler tagged with its subscription event name.
pub struct Subscription {
    pub event: String,
    handler: Arc<dyn Fn(&Value) + Send + Sync>,
}

impl Subscription {
    pub fn new<F>(event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        Self {
            event: event.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn invoke(&self, payload: &Value) {
        (self.handler)(payload);
    }
}

/// A named WebSocket topic.
///
/// The name may be a literal (`lobby`) or a pattern (`rooms/:id`).
/// `authorize` gates both connection attachment and message delivery; the
/// default admits everyone.
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    fn authorize(&self, _connection: &ConnectionInfo) -> bool {
        true
    }

    /// The declared message handlers; invoked for every inbound envelope
    /// whose channel matches this channel's name pattern.
    fn subscriptions(&self) -> Vec<Subscription> {
        Vec::new()
    }
}

struct Registration {
    pattern: PathPattern,
    channel: Arc<dyn Channel>,
    sockets: DashMap<ConnectionId, ConnectionHandle>,
}

/// Channel names reuse the route matcher, which wants a leading slash.
fn channel_path(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    }
}

/// Per-channel registry of live connections with authorize-then-deliver
/// semantics. Registrations live for the server's lifetime; socket entries
/// come and go with connections.
#[derive(Clone, Default)]
pub struct ChannelBroadcaster {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    registrations: RwLock<Vec<Registration>>,
}

impl ChannelBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel type. Its name pattern is compiled once, here.
    pub fn register(&self, channel: Arc<dyn Channel>) -> Result<(), Error> {
        let pattern = PathPattern::compile(&channel_path(channel.name()))?;
        info!(channel = %channel.name(), "Channel registered");
        self.inner
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration {
                pattern,
                channel,
                sockets: DashMap::new(),
            });
        Ok(())
    }

    /// Attach a new connection: it is stored, keyed by its id, under every
    /// registered channel that authorizes it.
    pub fn attach(&self, handle: ConnectionHandle) {
        let registrations = self
            .inner
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for registration in registrations.iter() {
            if registration.channel.authorize(handle.info()) {
                registration
                    .sockets
                    .insert(handle.info().id, handle.clone());
            }
        }
    }

    /// Remove a closed connection everywhere.
    pub fn detach(&self, id: ConnectionId) {
        let registrations = self
            .inner
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for registration in registrations.iter() {
            registration.sockets.remove(&id);
        }
    }

    /// Dispatch an inbound frame: parse the envelope, then invoke every
    /// handler whose channel name matches the envelope's channel and whose
    /// `authorize` passes.
    pub fn dispatch(&self, connection: &ConnectionInfo, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "discarding malformed channel envelope");
                return;
            }
        };
        let path = channel_path(&envelope.channel);

        let registrations = self
            .inner
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for registration in registrations.iter() {
            if !registration.pattern.test(&path) {
                continue;
            }
            if !registration.channel.authorize(connection) {
                debug!(
                    channel = %envelope.channel,
                    connection = %connection.id,
                    "connection not authorized for channel"
                );
                continue;
            }
            for subscription in registration.channel.subscriptions() {
                subscription.invoke(&envelope.payload);
            }
        }
    }

    /// Send `{channel, payload}` to every live socket of the channels whose
    /// name pattern matches the (implicit-or-given) channel name.
    /// Broadcasting into an empty socket set is a silent no-op.
    pub fn broadcast(&self, payload: &Value, channel: Option<&str>) {
        let registrations = self
            .inner
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for registration in registrations.iter() {
            let name = channel.unwrap_or_else(|| registration.channel.name());
            if !registration.pattern.test(&channel_path(name)) {
                continue;
            }
            let frame = match serde_json::to_string(&Envelope {
                channel: name.to_string(),
                payload: payload.clone(),
            }) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "cannot serialize broadcast envelope");
                    continue;
                }
            };

            let mut dead: Vec<ConnectionId> = Vec::new();
            for entry in registration.sockets.iter() {
                if !entry.value().send(frame.clone()) {
                    dead.push(*entry.key());
                }
            }
            for id in dead {
                registration.sockets.remove(&id);
            }
        }
    }

    /// Number of live sockets attached under the named channel.
    #[must_use]
    pub fn live_connections(&self, channel_name: &str) -> usize {
        let registrations = self
            .inner
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        registrations
            .iter()
            .filter(|r| r.channel.name() == channel_name)
            .map(|r| r.sockets.len())
            .sum()
    }
}
