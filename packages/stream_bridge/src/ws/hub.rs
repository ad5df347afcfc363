//! Stream Hub
//!
//! The single owner of every registry: clients, subscriptions, streams and
//! the inbound buffer. Only the network engine holds a `StreamHub`, so none of
//! it needs locking.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::broadcast::Target;
use super::buffer::{InboundBuffer, PendingPublish};
use super::clients::{ClientRegistry, ClientSocket};
use super::protocol::{ClientId, Publish, ServerCommand, is_truthy};
use super::streams::StreamRegistry;
use super::subscriptions::SubscriptionDirectory;
use crate::metrics::BridgeMetrics;

pub struct StreamHub {
    pub(super) clients: ClientRegistry,
    pub(super) subscriptions: SubscriptionDirectory,
    pub(super) streams: StreamRegistry,
    pub(super) buffer: InboundBuffer,
    pub(super) metrics: Arc<BridgeMetrics>,
}

impl StreamHub {
    pub fn new(metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            clients: ClientRegistry::default(),
            subscriptions: SubscriptionDirectory::default(),
            streams: StreamRegistry::default(),
            buffer: InboundBuffer::default(),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    // =========================================================================
    // Client lifecycle
    // =========================================================================

    /// Register a client and send it the current stream registry.
    ///
    /// A still-registered client with the same id is disconnected first.
    pub fn connect(&mut self, id: ClientId, socket: ClientSocket) {
        if self.clients.contains(&id) {
            debug!(client_id = %id, "replacing stale connection");
            self.disconnect(&id);
        }
        let seq = socket.seq();
        self.clients.insert(id.clone(), socket);
        self.metrics.connection_opened();
        info!(client_id = %id, seq, "client connected");

        let snapshot = self.streams.to_value();
        self.send(ServerCommand::Streams, &snapshot, Target::Client(id));
    }

    /// Drop every subscription the client holds, then forget the client.
    ///
    /// Returns false if the id was not registered.
    pub fn disconnect(&mut self, id: &str) -> bool {
        let Some(entry) = self.clients.remove(id) else {
            return false;
        };
        for topic in &entry.subscriptions {
            self.subscriptions.remove(topic, id);
        }
        self.metrics.connection_closed();
        info!(client_id = %id, "client disconnected");
        true
    }

    /// Disconnect `id` only if `seq` is still its current connection.
    pub fn disconnect_connection(&mut self, id: &str, seq: u64) -> bool {
        if !self.is_current(id, seq) {
            debug!(client_id = %id, seq, "ignoring close of superseded connection");
            return false;
        }
        self.disconnect(id)
    }

    pub fn is_current(&self, id: &str, seq: u64) -> bool {
        self.clients
            .get(id)
            .is_some_and(|entry| entry.socket.seq() == seq)
    }

    /// Check a client's transport. A dead client is disconnected on the spot.
    pub fn is_alive(&mut self, id: &str) -> bool {
        let alive = match self.clients.get(id) {
            Some(entry) => entry.socket.is_alive(),
            None => return false,
        };
        if !alive {
            self.reap(id);
        }
        alive
    }

    /// Disconnect every client whose transport is gone. Returns how many were reaped.
    pub fn dispose_sweep(&mut self) -> usize {
        let dead = self.clients.dead_ids();
        for id in &dead {
            self.reap(id);
        }
        dead.len()
    }

    fn reap(&mut self, id: &str) {
        if self.disconnect(id) {
            self.metrics.client_reaped();
            debug!(client_id = %id, "reaped dead client");
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Returns false if the client is unknown.
    pub fn subscribe(&mut self, id: &str, topic: &str) -> bool {
        let Some(entry) = self.clients.get_mut(id) else {
            return false;
        };
        entry.subscriptions.insert(topic.to_string());
        self.subscriptions.add(topic, id);
        debug!(client_id = %id, topic = %topic, "subscribed");
        true
    }

    /// Unknown clients and topics are a silent no-op.
    pub fn unsubscribe(&mut self, id: &str, topic: &str) -> bool {
        let removed = self.subscriptions.remove(topic, id);
        if let Some(entry) = self.clients.get_mut(id) {
            entry.subscriptions.remove(topic);
        }
        if removed {
            debug!(client_id = %id, topic = %topic, "unsubscribed");
        }
        removed
    }

    // =========================================================================
    // Streams and the inbound buffer
    // =========================================================================

    /// Record a stream's schema. A new stream is announced to every client.
    pub fn register_stream(&mut self, name: &str, channels: Vec<String>) -> bool {
        if !self.streams.register(name, channels) {
            return false;
        }
        info!(topic = %name, "new stream registered");
        let snapshot = self.streams.to_value();
        self.send(ServerCommand::Streams, &snapshot, Target::All);
        true
    }

    /// Buffer a client publish for the next pipeline drain.
    pub fn publish(&mut self, publish: &Publish) {
        let name = publish.name.as_str();
        if !self.streams.contains(name) {
            self.register_stream(name, publish.channels());
        }
        self.buffer.ensure_slot(name);
        if !publish.data.is_empty() {
            self.buffer.merge_data(name, publish.data.clone());
        }
        if is_truthy(&publish.meta) {
            self.buffer.replace_meta(name, publish.meta.clone());
        }
        self.metrics.publish_buffered();
    }

    pub fn buffer_keys(&self) -> Vec<String> {
        self.buffer.keys()
    }

    pub fn take_buffer(&mut self, name: &str) -> Option<PendingPublish> {
        self.buffer.take(name)
    }

    pub fn streams(&self) -> &StreamRegistry {
        &self.streams
    }

    pub fn streams_snapshot(&self) -> BTreeMap<String, Vec<String>> {
        self.streams.snapshot().clone()
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn contains_client(&self, id: &str) -> bool {
        self.clients.contains(id)
    }

    pub fn subscribers(&self, topic: &str) -> Option<&HashSet<ClientId>> {
        self.subscriptions.subscribers(topic)
    }

    pub fn client_subscriptions(&self, id: &str) -> Option<&HashSet<String>> {
        self.clients.subscriptions(id)
    }

    /// Check that the subscription directory is the exact inverse of the
    /// clients' own subscription sets and holds no empty topics.
    pub fn subscriptions_consistent(&self) -> bool {
        let forward = self.clients.iter().all(|(id, entry)| {
            entry
                .subscriptions
                .iter()
                .all(|topic| self.subscriptions.contains(topic, id))
        });
        let backward = self.subscriptions.iter().all(|(topic, subscribers)| {
            !subscribers.is_empty()
                && subscribers.iter().all(|id| {
                    self.clients
                        .subscriptions(id)
                        .is_some_and(|topics| topics.contains(topic))
                })
        });
        forward && backward
    }
}

impl std::fmt::Debug for StreamHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHub")
            .field("clients", &self.clients.len())
            .field("streams", &self.streams.len())
            .field("buffered", &self.buffer.len())
            .finish()
    }
}
