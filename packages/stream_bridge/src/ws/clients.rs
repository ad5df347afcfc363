//! Client Registry
//!
//! Connected clients, the outbound half of their sockets, and the topics each
//! one is subscribed to.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use super::protocol::ClientId;

static NEXT_CONNECTION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Frames queued per client before it counts as stalled
pub const OUTBOUND_QUEUE_CAPACITY: usize = 100;

/// Liveness flag shared by a socket's I/O tasks and the engine.
///
/// The socket tasks clear it on close or error; the engine reads it before
/// every send instead of inspecting the transport.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn mark_dead(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The engine's exclusive handle on one connection's outbound side.
#[derive(Debug)]
pub struct ClientSocket {
    seq: u64,
    outbound: mpsc::Sender<String>,
    liveness: Liveness,
}

impl ClientSocket {
    /// Wrap the sending half of a connection's writer channel.
    pub fn new(outbound: mpsc::Sender<String>) -> Self {
        Self {
            seq: NEXT_CONNECTION_SEQ.fetch_add(1, Ordering::Relaxed),
            outbound,
            liveness: Liveness::new(),
        }
    }

    /// Process-unique connection number
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    /// False once the transport is torn down, even if no close event was seen.
    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive() && !self.outbound.is_closed()
    }

    /// Queue a text frame without waiting.
    ///
    /// A closed channel or a full queue marks the socket dead: a peer that
    /// stopped reading is treated like one whose transport vanished.
    pub fn send_text(&self, text: String) -> bool {
        match self.outbound.try_send(text) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(seq = self.seq, "outbound queue full, dropping client");
                self.liveness.mark_dead();
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.liveness.mark_dead();
                false
            }
        }
    }
}

/// A registered client
#[derive(Debug)]
pub struct ClientEntry {
    pub socket: ClientSocket,
    pub subscriptions: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, ClientEntry>,
}

impl ClientRegistry {
    /// Register a client with no subscriptions, returning any entry it replaced.
    pub fn insert(&mut self, id: ClientId, socket: ClientSocket) -> Option<ClientEntry> {
        self.clients.insert(
            id,
            ClientEntry {
                socket,
                subscriptions: HashSet::new(),
            },
        )
    }

    pub fn remove(&mut self, id: &str) -> Option<ClientEntry> {
        self.clients.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&ClientEntry> {
        self.clients.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ClientEntry> {
        self.clients.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.clients.contains_key(id)
    }

    /// Snapshot of the registered ids, safe to iterate while mutating.
    pub fn ids(&self) -> Vec<ClientId> {
        self.clients.keys().cloned().collect()
    }

    /// Ids whose transport is no longer alive
    pub fn dead_ids(&self) -> Vec<ClientId> {
        self.clients
            .iter()
            .filter(|(_, entry)| !entry.socket.is_alive())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn subscriptions(&self, id: &str) -> Option<&HashSet<String>> {
        self.clients.get(id).map(|entry| &entry.subscriptions)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClientId, &ClientEntry)> {
        self.clients.iter()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }
}
