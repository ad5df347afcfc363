//! Bridge metrics for observability
//!
//! Counters are written by the network engine and read by the `/health`
//! handler; atomics keep that exchange lock-free.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Bridge-wide counters
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    /// Currently registered WebSocket clients
    pub active_connections: AtomicU64,
    /// Clients registered since start
    pub total_connections: AtomicU64,
    /// Text frames received from registered clients
    pub envelopes_received: AtomicU64,
    /// Envelopes dropped because they could not be decoded
    pub malformed_envelopes: AtomicU64,
    /// Messages handed to a live client socket
    pub messages_sent: AtomicU64,
    /// Messages a client's queue refused
    pub messages_dropped: AtomicU64,
    /// Clients removed because their transport was found dead
    pub clients_reaped: AtomicU64,
    /// Client publishes accepted into the inbound buffer
    pub publishes_buffered: AtomicU64,

    start_time: Option<Instant>,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        // Never wraps below zero even if a close is double-counted.
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn envelope_received(&self) {
        self.envelopes_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn envelope_malformed(&self) {
        self.malformed_envelopes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn client_reaped(&self) {
        self.clients_reaped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_buffered(&self) {
        self.publishes_buffered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
                reaped: self.clients_reaped.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                received: self.envelopes_received.load(Ordering::Relaxed),
                malformed: self.malformed_envelopes.load(Ordering::Relaxed),
                sent: self.messages_sent.load(Ordering::Relaxed),
                dropped: self.messages_dropped.load(Ordering::Relaxed),
                publishes_buffered: self.publishes_buffered.load(Ordering::Relaxed),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub messages: MessageMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
    pub reaped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub received: u64,
    pub malformed: u64,
    pub sent: u64,
    pub dropped: u64,
    pub publishes_buffered: u64,
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub streams: usize,
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
}
