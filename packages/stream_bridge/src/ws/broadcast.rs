//! Broadcast Engine
//!
//! Serializes an envelope once and fans it out to every client, a single
//! client, or a topic's subscribers. Dead recipients are skipped and reaped.

use serde_json::Value;
use tracing::{trace, warn};

use super::hub::StreamHub;
use super::protocol::{ClientId, ServerCommand, encode_server_message};

/// Who receives a server message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Client(ClientId),
    /// Exactly the topic's current subscribers
    Topic(String),
}

impl StreamHub {
    /// Deliver one message and run a disposal sweep. Returns the number of
    /// clients the message was queued for.
    pub fn send(&mut self, command: ServerCommand, payload: &Value, target: Target) -> usize {
        let text = match encode_server_message(command, payload) {
            Ok(text) => text,
            Err(e) => {
                warn!(?command, error = %e, "failed to encode server message");
                return 0;
            }
        };

        let recipients: Vec<ClientId> = match &target {
            Target::All => self.clients.ids(),
            Target::Client(id) => vec![id.clone()],
            Target::Topic(topic) => self
                .subscriptions
                .subscribers(topic)
                .map(|ids| ids.iter().cloned().collect())
                .unwrap_or_default(),
        };

        let mut delivered = 0;
        for id in &recipients {
            if !self.is_alive(id) {
                continue;
            }
            let Some(entry) = self.clients.get(id) else {
                continue;
            };
            if entry.socket.send_text(text.clone()) {
                delivered += 1;
                self.metrics.message_sent();
            } else {
                self.metrics.message_dropped();
            }
        }
        trace!(?command, ?target, delivered, "sent");

        self.dispose_sweep();
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::BridgeMetrics;
    use crate::ws::clients::{ClientSocket, OUTBOUND_QUEUE_CAPACITY};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn connect(hub: &mut StreamHub, id: &str) -> mpsc::Receiver<String> {
        let (tx, mut rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        hub.connect(id.to_string(), ClientSocket::new(tx));
        // discard the connect-time snapshot
        let _ = rx.try_recv();
        rx
    }

    fn count(rx: &mut mpsc::Receiver<String>) -> usize {
        let mut n = 0;
        while rx.try_recv().is_ok() {
            n += 1;
        }
        n
    }

    #[test]
    fn test_delivery_modes() {
        let mut hub = StreamHub::new(Arc::new(BridgeMetrics::new()));
        let mut a = connect(&mut hub, "a");
        let mut b = connect(&mut hub, "b");
        hub.subscribe("b", "eeg");

        let payload = json!({"name": "eeg"});
        assert_eq!(hub.send(ServerCommand::Stream, &payload, Target::All), 2);
        assert_eq!(
            hub.send(ServerCommand::Stream, &payload, Target::Client("a".into())),
            1
        );
        assert_eq!(
            hub.send(ServerCommand::Stream, &payload, Target::Topic("eeg".into())),
            1
        );
        assert_eq!(
            hub.send(ServerCommand::Stream, &payload, Target::Topic("none".into())),
            0
        );

        assert_eq!(count(&mut a), 2);
        assert_eq!(count(&mut b), 2);
    }

    #[test]
    fn test_dead_subscriber_excluded_and_reaped() {
        let mut hub = StreamHub::new(Arc::new(BridgeMetrics::new()));
        let mut live = connect(&mut hub, "live");
        let dead = connect(&mut hub, "dead");
        hub.subscribe("live", "eeg");
        hub.subscribe("dead", "eeg");
        drop(dead);

        let delivered = hub.send(ServerCommand::Stream, &json!({}), Target::Topic("eeg".into()));
        assert_eq!(delivered, 1);
        assert_eq!(count(&mut live), 1);
        assert!(!hub.contains_client("dead"));
        assert!(!hub.subscribers("eeg").unwrap().contains("dead"));
    }

    #[test]
    fn test_send_sweeps_unrelated_dead_clients() {
        let mut hub = StreamHub::new(Arc::new(BridgeMetrics::new()));
        let _a = connect(&mut hub, "a");
        let b = connect(&mut hub, "b");
        drop(b);

        hub.send(ServerCommand::Ack, &json!(1), Target::Client("a".into()));
        assert!(!hub.contains_client("b"));
        assert_eq!(hub.client_count(), 1);
    }

    #[test]
    fn test_stalled_subscriber_is_dropped_and_reaped() {
        let metrics = Arc::new(BridgeMetrics::new());
        let mut hub = StreamHub::new(metrics.clone());
        // keeps its receiver open but never reads it
        let mut stalled = connect(&mut hub, "stalled");
        let mut reader = connect(&mut hub, "reader");
        hub.subscribe("stalled", "eeg");
        hub.subscribe("reader", "eeg");

        let payload = json!({"name": "eeg"});
        for _ in 0..OUTBOUND_QUEUE_CAPACITY {
            assert_eq!(
                hub.send(ServerCommand::Stream, &payload, Target::Topic("eeg".into())),
                2
            );
            assert_eq!(count(&mut reader), 1);
        }
        assert!(hub.contains_client("stalled"));

        let delivered = hub.send(ServerCommand::Stream, &payload, Target::Topic("eeg".into()));
        assert_eq!(delivered, 1);
        assert!(!hub.contains_client("stalled"));
        assert!(!hub.subscribers("eeg").unwrap().contains("stalled"));

        // later sends no longer reach it
        hub.send(ServerCommand::Stream, &payload, Target::Topic("eeg".into()));
        assert_eq!(count(&mut stalled), OUTBOUND_QUEUE_CAPACITY);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages.dropped, 1);
        assert_eq!(snapshot.connections.reaped, 1);
    }
}
