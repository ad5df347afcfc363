//! WebSocket pub/sub
//!
//! Clients connect with a session id, subscribe to named topics, and may
//! publish back into the pipeline:
//! - `protocol`: envelope decoding and server message encoding
//! - `hub`: the registries (clients, subscriptions, streams, inbound buffer)
//! - `broadcast`: fan-out with liveness checks and disposal sweeps
//! - `dispatch`: routes client envelopes to the hub
//! - `handler`: per-connection socket tasks

mod broadcast;
mod buffer;
mod clients;
pub(crate) mod dispatch;
mod handler;
mod hub;
mod protocol;
mod streams;
mod subscriptions;

pub use broadcast::Target;
pub use buffer::{InboundBuffer, PendingPublish};
pub use clients::{ClientRegistry, ClientSocket, Liveness, OUTBOUND_QUEUE_CAPACITY};
pub use handler::handle_client_socket;
pub use hub::StreamHub;
pub use protocol::{
    ClientCommand, ClientId, EnvelopeError, Publish, RawEnvelope, ServerCommand,
    encode_server_message, is_truthy,
};
pub use streams::StreamRegistry;
pub use subscriptions::SubscriptionDirectory;
