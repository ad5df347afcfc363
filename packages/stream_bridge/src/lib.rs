//! Stream Bridge - WebSocket pub/sub for a tick-driven data pipeline
//!
//! The pipeline side runs synchronously, one tick at a time; the network side
//! runs on its own single-threaded runtime. They meet in [`Bridge`]:
//!
//! ```text
//! pipeline tick ──► UiNode ──► Bridge ──► engine ──► StreamHub ──► clients
//!        ▲                                                │
//!        └──────────── drained inbound buffer ◄───────────┘
//! ```
//!
//! - [`ws`]: protocol, registries, dispatch and broadcast
//! - [`engine`]: the actor owning every registry
//! - [`bridge`]: runtime thread plus the blocking/queued call surface
//! - [`pipeline`]: ports, the node interface, [`UiNode`], [`MetadataNode`]
//!   and a driver loop

pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
mod handlers;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod ws;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use error::BridgeError;
pub use pipeline::{Driver, MetadataNode, Node, Port, Ports, UiNode};
