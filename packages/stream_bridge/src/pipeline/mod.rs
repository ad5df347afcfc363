//! Pipeline-facing side of the bridge.
//!
//! A minimal synchronous node interface: named input/output [`Port`]s, a
//! [`Node`] updated once per tick, and a [`Driver`] that runs the ticks.
//! [`UiNode`] is the node that connects a pipeline to the WebSocket clients;
//! [`MetadataNode`] turns browser form submissions into output metadata.

mod demo;
mod driver;
mod metadata;
mod node;
mod port;
mod ui_node;

pub use demo::SineSource;
pub use driver::Driver;
pub use metadata::{METADATA_OUTPUT, MetadataNode};
pub use node::Node;
pub use port::{Port, Ports};
pub use ui_node::UiNode;
