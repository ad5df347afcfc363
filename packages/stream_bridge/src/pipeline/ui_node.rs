use frame_codec::{decode, encode};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::node::Node;
use super::port::{Port, Ports};
use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::ws::{ServerCommand, Target};

/// Pipeline node that streams its inputs to WebSocket subscribers and turns
/// client publishes into outputs.
///
/// Every input with data is broadcast under the input's name. Every topic
/// clients published to since the previous tick becomes an output of the
/// same name.
pub struct UiNode {
    bridge: Bridge,
}

impl UiNode {
    /// Start a bridge from configuration and wrap it.
    pub fn start(config: &BridgeConfig) -> Result<Self, BridgeError> {
        Ok(Self::new(Bridge::start(config)?))
    }

    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    fn forward_inputs(&self, ports: &Ports) -> Result<(), BridgeError> {
        for (name, port) in ports.inputs() {
            let Some(frame) = &port.data else {
                continue;
            };
            let payload = json!({
                "name": name,
                "data": Value::Object(encode(frame)),
                "meta": port.meta.clone().unwrap_or(Value::Null),
            });
            self.bridge
                .register_stream(name, frame.columns().to_vec())?;
            self.bridge
                .send(ServerCommand::Stream, payload, Target::Topic(name.clone()))?;
        }
        Ok(())
    }

    fn drain_buffer(&self, ports: &mut Ports) -> Result<(), BridgeError> {
        for name in self.bridge.buffer_keys()? {
            let Some(pending) = self.bridge.take_buffer(&name)? else {
                debug!(topic = %name, "buffer slot vanished before drain");
                continue;
            };
            if pending.is_empty() {
                continue;
            }
            let data = if pending.data.is_empty() {
                None
            } else {
                match decode(&pending.data) {
                    Ok(frame) => Some(frame),
                    Err(e) => {
                        warn!(topic = %name, error = %e, "discarding undecodable client stream");
                        continue;
                    }
                }
            };
            ports.set_output(
                &name,
                Port {
                    data,
                    meta: pending.meta,
                },
            );
        }
        Ok(())
    }
}

impl Node for UiNode {
    fn update(&mut self, ports: &mut Ports) -> Result<(), BridgeError> {
        self.forward_inputs(ports)?;
        self.drain_buffer(ports)
    }

    fn terminate(&mut self) {
        self.bridge.terminate();
    }
}
