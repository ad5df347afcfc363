use super::port::Ports;
use crate::error::BridgeError;

/// A pipeline node, updated once per tick.
///
/// `update` reads the node's inputs and writes its outputs; it is never
/// called re-entrantly.
pub trait Node {
    fn update(&mut self, ports: &mut Ports) -> Result<(), BridgeError>;

    /// Release resources at pipeline shutdown.
    fn terminate(&mut self) {}
}

/// Two nodes updated in order on the same ports.
impl<A: Node, B: Node> Node for (A, B) {
    fn update(&mut self, ports: &mut Ports) -> Result<(), BridgeError> {
        self.0.update(ports)?;
        self.1.update(ports)
    }

    fn terminate(&mut self) {
        self.0.terminate();
        self.1.terminate();
    }
}
