use std::time::{Duration, Instant};
use tracing::debug;

use super::node::Node;
use super::port::Ports;
use crate::error::BridgeError;

/// Synchronous tick loop around a single node.
///
/// Each tick clears the ports, lets `source` fill the inputs, runs
/// [`Node::update`] and hands the ports to `sink`. Ticks never overlap.
pub struct Driver<N: Node> {
    node: N,
    ports: Ports,
    tick_interval: Duration,
}

impl<N: Node> Driver<N> {
    pub fn new(node: N, tick_interval: Duration) -> Self {
        Self {
            node,
            ports: Ports::default(),
            tick_interval,
        }
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    /// Ports as left by the last tick
    pub fn ports(&self) -> &Ports {
        &self.ports
    }

    pub fn tick<S, K>(&mut self, source: S, sink: K) -> Result<(), BridgeError>
    where
        S: FnOnce(&mut Ports),
        K: FnOnce(&Ports),
    {
        self.ports.clear();
        source(&mut self.ports);
        self.node.update(&mut self.ports)?;
        sink(&self.ports);
        Ok(())
    }

    /// Tick every `tick_interval` until `stop` returns true. Returns the
    /// number of completed ticks.
    ///
    /// An update error is returned unless `stop` has become true meanwhile,
    /// in which case it is taken as part of shutting down.
    pub fn run_until<F, S, K>(&mut self, stop: F, mut source: S, mut sink: K) -> Result<u64, BridgeError>
    where
        F: Fn() -> bool,
        S: FnMut(&mut Ports),
        K: FnMut(&Ports),
    {
        let mut ticks = 0;
        while !stop() {
            let started = Instant::now();
            if let Err(e) = self.tick(&mut source, &mut sink) {
                if stop() {
                    debug!(error = %e, "update failed during shutdown");
                    break;
                }
                return Err(e);
            }
            ticks += 1;
            if let Some(rest) = self.tick_interval.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        Ok(ticks)
    }

    pub fn terminate(&mut self) {
        self.node.terminate();
    }
}
