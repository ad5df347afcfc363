//! Network engine actor
//!
//! The engine task is the only owner of the [`StreamHub`]. Socket tasks and
//! the synchronous pipeline side reach it by queueing [`EngineCommand`]s
//! through an [`EngineHandle`]; commands that need an answer carry a oneshot
//! responder.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::BridgeError;
use crate::metrics::BridgeMetrics;
use crate::ws::dispatch::dispatch_client_text;
use crate::ws::{ClientId, ClientSocket, PendingPublish, ServerCommand, StreamHub, Target};

/// Commands serviced by the engine loop
#[derive(Debug)]
pub enum EngineCommand {
    ClientConnected {
        client_id: ClientId,
        socket: ClientSocket,
    },
    ClientMessage {
        client_id: ClientId,
        seq: u64,
        text: String,
    },
    ClientDisconnected {
        client_id: ClientId,
        seq: u64,
    },
    RegisterStream {
        name: String,
        channels: Vec<String>,
    },
    Send {
        command: ServerCommand,
        payload: Value,
        target: Target,
    },
    Streams {
        respond_to: oneshot::Sender<BTreeMap<String, Vec<String>>>,
    },
    BufferKeys {
        respond_to: oneshot::Sender<Vec<String>>,
    },
    TakeBuffer {
        name: String,
        respond_to: oneshot::Sender<Option<PendingPublish>>,
    },
    ClientCount {
        respond_to: oneshot::Sender<usize>,
    },
}

/// Cloneable handle for queueing work on the engine.
///
/// The blocking methods are for the synchronous pipeline side. Calling them
/// from inside any tokio runtime fails with
/// [`BridgeError::BlockingInsideRuntime`] rather than stalling the loop.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    sender: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    /// Queue a command without waiting for it to run.
    pub fn post(&self, cmd: EngineCommand) -> Result<(), BridgeError> {
        self.sender.send(cmd).map_err(|_| BridgeError::EngineGone)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T, BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.post(make(tx))?;
        rx.await.map_err(|_| BridgeError::NoResponse)
    }

    fn blocking_request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T, BridgeError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(BridgeError::BlockingInsideRuntime);
        }
        let (tx, rx) = oneshot::channel();
        self.post(make(tx))?;
        rx.blocking_recv().map_err(|_| BridgeError::NoResponse)
    }

    // -- fire-and-forget --

    pub fn register_stream(&self, name: &str, channels: Vec<String>) -> Result<(), BridgeError> {
        self.post(EngineCommand::RegisterStream {
            name: name.to_string(),
            channels,
        })
    }

    pub fn send(
        &self,
        command: ServerCommand,
        payload: Value,
        target: Target,
    ) -> Result<(), BridgeError> {
        self.post(EngineCommand::Send {
            command,
            payload,
            target,
        })
    }

    // -- blocking --

    pub fn streams(&self) -> Result<BTreeMap<String, Vec<String>>, BridgeError> {
        self.blocking_request(|respond_to| EngineCommand::Streams { respond_to })
    }

    pub fn buffer_keys(&self) -> Result<Vec<String>, BridgeError> {
        self.blocking_request(|respond_to| EngineCommand::BufferKeys { respond_to })
    }

    /// `Ok(None)` if the topic has no buffer slot.
    pub fn take_buffer(&self, name: &str) -> Result<Option<PendingPublish>, BridgeError> {
        self.blocking_request(|respond_to| EngineCommand::TakeBuffer {
            name: name.to_string(),
            respond_to,
        })
    }

    pub fn client_count(&self) -> Result<usize, BridgeError> {
        self.blocking_request(|respond_to| EngineCommand::ClientCount { respond_to })
    }

    // -- async, for code already running on a runtime --

    pub async fn fetch_streams(&self) -> Result<BTreeMap<String, Vec<String>>, BridgeError> {
        self.request(|respond_to| EngineCommand::Streams { respond_to })
            .await
    }

    pub async fn fetch_buffer_keys(&self) -> Result<Vec<String>, BridgeError> {
        self.request(|respond_to| EngineCommand::BufferKeys { respond_to })
            .await
    }

    pub async fn fetch_client_count(&self) -> Result<usize, BridgeError> {
        self.request(|respond_to| EngineCommand::ClientCount { respond_to })
            .await
    }
}

pub struct Engine {
    hub: StreamHub,
    receiver: mpsc::UnboundedReceiver<EngineCommand>,
    shutdown: CancellationToken,
}

impl Engine {
    pub fn new(metrics: Arc<BridgeMetrics>, shutdown: CancellationToken) -> (Self, EngineHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let engine = Self {
            hub: StreamHub::new(metrics),
            receiver,
            shutdown,
        };
        (engine, EngineHandle { sender })
    }

    /// Service commands until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        debug!("network engine started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
            }
        }
        info!(clients = self.hub.client_count(), "network engine stopped");
    }

    fn handle(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::ClientConnected { client_id, socket } => {
                self.hub.connect(client_id, socket);
            }

            EngineCommand::ClientMessage {
                client_id,
                seq,
                text,
            } => {
                if self.hub.is_current(&client_id, seq) {
                    dispatch_client_text(&mut self.hub, &client_id, &text);
                } else {
                    debug!(client_id = %client_id, seq, "dropping message from superseded connection");
                }
            }

            EngineCommand::ClientDisconnected { client_id, seq } => {
                self.hub.disconnect_connection(&client_id, seq);
            }

            EngineCommand::RegisterStream { name, channels } => {
                self.hub.register_stream(&name, channels);
            }

            EngineCommand::Send {
                command,
                payload,
                target,
            } => {
                self.hub.send(command, &payload, target);
            }

            EngineCommand::Streams { respond_to } => {
                let _ = respond_to.send(self.hub.streams_snapshot());
            }

            EngineCommand::BufferKeys { respond_to } => {
                let _ = respond_to.send(self.hub.buffer_keys());
            }

            EngineCommand::TakeBuffer { name, respond_to } => {
                let _ = respond_to.send(self.hub.take_buffer(&name));
            }

            EngineCommand::ClientCount { respond_to } => {
                let _ = respond_to.send(self.hub.client_count());
            }
        }
    }
}
