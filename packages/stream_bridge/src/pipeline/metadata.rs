use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::node::Node;
use super::port::Ports;
use crate::config::MetadataConfig;
use crate::error::BridgeError;
use crate::server::{MetadataState, metadata_router};

const FORM_THREAD_NAME: &str = "stream-bridge-metadata";

/// Submissions held between ticks before the form answers 503
const METADATA_QUEUE_CAPACITY: usize = 64;

/// Output the submitted metadata is written to
pub const METADATA_OUTPUT: &str = "default";

/// Node that serves a metadata entry form and emits each submission as
/// output metadata.
///
/// When several submissions arrive within one tick, the last one wins.
pub struct MetadataNode {
    queue: mpsc::Receiver<Map<String, Value>>,
    shutdown: CancellationToken,
    local_addr: SocketAddr,
    thread: Option<JoinHandle<()>>,
}

impl MetadataNode {
    /// Bind the form listener on its own thread and runtime.
    pub fn start(config: &MetadataConfig) -> Result<Self, BridgeError> {
        let (tx, queue) = mpsc::channel(METADATA_QUEUE_CAPACITY);
        let app = metadata_router(MetadataState {
            fields: Arc::new(config.fields.clone()),
            queue: tx,
        });
        let shutdown = CancellationToken::new();
        let host = config.host.clone();
        let port = config.port;

        let token = shutdown.clone();
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);
        let thread = std::thread::Builder::new()
            .name(FORM_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(BridgeError::Io(e)));
                        return;
                    }
                };
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::bind((host.as_str(), port)).await
                    {
                        Ok(listener) => listener,
                        Err(e) => {
                            let _ = ready_tx.send(Err(BridgeError::Startup(format!(
                                "failed to bind metadata form on {}:{}: {}",
                                host, port, e
                            ))));
                            return;
                        }
                    };
                    let local_addr = match listener.local_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            let _ = ready_tx.send(Err(BridgeError::Io(e)));
                            return;
                        }
                    };
                    info!("Metadata form listening on http://{}", local_addr);
                    let _ = ready_tx.send(Ok(local_addr));

                    let result = axum::serve(listener, app)
                        .with_graceful_shutdown(async move { token.cancelled().await })
                        .await;
                    if let Err(e) = result {
                        error!(error = %e, "metadata form server error");
                    }
                });
            })?;

        match ready_rx.recv() {
            Ok(Ok(local_addr)) => Ok(Self {
                queue,
                shutdown,
                local_addr,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(BridgeError::Startup(
                    "metadata form thread exited before binding".to_string(),
                ))
            }
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Node for MetadataNode {
    fn update(&mut self, ports: &mut Ports) -> Result<(), BridgeError> {
        while let Ok(metadata) = self.queue.try_recv() {
            let metadata = Value::Object(metadata);
            info!(%metadata, "sending metadata");
            ports.output_mut(METADATA_OUTPUT).meta = Some(metadata);
        }
        Ok(())
    }

    fn terminate(&mut self) {
        self.shutdown.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("metadata form thread panicked");
            }
        }
    }
}

impl Drop for MetadataNode {
    fn drop(&mut self) {
        self.terminate();
    }
}
