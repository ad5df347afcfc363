//! Cross-scheduler bridge
//!
//! [`Bridge`] runs the network engine and HTTP server on a dedicated thread
//! with its own single-threaded runtime, and exposes the engine to the
//! synchronous pipeline side. Queries block the calling thread until the
//! engine answers; updates are queued and return at once.

use serde_json::Value;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::BridgeConfig;
use crate::engine::{Engine, EngineHandle};
use crate::error::BridgeError;
use crate::metrics::BridgeMetrics;
use crate::server::{AppState, router};
use crate::ws::{PendingPublish, ServerCommand, Target};

const NET_THREAD_NAME: &str = "stream-bridge-net";

pub struct Bridge {
    engine: EngineHandle,
    shutdown: CancellationToken,
    local_addr: SocketAddr,
    metrics: Arc<BridgeMetrics>,
    thread: Option<JoinHandle<()>>,
}

impl Bridge {
    /// Resolve app routes, bind the listener and start the network engine.
    ///
    /// Returns once the listener is bound. A missing app directory or a bind
    /// failure is returned as an error and nothing is left running.
    pub fn start(config: &BridgeConfig) -> Result<Self, BridgeError> {
        Self::spawn(config, false)
    }

    /// Like [`Bridge::start`], but Ctrl-C also triggers shutdown.
    pub fn start_with_ctrl_c(config: &BridgeConfig) -> Result<Self, BridgeError> {
        Self::spawn(config, true)
    }

    fn spawn(config: &BridgeConfig, handle_ctrl_c: bool) -> Result<Self, BridgeError> {
        let apps = config.resolve_routes()?;

        let metrics = Arc::new(BridgeMetrics::new());
        let shutdown = CancellationToken::new();
        let (engine, handle) = Engine::new(metrics.clone(), shutdown.clone());

        let net = NetTask {
            host: config.server.host.clone(),
            port: config.server.port,
            apps,
            state: AppState {
                engine: handle.clone(),
                metrics: metrics.clone(),
                settings: Arc::new(config.settings.clone()),
                default_app: config.default_app.clone(),
            },
            engine,
            shutdown: shutdown.clone(),
            handle_ctrl_c,
        };

        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel(1);
        let thread = std::thread::Builder::new()
            .name(NET_THREAD_NAME.to_string())
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
                runtime.block_on(net.run(ready_tx));
            })?;

        match ready_rx.recv() {
            Ok(Ok(local_addr)) => Ok(Self {
                engine: handle,
                shutdown,
                local_addr,
                metrics,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(BridgeError::Startup(
                    "network thread exited before binding".to_string(),
                ))
            }
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Announce a stream's channels (queued).
    pub fn register_stream(&self, name: &str, channels: Vec<String>) -> Result<(), BridgeError> {
        self.engine.register_stream(name, channels)
    }

    /// Broadcast a server message (queued).
    pub fn send(
        &self,
        command: ServerCommand,
        payload: Value,
        target: Target,
    ) -> Result<(), BridgeError> {
        self.engine.send(command, payload, target)
    }

    pub fn streams(&self) -> Result<BTreeMap<String, Vec<String>>, BridgeError> {
        self.engine.streams()
    }

    pub fn buffer_keys(&self) -> Result<Vec<String>, BridgeError> {
        self.engine.buffer_keys()
    }

    pub fn take_buffer(&self, name: &str) -> Result<Option<PendingPublish>, BridgeError> {
        self.engine.take_buffer(name)
    }

    pub fn client_count(&self) -> Result<usize, BridgeError> {
        self.engine.client_count()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop the engine and server and wait for the network thread.
    ///
    /// Messages still queued for clients may be lost.
    pub fn terminate(&mut self) {
        self.shutdown.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("network thread panicked");
            }
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Everything the network thread needs, moved onto it in one piece.
struct NetTask {
    host: String,
    port: u16,
    apps: BTreeMap<String, PathBuf>,
    state: AppState,
    engine: Engine,
    shutdown: CancellationToken,
    handle_ctrl_c: bool,
}

type ReadySender = std::sync::mpsc::SyncSender<Result<SocketAddr, BridgeError>>;

impl NetTask {
    async fn run(self, ready: ReadySender) {
        let listener = match tokio::net::TcpListener::bind((self.host.as_str(), self.port)).await {
            Ok(listener) => listener,
            Err(e) => {
                let _ = ready.send(Err(BridgeError::Startup(format!(
                    "failed to bind {}:{}: {}",
                    self.host, self.port, e
                ))));
                return;
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                let _ = ready.send(Err(BridgeError::Io(e)));
                return;
            }
        };

        for (name, dir) in &self.apps {
            info!(app = %name, dir = %dir.display(), "serving app");
        }
        let app = router(self.state, &self.apps);
        let engine_task = tokio::spawn(self.engine.run());

        if self.handle_ctrl_c {
            let token = self.shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => match result {
                        Ok(()) => {
                            info!("received Ctrl-C, shutting down");
                            token.cancel();
                        }
                        Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
                    },
                    _ = token.cancelled() => {}
                }
            });
        }

        info!("Stream bridge listening on http://{}", local_addr);
        let _ = ready.send(Ok(local_addr));

        let token = self.shutdown.clone();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;
        if let Err(e) = result {
            error!(error = %e, "server error");
        }

        self.shutdown.cancel();
        let _ = engine_task.await;
        info!("Stream bridge stopped");
    }
}
