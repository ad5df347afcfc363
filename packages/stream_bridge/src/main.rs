use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use stream_bridge::pipeline::SineSource;
use stream_bridge::{Bridge, BridgeConfig, Driver, MetadataNode, Node, Ports, UiNode};

#[derive(Parser)]
#[command(name = "stream-bridge")]
#[command(about = "Streams pipeline data to browser clients over WebSocket")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port for the web server (0 = auto-select, overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Emit a synthetic "demo" stream every tick
    #[arg(long)]
    demo: bool,

    /// Also serve the metadata entry form
    #[arg(long)]
    metadata: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "stream_bridge=debug,frame_codec=debug,tower_http=debug,info"
    } else {
        "stream_bridge=info,frame_codec=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let mut config = BridgeConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.demo {
        config.pipeline.demo = true;
    }
    if cli.metadata {
        config.metadata.enabled = true;
    }

    let bridge = Bridge::start_with_ctrl_c(&config)?;
    info!("Open http://{}/ in a browser", bridge.local_addr());
    let shutdown = bridge.shutdown_token();

    let demo = config
        .pipeline
        .demo
        .then(|| SineSource::new("demo", 1.0, 50));
    let tick_interval = config.pipeline.tick_interval();
    let ui = UiNode::new(bridge);

    let ticks = if config.metadata.enabled {
        let metadata = MetadataNode::start(&config.metadata)?;
        info!("Metadata form on http://{}/", metadata.local_addr());
        drive((ui, metadata), tick_interval, &shutdown, demo)?
    } else {
        drive(ui, tick_interval, &shutdown, demo)?
    };
    info!(ticks, "pipeline stopped");
    Ok(())
}

/// Tick `node` until shutdown, then terminate it.
fn drive<N: Node>(
    node: N,
    tick_interval: Duration,
    shutdown: &CancellationToken,
    mut demo: Option<SineSource>,
) -> Result<u64> {
    let mut driver = Driver::new(node, tick_interval);
    let ticks = driver.run_until(
        || shutdown.is_cancelled(),
        |ports: &mut Ports| {
            if let Some(source) = demo.as_mut() {
                if let Err(e) = source.feed(ports) {
                    warn!(error = %e, "demo source failed");
                }
            }
        },
        log_outputs,
    );
    driver.terminate();
    Ok(ticks?)
}

/// Sink for the bundled binary: report what clients published this tick.
fn log_outputs(ports: &Ports) {
    for (name, port) in ports.outputs() {
        let rows = port.data.as_ref().map_or(0, |frame| frame.len());
        info!(topic = %name, rows, meta = ?port.meta, "client stream");
    }
}
