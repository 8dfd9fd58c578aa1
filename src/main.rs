//! API stub server.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌───────────────────────────────────────────────────┐
//!                          │                    API STUB                       │
//!                          │                                                   │
//!     Client Request       │  ┌─────────┐    ┌─────────┐    ┌──────────────┐   │
//!     ─────────────────────┼─▶│  http   │───▶│ routing │───▶│  key (data   │   │
//!                          │  │ server  │    │  table  │    │  key)        │   │
//!                          │  └─────────┘    └─────────┘    └──────┬───────┘   │
//!                          │                                       │           │
//!                          │                       stored stub?    ▼           │
//!                          │  ┌─────────┐   yes  ┌──────────────────────┐       │
//!     Client Response      │  │response │◀───────│        store         │       │
//!     ◀────────────────────┼──│ render  │        └──────────▲───────────┘       │
//!                          │  └────▲────┘                   │ capture           │
//!                          │       │ no            ┌────────┴─────────┐         │   Upstream
//!                          │       └───────────────│      proxy       │◀────────┼──── Server
//!                          │                       └──────────────────┘         │
//!                          │                                                   │
//!                          │  Cross-cutting: config (hot reload), admin API,   │
//!                          │  observability, lifecycle                         │
//!                          └───────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use api_stub::config::watcher::ConfigWatcher;
use api_stub::config::{load_config, StubConfig};
use api_stub::observability::{logging, metrics};
use api_stub::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "api-stub", version, about = "HTTP API stub server with proxy and capture")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => StubConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-stub starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.apis.len(),
        default_url = %config.proxy.default_url,
        snapshot_path = ?config.storage.snapshot_path,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    // The watcher must stay alive for reloads to keep arriving.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
