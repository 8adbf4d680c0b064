//! get-proxy: a caching HTTP GET forwarding proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client: GET /?url=<target>
//!     ─────────────────────────▶ ┌──────────┐   hit    ┌─────────┐
//!                                │   http   │─────────▶│  cache  │
//!                                │  proxy   │◀─────────│         │
//!                                └────┬─────┘          └────▲────┘
//!                                     │ miss (suspend)      │ insert
//!                                     ▼                     │
//!                                ┌──────────┐  publish ┌────┴────┐
//!                                │ inflight │◀─────────│  fetch  │────▶ Upstream
//!                                │  slots   │          │  pool   │
//!                                └──────────┘          └─────────┘
//! ```
//!
//! Configuration is layered from `/etc/get-proxy.toml`, `$HOME/get-proxy.toml`,
//! `./get-proxy.toml` and `--config`, then command-line flags win.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use get_proxy::config::{load_layered, validate_config, CliOverrides, ConfigError, ProxyConfig};
use get_proxy::lifecycle::{wait_for_signal, Shutdown};
use get_proxy::observability::{logging, metrics};
use get_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "get-proxy", version)]
#[command(about = "Caching forwarding proxy for HTTP GET requests", long_about = None)]
struct Cli {
    /// Extra config file, applied after the well-known locations.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind.
    #[arg(long = "bind")]
    bind_address: Option<String>,

    /// Base URL clients use to reach the proxy; rewritten redirects point here.
    #[arg(long)]
    public_url: Option<String>,

    /// Worker threads serving inbound connections.
    #[arg(long)]
    worker_threads: Option<usize>,

    /// Threads in the upstream fetch pool.
    #[arg(long)]
    download_threads: Option<usize>,

    /// Largest accepted inbound request body, in bytes.
    #[arg(long)]
    max_content_length: Option<usize>,

    /// Log level when RUST_LOG is unset.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            port: self.port,
            bind_address: self.bind_address.clone(),
            public_url: self.public_url.clone(),
            worker_threads: self.worker_threads,
            download_threads: self.download_threads,
            max_content_length: self.max_content_length,
            log_level: self.log_level.clone(),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_layered(cli.config.as_deref())?;
    config.apply_overrides(&cli.overrides());
    // Flags may have broken what the files got right.
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability.log_level)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.worker_threads)
        .thread_name("get-proxy-worker")
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))
}

async fn serve(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "get-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        port = config.listener.port,
        worker_threads = config.server.worker_threads,
        download_threads = config.fetch.threads,
        max_content_length = config.server.max_content_length,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(config.listener.socket_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        tracing::info!(signal, "Stopping");
        signal_shutdown.trigger();
    });

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
