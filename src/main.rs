//! Management gateway for a media-streaming cluster.
//!
//! ```text
//!     client ──▶ http::server ──▶ routing::RouteTable
//!                                   ├─ api (management endpoints)
//!                                   ├─ sources / SPA shell / SPA assets
//!                                   ├─ redirects
//!                                   └─ http::proxy ──▶ upstreams
//!
//!     workers::Supervisor ──▶ workers::RuntimeState ◀── api handlers
//! ```

use std::path::PathBuf;

use clap::Parser;

use mgmt_gateway::config::{load_config, GatewayConfig};
use mgmt_gateway::lifecycle::{signals, startup, Shutdown};
use mgmt_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "mgmt-gateway")]
#[command(version, about = "Management front door and reverse proxy", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults plus environment when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::from_env()?,
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mgmt-gateway starting");
    tracing::info!(
        port = config.listener.port,
        use_docker = config.workers.use_docker,
        upstreams = config.upstreams.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    startup::run(config, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
