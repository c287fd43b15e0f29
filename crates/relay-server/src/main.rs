//! relay-server binary entry point.

use std::path::PathBuf;

use clap::Parser;
use relay_server::config::ServerConfig;
use relay_server::server::RelayServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Relay broker: receives JSON events over HTTP and re-broadcasts them to
/// all connected WebSocket subscribers.
#[derive(Debug, Parser)]
#[command(name = "relay-server", version)]
struct Args {
    /// Path to a JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let server = RelayServer::new(config);

    let shutdown = server.shutdown().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            shutdown.shutdown();
        }
    });

    server.run().await?;
    info!("relay server stopped");
    Ok(())
}
