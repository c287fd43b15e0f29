//! relay-client binary entry point.

use std::path::PathBuf;

use clap::Parser;
use relay_client::config::ClientConfig;
use relay_client::session::SubscriberSession;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Relay subscriber: connects to the broker and journals every event it
/// receives into per-service JSON files.
#[derive(Debug, Parser)]
#[command(name = "relay-client", version)]
struct Args {
    /// Path to a JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the broker WebSocket URL.
    #[arg(long)]
    url: Option<String>,

    /// Override the journal output directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = ClientConfig::load(args.config.as_deref())?;
    if let Some(url) = args.url {
        config.server_url = url;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, closing session");
            signal_cancel.cancel();
        }
    });

    let mut session = SubscriberSession::new(config, cancel)?;
    // A failed dial is logged and the process exits cleanly; no retry.
    if let Err(e) = session.run().await {
        tracing::error!(error = %e, "could not reach the broker");
        return Ok(());
    }
    info!("relay client stopped");
    Ok(())
}
