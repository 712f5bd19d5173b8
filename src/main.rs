//! mintwatch - Solana mint discovery and risk enrichment pipeline
//!
//! Binary entry point: loads configuration, starts the ingestion pipeline,
//! attaches the status and token-update sinks, and shuts everything down
//! gracefully on ctrl-c.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use mintwatch::config::Config;
use mintwatch::monitor::{App, LogLevel};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    // Environment first so a .env file can satisfy required config
    dotenvy::dotenv().ok();

    info!("🔭 Starting mintwatch");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(args.config.as_deref()).context("loading configuration")?;
    info!("watched account: {}", config.stream.watched_account);
    info!(
        "report endpoint: {}/v1/tokens/{{mint}}/report",
        config.enrichment.report_api_url
    );

    let mut app = App::new(config).context("building pipeline")?;

    // Status sink: forward pipeline status messages into tracing
    if let Some(mut status_rx) = app.take_status_receiver() {
        tokio::spawn(async move {
            while let Some(msg) = status_rx.recv().await {
                match msg.level {
                    LogLevel::Debug => debug!(target: "status", "{}", msg.text),
                    LogLevel::Info => info!(target: "status", "{}", msg.text),
                    LogLevel::Warn => warn!(target: "status", "{}", msg.text),
                    LogLevel::Error => error!(target: "status", "{}", msg.text),
                    // Forced display and panics always surface
                    LogLevel::None | LogLevel::Panic => {
                        info!(target: "status", forced = true, "{}", msg.text)
                    }
                }
            }
        });
    }

    // Token sink: log each fresh snapshot the pipeline publishes
    let mut token_rx = app.subscribe_tokens(100);
    tokio::spawn(async move {
        while let Some(snapshot) = token_rx.recv().await {
            info!("known tokens: {}", snapshot.len());
            for token in &snapshot {
                info!(
                    "  {:<12} {}  {}  score {}",
                    token.symbol, token.address, token.created_at, token.score
                );
            }
        }
    });

    app.run();
    info!("✅ pipeline running, ctrl-c to stop");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!("shutting down...");
    app.stop().await;
    info!("bye");

    Ok(())
}

/// Initialize the tracing subscriber. RUST_LOG wins when set; --verbose
/// lowers the default to debug.
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;
    Ok(())
}
