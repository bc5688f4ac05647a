//! handpoint - gesture pointing service
//!
//! Receives hand-tracking frames over HTTP or WebSocket, maps them into the
//! calibrated viewport and reports which configured target the hand points at.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use handpoint::config::Config;
use handpoint::server::{self, AppState};

/// handpoint - map hand gestures onto the screen
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "handpoint.toml")]
    config: PathBuf,

    /// Web server host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Web server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("handpoint v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_create(&args.config)?;

    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);

    info!(
        "Viewport: {}x{} (auto target: {})",
        config.viewport.width, config.viewport.height, config.viewport.auto_target
    );
    info!(
        "Pointing ray: landmark {} -> {}, step {} x {} samples, max distance {}",
        config.search.origin_landmark,
        config.search.tip_landmark,
        config.search.step,
        config.search.samples,
        config.search.max_distance
    );
    info!("{} pointable targets", config.targets.len());

    let config = Arc::new(parking_lot::RwLock::new(config));
    let state = Arc::new(AppState::new(config, args.config.clone()));

    let addr = format!("{}:{}", host, port);
    info!("Starting web server at http://{}", addr);

    tokio::select! {
        result = server::run_server(&addr, state) => {
            match result {
                Ok(()) => info!("Server exited normally"),
                Err(e) => tracing::error!("Server error: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
