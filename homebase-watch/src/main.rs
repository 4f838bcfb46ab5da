//! homebase-watch - geofence alert client
//!
//! Polls the feed proxy and raises alerts for low aircraft inside the
//! active geofence or ring. Operator commands are read from stdin.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use homebase_common::config::{load_or_default, resolve_config_path};
use homebase_watch::client::FeedClient;
use homebase_watch::commands::{spawn_stdin_reader, HELP};
use homebase_watch::config::WatchConfig;
use homebase_watch::enrichment::{EnrichmentCache, HttpMetadataService};
use homebase_watch::monitor::Monitor;
use homebase_watch::poller::PollingLoop;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for homebase-watch
#[derive(Parser, Debug)]
#[command(name = "homebase-watch")]
#[command(about = "Geofence alert client for the Homebase aircraft feed")]
#[command(version)]
struct Args {
    /// Config file (overrides HOMEBASE_CONFIG and the default location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Feed endpoint (overrides config)
    #[arg(long, env = "HOMEBASE_FEED_URL")]
    feed_url: Option<String>,

    /// Poll interval in seconds (overrides config)
    #[arg(long)]
    interval: Option<u64>,

    /// Alert altitude threshold in feet (overrides config)
    #[arg(long)]
    threshold_ft: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), "watch");
    let loaded = load_or_default::<WatchConfig>(config_path.as_deref());
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("homebase_watch={0},homebase_common={0}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting homebase-watch v{} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("HOMEBASE_BUILD_INFO")
    );

    let mut config = loaded.context("Failed to load configuration")?;
    match config_path.as_deref() {
        Some(path) if path.exists() => info!("Configuration: {}", path.display()),
        _ => warn!("No configuration file found, using built-in defaults"),
    }

    if let Some(feed_url) = args.feed_url {
        config.feed_url = feed_url;
    }
    if let Some(interval) = args.interval {
        config.poll_interval_secs = interval;
    }
    if let Some(threshold_ft) = args.threshold_ft {
        config.altitude_threshold_ft = threshold_ft;
    }

    let monitor = Monitor::from_config(&config).context("Invalid watch configuration")?;
    let client = FeedClient::from_config(&config)?;

    let cache = match config.enrichment.lookup_url.as_deref() {
        Some(url) => {
            let service = HttpMetadataService::new(
                url,
                config.enrichment.timeout(),
                std::time::Duration::from_millis(config.enrichment.min_interval_ms),
            )?;
            info!(
                url = %url,
                max_entries = config.enrichment.max_entries,
                ttl_secs = ?config.enrichment.ttl_secs,
                "Metadata enrichment enabled"
            );
            Some(Arc::new(EnrichmentCache::new(
                Arc::new(service),
                config.enrichment.max_entries,
                config.enrichment.ttl(),
            )))
        }
        None => {
            info!("Metadata enrichment disabled (enrichment.lookup_url unset)");
            None
        }
    };

    info!(
        threshold_ft = config.altitude_threshold_ft,
        ring_radii_sm = ?config.rings.radii_sm,
        "Alert settings"
    );
    println!("{}", HELP);

    let (command_tx, command_rx) = mpsc::channel(32);
    spawn_stdin_reader(command_tx);

    let polling = PollingLoop::new(client, monitor, cache, config.poll_interval());
    let monitor = polling.run(command_rx, shutdown_signal()).await;

    for line in monitor.status_lines() {
        info!("{}", line);
    }
    info!("homebase-watch stopped");
    Ok(())
}

/// Resolves on Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
}
