//! homebase-feed - aircraft feed proxy
//!
//! Normalizes local receiver and remote aggregator payloads into one
//! canonical state-vector feed at `GET /api/feed`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use homebase_common::config::{load_or_default, resolve_config_path};
use homebase_feed::config::FeedConfig;
use homebase_feed::fetcher::HttpFetcher;
use homebase_feed::{build_router, AppState};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for homebase-feed
#[derive(Parser, Debug)]
#[command(name = "homebase-feed")]
#[command(about = "Canonical aircraft feed proxy")]
#[command(version)]
struct Args {
    /// Config file (overrides HOMEBASE_CONFIG and the default location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "HOMEBASE_FEED_PORT")]
    port: Option<u16>,

    /// Listen address (overrides config)
    #[arg(long, env = "HOMEBASE_FEED_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), "feed");
    let loaded = load_or_default::<FeedConfig>(config_path.as_deref());
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("homebase_feed={0},homebase_common={0},tower_http={0}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting homebase-feed v{} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("HOMEBASE_BUILD_INFO")
    );

    let mut config = loaded.context("Failed to load configuration")?;
    match config_path.as_deref() {
        Some(path) if path.exists() => info!("Configuration: {}", path.display()),
        _ => warn!("No configuration file found, using built-in defaults"),
    }

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    info!(
        priority = ?config.sources.priority,
        local_mirrors = config.sources.local_urls.len(),
        remote = %config.sources.remote_base,
        remote_enabled = config.sources.remote_enabled,
        "Upstream sources"
    );
    if config.auth.is_disabled() {
        warn!("Role gate disabled (auth.allowed_roles is empty)");
    }

    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.bind, config.port))?;

    let app = build_router(AppState::new(config, Arc::new(fetcher)));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("homebase-feed listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
