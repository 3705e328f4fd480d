//! Anime Service - Anime catalogue REST API behind HTTP Basic authentication

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod bootstrap;
mod config;

use anime_api::{AppState, create_router};
use anime_auth::{AuthGate, PasswordService};
use anime_db::Database;
use crate::config::{Config, LogFormat, LoggingConfig};

/// Anime Service - Anime catalogue REST API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "ANIME_SERVICE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "ANIME_SERVICE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let (config, source) = Config::load(&args.config)?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting Anime Service v{}", env!("CARGO_PKG_VERSION"));
    info!("Using {}", source);

    // Initialize database
    let db = open_database(&config).await?;
    let store_is_empty = !db.has_users().await?;

    // Initialize authentication
    let hasher =
        PasswordService::new(config.hashing_params()).context("Invalid auth.hashing parameters")?;
    let policy = config.access_policy()?;
    for entry in policy.policies() {
        info!(
            "Access policy: {} {} -> {}",
            entry.method.as_ref().map(|m| m.as_str()).unwrap_or("*"),
            entry.pattern,
            entry.access
        );
    }

    let written =
        bootstrap::bootstrap_users(&db, &hasher, &config.auth.users, store_is_empty).await?;
    info!("Provisioned {} user(s)", written);

    let gate = AuthGate::new(Arc::new(db.clone()), hasher, Arc::new(policy))
        .context("Failed to initialise the auth gate")?
        .with_realm(&config.auth.realm);

    // Install the Prometheus recorder before any counter is touched
    let metrics = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(handle)
    } else {
        None
    };

    // Create application state
    let state = AppState::new(db.clone(), gate, metrics);

    // Create router
    let app = create_router(state).layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_addr, port))?;

    info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server stopped");
    Ok(())
}

/// Open the configured database, creating its directory when needed
async fn open_database(config: &Config) -> Result<Database> {
    if config.database.is_in_memory() {
        warn!("Using an in-memory database; all data is lost on shutdown");
        return Ok(Database::in_memory().await?);
    }

    if let Some(parent) = Path::new(&config.database.path).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create database directory {:?}", parent))?;
    }

    Database::new(&config.database_url())
        .await
        .with_context(|| format!("Failed to open database {}", config.database.path))
}

/// Initialize logging
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match logging.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }
}

/// Wait for Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
