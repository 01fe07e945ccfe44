//! encore-ls (Ledger Service) - authoritative vote ledger over HTTP
//!
//! Serves vote counts, per-user vote state, atomic vote submission, setlist
//! initialization and song suggestions, plus the per-setlist SSE feed.

use anyhow::{Context, Result};
use clap::Parser;
use encore_common::config::{prepare_root_folder, resolve_root_folder, EncoreConfig, ROOT_FOLDER_ENV};
use encore_common::events::EventBus;
use encore_ls::{build_router, AppState};
use std::path::PathBuf;
use tracing::info;

/// Command-line arguments for encore-ls
#[derive(Parser, Debug)]
#[command(name = "encore-ls")]
#[command(about = "Ledger service for Encore setlist voting")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config.toml)
    #[arg(short, long, env = "ENCORE_LS_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config.toml)
    #[arg(long, env = "ENCORE_LS_BIND")]
    bind: Option<String>,

    /// Root folder holding encore.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Explicit config file (default: platform config location)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encore_ls=info,encore_common=info,tower_http=info".into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting Encore Ledger Service (encore-ls) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EncoreConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EncoreConfig::load(),
    };

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &config);
    let db_path = prepare_root_folder(&root_folder)
        .with_context(|| format!("Failed to prepare root folder {}", root_folder.display()))?;
    info!("Database path: {}", db_path.display());

    let pool = encore_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;
    info!("✓ Database ready");

    let state = AppState::new(pool, EventBus::new(config.event_bus_capacity));
    let app = build_router(state);

    let bind = args.bind.unwrap_or(config.bind_addr);
    let port = args.port.unwrap_or(config.port);
    let addr = format!("{}:{}", bind, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("encore-ls listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("encore-ls stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
