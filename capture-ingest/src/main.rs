//! capture-ingest - capture upload and report pairing service
//!
//! Accepts frame and snapshot uploads from capture clients, stores them
//! under the root folder and maintains one report per (child, session).

use anyhow::{Context, Result};
use capture_common::config::{load_bootstrap_config, resolve_root_folder, RootFolder};
use capture_common::db::init_database;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use capture_ingest::store::FsArtifactStore;
use capture_ingest::{build_router, AppState};

/// Command-line arguments; each overrides the TOML config
#[derive(Debug, Parser)]
#[command(name = "capture-ingest", version, about = "Capture upload and report pairing service")]
struct Args {
    /// Root folder for photos and the report database
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// TOML config file (default: platform config directory)
    #[arg(long, env = "CAPTURE_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    bind: Option<String>,

    /// HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Read before tracing init so the configured level applies; RUST_LOG wins
    let config = load_bootstrap_config(args.config.as_deref());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting capture-ingest v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root = RootFolder::new(resolve_root_folder(args.root_folder.as_deref(), &config));
    root.ensure_directory_exists()
        .with_context(|| format!("Failed to initialize root folder {}", root.path().display()))?;
    info!("Root folder: {}", root.path().display());

    let db_path = root.database_path();
    info!("Database: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to open report database")?;

    let photos_dir = root.photos_dir();
    let store = Arc::new(FsArtifactStore::new(&photos_dir));
    let state = AppState::new(pool, store, photos_dir);
    let app = build_router(state, config.max_upload_bytes);

    let bind = args.bind.unwrap_or(config.bind_address);
    let port = args.port.unwrap_or(config.port);
    let listener = tokio::net::TcpListener::bind((bind.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", bind, port))?;
    info!("capture-ingest listening on http://{}:{}", bind, port);
    info!("Health check: http://{}:{}/health", bind, port);

    axum::serve(listener, app).await?;

    Ok(())
}
