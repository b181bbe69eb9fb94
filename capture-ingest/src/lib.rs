//! capture-ingest library
//!
//! Receives frame and snapshot uploads, stores them, and merges each tick's
//! two halves into one pair of the per-session report.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod aggregator;
pub mod api;
pub mod db;
pub mod error;
pub mod ingest;
pub mod locks;
pub mod models;
pub mod pairing;
pub mod store;

pub use crate::error::{ApiError, ApiResult, IngestError};

use crate::aggregator::ReportAggregator;
use crate::ingest::UploadIngestor;
use crate::store::ArtifactStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<UploadIngestor>,
    pub aggregator: ReportAggregator,
    /// Filesystem root served under GET /photos
    pub photos_dir: PathBuf,
}

impl AppState {
    pub fn new(db: SqlitePool, store: Arc<dyn ArtifactStore>, photos_dir: PathBuf) -> Self {
        let aggregator = ReportAggregator::new(db, Arc::clone(&store));
        let ingestor = Arc::new(UploadIngestor::new(store, aggregator.clone()));
        Self {
            ingestor,
            aggregator,
            photos_dir,
        }
    }
}

/// Build application router
///
/// `max_upload_bytes` bounds request bodies; base64 captures are far larger
/// than axum's 2 MB default.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .merge(api::upload_routes())
        .merge(api::report_routes())
        .merge(api::photo_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
