//! Artifact upload endpoint
//!
//! POST /photos

use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use serde::Serialize;

use crate::error::{ApiError, ApiResult, IngestError};
use crate::ingest::UploadRequest;
use crate::AppState;

/// POST /photos response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
}

/// POST /photos
///
/// Stores one captured artifact and reconciles it into the session report.
/// Filenames without a kind marker are stored and acknowledged but not
/// added to the report.
pub async fn upload_artifact(
    State(state): State<AppState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::Rejected(rejection.status(), rejection.body_text()))?;

    match state.ingestor.ingest(request).await {
        Ok(receipt) => Ok(Json(UploadResponse {
            success: true,
            message: receipt.message().to_string(),
        })),
        Err(IngestError::UnrecognizedArtifactKind { artifact }) => Ok(Json(UploadResponse {
            success: true,
            message: format!(
                "File saved as {}, filename has no img or screenshot marker, not added to the database.",
                artifact.storage_path
            ),
        })),
        Err(e) => Err(e.into()),
    }
}

pub fn upload_routes() -> Router<AppState> {
    Router::new().route("/photos", post(upload_artifact))
}
