//! Error types for capture-ingest
//!
//! `IngestError` is the upload taxonomy; `ApiError` is what HTTP handlers
//! return and maps every failure onto a status code and a JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::ArtifactRecord;

/// Failures of one upload
#[derive(Debug, Error)]
pub enum IngestError {
    /// Missing or malformed request field; nothing was written
    #[error("{0}")]
    Validation(String),

    /// Filename carries neither kind marker; the artifact is stored but not
    /// aggregated
    #[error("Unrecognized artifact kind for filename: {}", .artifact.storage_path)]
    UnrecognizedArtifactKind { artifact: ArtifactRecord },

    /// Artifact or report write failed; the caller should retry the upload
    #[error("Error saving file or updating database: {0}")]
    Persistence(#[from] capture_common::Error),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Request body refused by an extractor (malformed JSON, too large, ...)
    #[error("Request rejected: {1}")]
    Rejected(StatusCode, String),

    #[error("Common error: {0}")]
    Common(#[from] capture_common::Error),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Validation(msg) => ApiError::BadRequest(msg),
            IngestError::Persistence(e) => ApiError::Common(e),
            // Handlers answer this one with a success body; reaching here is a bug
            other @ IngestError::UnrecognizedArtifactKind { .. } => {
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Rejected(status, msg) => (status, "REJECTED", msg),
            ApiError::Common(capture_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
            }
            ApiError::Common(err) => {
                tracing::error!(error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PERSISTENCE_ERROR",
                    "Error saving file or updating database".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "code": error_code,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
