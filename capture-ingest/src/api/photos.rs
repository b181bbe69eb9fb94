//! Stored artifact serving
//!
//! GET /photos/:child_name/:session_id/:filename

use axum::{
    body::Body,
    extract::{Path, Request, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::{ApiError, ApiResult};
use crate::models::{check_path_component, SessionKey};
use crate::AppState;

/// GET /photos/:child_name/:session_id/:filename
///
/// Serves artifact bytes so report paths (`photos/...`) resolve directly.
pub async fn serve_artifact(
    State(state): State<AppState>,
    Path((child_name, session_id, filename)): Path<(String, String, String)>,
    request: Request<Body>,
) -> ApiResult<Response> {
    SessionKey::new(&child_name, &session_id).map_err(ApiError::BadRequest)?;
    check_path_component("filename", &filename).map_err(ApiError::BadRequest)?;

    let path = state
        .photos_dir
        .join(&child_name)
        .join(&session_id)
        .join(&filename);

    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    Ok(response.into_response())
}

pub fn photo_routes() -> Router<AppState> {
    Router::new().route("/photos/:child_name/:session_id/:filename", get(serve_artifact))
}
