//! Report endpoints
//!
//! GET  /reports/:child_name/:session_id
//! POST /reports/:child_name/:session_id/scores
//! PUT  /reports/:child_name/:session_id/pairs/:filename/emotions

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::models::{ArtifactName, Report, Score, SessionKey};
use crate::AppState;

/// POST /reports/:child_name/:session_id/scores request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordScoreRequest {
    pub game_type: String,
    pub score: f64,
}

fn session_key(child_name: &str, session_id: &str) -> ApiResult<SessionKey> {
    SessionKey::new(child_name, session_id).map_err(ApiError::BadRequest)
}

/// GET /reports/:child_name/:session_id
pub async fn get_report(
    State(state): State<AppState>,
    Path((child_name, session_id)): Path<(String, String)>,
) -> ApiResult<Json<Report>> {
    let key = session_key(&child_name, &session_id)?;

    state
        .aggregator
        .load_report(&key)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Report not found: {}", key)))
}

/// POST /reports/:child_name/:session_id/scores
///
/// Records a game score computed elsewhere; returns the updated report.
pub async fn record_score(
    State(state): State<AppState>,
    Path((child_name, session_id)): Path<(String, String)>,
    Json(request): Json<RecordScoreRequest>,
) -> ApiResult<Json<Report>> {
    let key = session_key(&child_name, &session_id)?;

    if request.game_type.trim().is_empty() {
        return Err(ApiError::BadRequest("gameType must not be empty".to_string()));
    }
    if !request.score.is_finite() {
        return Err(ApiError::BadRequest("score must be a finite number".to_string()));
    }

    let report = state
        .aggregator
        .record_score(
            &key,
            Score {
                game_type: request.game_type,
                score: request.score,
            },
        )
        .await?;

    tracing::info!(session = %key, "Score recorded");
    Ok(Json(report))
}

/// PUT /reports/:child_name/:session_id/pairs/:filename/emotions
///
/// Attaches an externally computed emotions annotation to the pair holding
/// `filename` (either half of the tick). The body is stored as given.
pub async fn set_pair_emotions(
    State(state): State<AppState>,
    Path((child_name, session_id, filename)): Path<(String, String, String)>,
    Json(emotions): Json<serde_json::Value>,
) -> ApiResult<Json<Report>> {
    let key = session_key(&child_name, &session_id)?;
    let name = ArtifactName::parse(&filename).ok_or_else(|| {
        ApiError::BadRequest(format!("No img or screenshot marker in filename: {}", filename))
    })?;

    state
        .aggregator
        .set_pair_emotions(&key, &name.tick, emotions)
        .await?;

    state
        .aggregator
        .load_report(&key)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Report not found: {}", key)))
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/reports/:child_name/:session_id", get(get_report))
        .route("/reports/:child_name/:session_id/scores", post(record_score))
        .route(
            "/reports/:child_name/:session_id/pairs/:filename/emotions",
            put(set_pair_emotions),
        )
}
