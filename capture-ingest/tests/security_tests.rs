//! Security tests for capture-ingest
//!
//! Tests security-critical features:
//! - Request body size limit, so oversized uploads cannot exhaust memory
//! - Path component validation, so uploads and artifact serving stay
//!   inside the photos directory

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

use capture_ingest::store::FsArtifactStore;
use capture_ingest::{build_router, AppState};

/// Test helper: app over a temp photos directory with the given body limit
async fn setup_app(max_upload_bytes: usize) -> (Router, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let photos_dir = dir.path().join("photos");

    let pool = capture_common::db::init_in_memory_database()
        .await
        .expect("Should create in-memory database");
    let store = Arc::new(FsArtifactStore::new(&photos_dir));
    let state = AppState::new(pool, store, photos_dir);

    (build_router(state, max_upload_bytes), dir)
}

fn upload_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/photos")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

// =============================================================================
// Body Size Limit Tests
// =============================================================================

/// Bodies exceeding the configured limit are rejected with 413
#[tokio::test]
async fn test_body_size_limit_rejects_large_payloads() {
    let (app, dir) = setup_app(1024).await;

    let body = json!({
        "image": "A".repeat(4096),
        "filename": "img-g1-4.png",
        "childName": "amy",
        "sessionId": "s1",
    })
    .to_string();

    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(
        response.status(),
        StatusCode::PAYLOAD_TOO_LARGE,
        "Oversized upload should return 413"
    );
    assert!(!dir.path().join("photos").exists(), "Nothing may be written");
}

/// Bodies under the limit pass through to the handler
#[tokio::test]
async fn test_body_size_limit_allows_small_payloads() {
    let (app, _dir) = setup_app(1024).await;

    let body = json!({
        "image": "aGVsbG8=",
        "filename": "img-g1-4.png",
        "childName": "amy",
        "sessionId": "s1",
    })
    .to_string();

    let response = app.oneshot(upload_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Path Traversal Tests
// =============================================================================

#[tokio::test]
async fn test_upload_rejects_traversal_in_any_component() {
    let cases = [
        ("../evil.png", "amy", "s1"),
        ("img-g1-4.png", "..", "s1"),
        ("img-g1-4.png", "amy", "../s1"),
        ("sub/img-g1-4.png", "amy", "s1"),
        ("img-g1-4.png", "a\\b", "s1"),
    ];

    for (filename, child_name, session_id) in cases {
        let (app, dir) = setup_app(1024 * 1024).await;
        let body = json!({
            "image": "aGVsbG8=",
            "filename": filename,
            "childName": child_name,
            "sessionId": session_id,
        })
        .to_string();

        let response = app.oneshot(upload_request(body)).await.unwrap();

        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "{}/{}/{} should be rejected",
            child_name,
            session_id,
            filename
        );
        assert!(!dir.path().join("photos").exists(), "Nothing may be written");
        assert!(!dir.path().join("evil.png").exists());
    }
}

#[tokio::test]
async fn test_artifact_serving_rejects_encoded_traversal() {
    let (app, dir) = setup_app(1024).await;
    std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();

    let request = Request::builder()
        .uri("/photos/amy/..%2F..%2F/secret.txt")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_ne!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .uri("/photos/amy/s1/..%2F..%2Fsecret.txt")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Content Type Tests
// =============================================================================

#[tokio::test]
async fn test_upload_requires_json_content_type() {
    let (app, _dir) = setup_app(1024).await;

    let request = Request::builder()
        .method("POST")
        .uri("/photos")
        .header("content-type", "text/plain")
        .body(Body::from("image=abc"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}
