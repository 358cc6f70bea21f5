//! End-to-end integration tests for Quarry Server
//!
//! Drives the full document API in-process: ingestion, lookup by ID, search
//! through the index and by scanning, error envelopes, and restarts over
//! on-disk stores.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use quarry_common::QuarryConfig;
use quarry_server::{create_router, AppState};

/// Helper to make a GET request and return the JSON response.
async fn get_json(state: &AppState, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(state, request).await
}

/// Helper to POST a raw body and return the JSON response.
async fn post_raw(state: &AppState, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(body.into())
        .unwrap();
    send(state, request).await
}

async fn post_json(state: &AppState, uri: &str, body: Value) -> (StatusCode, Value) {
    post_raw(state, uri, serde_json::to_string(&body).unwrap()).await
}

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = create_router(state.clone())
        .oneshot(request)
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn insert(state: &AppState, doc: Value) -> String {
    let (status, json) = post_json(state, "/docs", doc).await;
    assert_eq!(status, StatusCode::CREATED, "insert failed: {}", json);
    json["body"]["id"].as_str().unwrap().to_string()
}

fn result_ids(json: &Value) -> Vec<String> {
    json["body"]["documents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// Document Lifecycle
// =============================================================================

#[tokio::test]
async fn test_insert_and_get_document() {
    let state = AppState::in_memory();
    let id = insert(&state, json!({"a": {"b": 12}, "name": "john doe"})).await;

    let (status, json) = get_json(&state, &format!("/docs/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["body"]["id"], id.as_str());
    assert_eq!(json["body"]["body"], json!({"a": {"b": 12}, "name": "john doe"}));
}

#[tokio::test]
async fn test_get_unknown_document() {
    let state = AppState::in_memory();
    let (status, json) = get_json(&state, "/docs/does-not-exist").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], "error");
    assert!(json["error"].as_str().unwrap().contains("does-not-exist"));
}

#[tokio::test]
async fn test_insert_rejects_bad_bodies() {
    let state = AppState::in_memory();

    let (status, json) = post_raw(&state, "/docs", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");

    let (status, _) = post_json(&state, "/docs", json!([1, 2, 3])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(state.engine.count(), 0);
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test]
async fn test_search_scenario() {
    let state = AppState::in_memory();
    let id = insert(&state, json!({"a": {"b": 12}, "name": "john doe"})).await;

    let (status, json) = get_json(&state, "/docs?q=a.b:12").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["body"]["count"], 1);
    assert_eq!(json["body"]["plan"], "index");
    assert_eq!(result_ids(&json), vec![id.clone()]);

    let (_, json) = get_json(&state, "/docs?q=age:%3E18").await;
    assert_eq!(json["body"]["count"], 0);
    assert_eq!(json["body"]["plan"], "full_scan");

    let (_, json) = get_json(&state, "/docs?q=name:%22john%20doe%22").await;
    assert_eq!(result_ids(&json), vec![id.clone()]);

    let (_, json) = get_json(&state, "/docs?q=a.b:%3E10").await;
    assert_eq!(result_ids(&json), vec![id]);
}

#[tokio::test]
async fn test_search_parse_error() {
    let state = AppState::in_memory();
    insert(&state, json!({"a": {"b": 12}})).await;

    let (status, json) = get_json(&state, "/docs?q=a.b12").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");
    assert!(json["error"].as_str().unwrap().contains("position 5"));
}

#[tokio::test]
async fn test_empty_query_returns_everything() {
    let state = AppState::in_memory();
    for i in 0..3 {
        insert(&state, json!({"n": i})).await;
    }

    let (status, json) = get_json(&state, "/docs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["body"]["count"], 3);

    let (_, json) = get_json(&state, "/docs?q=").await;
    assert_eq!(json["body"]["count"], 3);
}

#[tokio::test]
async fn test_skip_index_parameter() {
    let state = AppState::in_memory();
    insert(&state, json!({"k": "v"})).await;
    insert(&state, json!({"k": "w"})).await;

    let (_, indexed) = get_json(&state, "/docs?q=k:v").await;
    let (_, scanned) = get_json(&state, "/docs?q=k:v&skipIndex=true").await;

    assert_eq!(indexed["body"]["plan"], "index");
    assert_eq!(scanned["body"]["plan"], "full_scan");
    assert_eq!(scanned["body"]["total_scanned"], 2);
    assert_eq!(result_ids(&indexed), result_ids(&scanned));
}

// =============================================================================
// Statistics
// =============================================================================

#[tokio::test]
async fn test_stats_endpoint() {
    let state = AppState::in_memory();
    insert(&state, json!({"x": 1, "y": {"z": true}})).await;
    get_json(&state, "/docs?q=x:1").await;
    get_json(&state, "/docs?q=x:").await;

    let (status, json) = get_json(&state, "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["body"]["documents"], 1);
    assert_eq!(json["body"]["index_keys"], 2);
    assert_eq!(json["body"]["engine"]["documents_inserted"], 1);
    assert_eq!(json["body"]["engine"]["index_searches"], 1);
    assert_eq!(json["body"]["requests"]["total_requests"], 3);
    assert_eq!(json["body"]["requests"]["failed_requests"], 1);
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_documents_survive_restart() {
    let temp_dir = tempfile::tempdir().expect("tempdir should be created");
    let config = QuarryConfig::default().with_data_dir(temp_dir.path());

    let id = {
        let state = AppState::open(config.clone()).unwrap();
        insert(&state, json!({"city": "paris", "pop": 2100000})).await
    };

    let state = AppState::open(config).unwrap();
    let report = state.engine.reindex().await.unwrap();
    assert_eq!(report.documents, 1);
    assert_eq!(report.entries_added, 0);

    let (status, json) = get_json(&state, &format!("/docs/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["body"]["body"]["city"], "paris");

    let (_, json) = get_json(&state, "/docs?q=city:paris%20pop:%3E1000000").await;
    assert_eq!(result_ids(&json), vec![id]);
    assert_eq!(json["body"]["plan"], "index");
}
