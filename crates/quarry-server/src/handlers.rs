//! Quarry Request Handlers
//!
//! HTTP request handlers for the document API. Every response, success or
//! failure, is wrapped in the same envelope:
//!
//! ```text
//! {"status": "ok", "body": ...}
//! {"status": "error", "error": "..."}
//! ```
//!
//! @version 0.1.0
//! @author Quarry Development Team

use crate::state::{AppState, RequestMetrics};
use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use quarry_common::QuarryError;
use quarry_document::{DocumentId, EngineStats, SearchOptions, SearchPlan};
use serde::{Deserialize, Serialize};
use std::time::Instant;

// =============================================================================
// Response Envelope
// =============================================================================

/// Envelope around every API response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(body: T) -> Self {
        Self {
            status: "ok",
            body: Some(body),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl ToString) -> Self {
        Self {
            status: "error",
            body: None,
            error: Some(message.to_string()),
        }
    }
}

// =============================================================================
// Error Response
// =============================================================================

/// Error carried out of a handler: an engine failure, or a request axum
/// refused to extract.
#[derive(Debug)]
pub enum ApiError {
    Engine(QuarryError),
    Rejected { status: StatusCode, message: String },
}

impl From<QuarryError> for ApiError {
    fn from(err: QuarryError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Engine(err) => match err {
                QuarryError::Parse { .. } | QuarryError::Decode(_) => StatusCode::BAD_REQUEST,
                QuarryError::NotFound(_) => StatusCode::NOT_FOUND,
                QuarryError::DocumentTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                QuarryError::Storage(_)
                | QuarryError::Corruption(_)
                | QuarryError::Io(_)
                | QuarryError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Rejected { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            ApiError::Engine(err) => err.to_string(),
            ApiError::Rejected { message, .. } => message,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", message);
        }
        (status, Json(ApiResponse::error(message))).into_response()
    }
}

/// Not found handler.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ApiResponse::error("route not found")))
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub documents: usize,
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: state.engine.count(),
    }))
}

// =============================================================================
// Document Endpoints
// =============================================================================

/// Body returned after storing a document.
#[derive(Debug, Serialize)]
pub struct InsertResponse {
    pub id: String,
}

/// Store one JSON object and return its new ID.
pub async fn insert_document(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body?;
    let start = Instant::now();
    let result = state.engine.insert_bytes(&body).await;
    state.record_request(elapsed_ms(start), result.is_ok()).await;

    let id = result?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(InsertResponse { id: id.to_string() })),
    ))
}

/// Fetch a stored document by ID.
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let start = Instant::now();
    let result = state.engine.get(&DocumentId::new(id)).await;
    state.record_request(elapsed_ms(start), result.is_ok()).await;

    Ok(Json(ApiResponse::ok(result?.to_json())))
}

// =============================================================================
// Search Endpoint
// =============================================================================

/// Query string of a search request.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default, rename = "skipIndex")]
    pub skip_index: bool,
}

/// Search response body.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub documents: Vec<serde_json::Value>,
    pub count: usize,
    pub plan: SearchPlan,
    pub total_scanned: usize,
    pub execution_time_ms: u64,
}

/// Run a query. An empty `q` matches every document.
pub async fn search_documents(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<ApiResponse<SearchResponse>>, ApiError> {
    let Query(params) = params?;
    let start = Instant::now();
    let options = SearchOptions {
        skip_index: params.skip_index,
    };
    let result = state.engine.search_str(&params.q, options).await;
    state.record_request(elapsed_ms(start), result.is_ok()).await;

    let result = result?;
    Ok(Json(ApiResponse::ok(SearchResponse {
        count: result.count(),
        plan: result.plan,
        total_scanned: result.total_scanned,
        execution_time_ms: result.execution_time_ms,
        documents: result.documents.iter().map(|d| d.to_json()).collect(),
    })))
}

// =============================================================================
// Statistics Endpoint
// =============================================================================

/// Engine and request statistics.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub documents: usize,
    pub index_keys: usize,
    pub engine: EngineStats,
    pub requests: RequestMetrics,
    pub avg_duration_ms: f64,
    pub success_rate: f64,
}

/// Get engine statistics.
pub async fn get_stats(State(state): State<AppState>) -> Json<ApiResponse<StatsResponse>> {
    let requests = state.metrics.read().await.clone();
    Json(ApiResponse::ok(StatsResponse {
        documents: state.engine.count(),
        index_keys: state.engine.index().key_count(),
        engine: state.engine.stats(),
        avg_duration_ms: requests.avg_duration_ms(),
        success_rate: requests.success_rate(),
        requests,
    }))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (QuarryError::parse(5, "expected ':'"), StatusCode::BAD_REQUEST),
            (QuarryError::Decode("bad".into()), StatusCode::BAD_REQUEST),
            (QuarryError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                QuarryError::DocumentTooLarge { size: 2, limit: 1 },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                QuarryError::Storage("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                QuarryError::Corruption("crc".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::Engine(err).status_code(), expected);
        }
    }

    #[test]
    fn test_envelope_shape() {
        let ok = serde_json::to_value(ApiResponse::ok(InsertResponse { id: "a".into() })).unwrap();
        assert_eq!(ok, serde_json::json!({"status": "ok", "body": {"id": "a"}}));

        let err = serde_json::to_value(ApiResponse::error("boom")).unwrap();
        assert_eq!(err, serde_json::json!({"status": "error", "error": "boom"}));
    }

    #[tokio::test]
    async fn test_search_handler_rejects_bad_query() {
        let state = AppState::in_memory();
        let params = SearchParams {
            q: "a.b12".to_string(),
            skip_index: false,
        };

        let err = search_documents(State(state.clone()), Ok(Query(params)))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(matches!(
            err,
            ApiError::Engine(QuarryError::Parse { position: 5, .. })
        ));
        assert_eq!(state.metrics.read().await.failed_requests, 1);
    }
}
