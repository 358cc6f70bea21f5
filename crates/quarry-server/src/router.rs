//! Quarry Router
//!
//! HTTP router configuration with middleware stack. Defines the document API
//! routes and applies request tracing, CORS, body limits and request IDs.
//!
//! @version 0.1.0
//! @author Quarry Development Team

use crate::handlers;
use crate::middleware;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

// =============================================================================
// Router
// =============================================================================

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.network.body_limit_bytes;

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        .route(
            "/docs",
            post(handlers::insert_document).get(handlers::search_documents),
        )
        .route("/docs/:id", get(handlers::get_document))
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::request_id))
        .with_state(state)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use quarry_common::QuarryConfig;
    use quarry_document::DocumentEngine;
    use tower::util::ServiceExt;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_router(AppState::in_memory());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(middleware::REQUEST_ID_HEADER));

        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["body"]["status"], "healthy");
    }

    #[tokio::test]
    async fn test_not_found() {
        let app = create_router(AppState::in_memory());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["status"], "error");
    }

    #[tokio::test]
    async fn test_bad_query_parameter_uses_envelope() {
        let app = create_router(AppState::in_memory());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/docs?q=a:1&skipIndex=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["status"], "error");
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_oversized_body_uses_envelope() {
        let mut config = QuarryConfig::in_memory();
        config.network.body_limit_bytes = 16;
        let state = AppState::new(config, DocumentEngine::in_memory());
        let app = create_router(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/docs")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"name": "far more than sixteen bytes"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["status"], "error");
        assert_eq!(state.engine.count(), 0);
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let app = create_router(AppState::in_memory());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(middleware::REQUEST_ID_HEADER, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()[middleware::REQUEST_ID_HEADER],
            "req-42"
        );
    }
}
