//! Shared helpers for HTTP-level integration tests.
//!
//! Builds the application over the in-memory store so the tests exercise
//! the full middleware stack and handler surface without a database.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use conductor_api::config::ServerConfig;
use conductor_api::router::build_app_router;
use conductor_api::state::AppState;
use conductor_events::ChannelRegistry;
use conductor_pipeline::{MemoryStore, Orchestrator, OrchestratorConfig, ProviderRegistry};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        approval_timeout_secs: 300,
    }
}

/// Build the full application router plus the orchestrator behind it.
///
/// Mirrors the construction in `main.rs` (same `build_app_router`, so the
/// same CORS, request ID, timeout, tracing and panic recovery layers),
/// swapping Postgres for [`MemoryStore`]. The default provider registry
/// includes the `static` provider, which is all the canned pipelines in
/// these tests use.
pub fn build_test_app() -> (Router, Arc<Orchestrator>) {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let providers = Arc::new(ProviderRegistry::with_defaults());
    let channels = Arc::new(ChannelRegistry::new());

    let orchestrator = Orchestrator::new(
        store,
        providers,
        Arc::clone(&channels),
        OrchestratorConfig {
            approval_timeout_secs: config.approval_timeout_secs,
        },
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
        channels,
    };

    (build_app_router(state, &config), orchestrator)
}

/// Send a GET request to the app.
pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Send a POST request with an empty body.
pub async fn post_empty(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Send a DELETE request to the app.
pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read a response body as text.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Poll an execution until it reaches the expected terminal status.
///
/// Panics if the execution lands on a different terminal status or the
/// deadline passes.
pub async fn wait_for_status(app: &Router, id: &str, expected: &str) -> Value {
    for _ in 0..1_000 {
        let response = get(app, &format!("/api/v1/executions/{id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let status = json["data"]["status"].as_str().unwrap().to_string();
        if status == expected {
            return json;
        }
        assert!(
            !matches!(status.as_str(), "completed" | "failed" | "cancelled"),
            "execution reached terminal status {status:?}, expected {expected:?}",
        );
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("execution did not reach {expected:?} in time");
}
