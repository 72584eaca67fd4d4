use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use embed_cache::Cache;
use embed_core::config::ServerConfig;
use embed_facade::Facade;
use embed_observability::ObservabilityEngine;
use embed_pool::Pool;
use embed_registry::{AutoShutdownController, ClientRegistry};
use embed_server::{build_router, AppState};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use tower::ServiceExt;

fn test_state(cache_dir: &std::path::Path) -> AppState {
    let mut config = ServerConfig::default();
    config.cache_dir = Some(cache_dir.to_path_buf());
    config.max_workers = 1;
    let config = Arc::new(config);

    let cache = Cache::open(&cache_dir.join("test.cache"), config.cache_capacity, config.dim, &config.model_id)
        .expect("open cache");
    let pool = Pool::start(config.clone());
    let facade = Arc::new(Facade::new(cache, pool, config));

    AppState {
        facade,
        registry: Arc::new(ClientRegistry::new()),
        shutdown: AutoShutdownController::new(Duration::from_secs(300), Duration::from_secs(1800)),
        observability: Arc::new(Mutex::new(ObservabilityEngine::new())),
        started_at: Instant::now(),
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok_with_no_traffic() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["pool_ready"], true);
}

#[tokio::test]
async fn register_then_deregister_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));

    let register_body = serde_json::json!({ "client_id": "c1", "project": "/repo" }).to_string();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/register-client")
                .header("content-type", "application/json")
                .body(Body::from(register_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["total_clients"], 1);

    let deregister_body = serde_json::json!({ "client_id": "c1" }).to_string();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/deregister-client")
                .header("content-type", "application/json")
                .body(Body::from(deregister_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["was_registered"], true);
    assert_eq!(body["total_clients"], 0);
}

#[tokio::test]
async fn register_rejects_empty_client_id() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_router(test_state(dir.path()));

    let body = serde_json::json!({ "client_id": "", "project": "/repo" }).to_string();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/register-client")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "invalid_input");
}

#[tokio::test]
async fn status_reflects_registered_clients() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());
    state.registry.register("c1".to_string(), "/repo".to_string(), None);
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["registered_clients"], 1);
}
