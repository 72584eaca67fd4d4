//! HTTP handlers for the embedding service's external interface.

use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use embed_core::errors::EmbedError;
use embed_observability::health::HealthSnapshot;
use embed_observability::CallLogEntry;
use serde::{Deserialize, Serialize};

use crate::error_response::ApiError;
use crate::state::AppState;

const CLIENT_ID_HEADER: &str = "x-client-id";
const PROJECT_PATH_HEADER: &str = "x-project-path";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Every handler runs this first: touch the calling client (if known) and
/// tell the shutdown controller a request just arrived, cancelling any
/// pending idle countdown.
fn observe_request(state: &AppState, headers: &HeaderMap) {
    state.shutdown.record_request();
    if let Some(client_id) = header_str(headers, CLIENT_ID_HEADER) {
        let known = state.registry.touch(client_id);
        tracing::trace!(
            client_id,
            known,
            project_path = header_str(headers, PROJECT_PATH_HEADER),
            "request observed"
        );
    }
}

fn health_snapshot(state: &AppState) -> HealthSnapshot {
    let facade_health = state.facade.health();
    let cache_hit_rate = state.observability.lock().metrics.embedding.cache_hit_rate();
    HealthSnapshot {
        pool_worker_count: facade_health.pool.worker_count,
        pool_max_workers: state.facade.config().max_workers,
        pool_degraded: facade_health.pool.degraded,
        pool_queue_depth: facade_health.pool.queue_depth,
        pool_queue_high_water: facade_health.pool.queue_high_water,
        cache_len: facade_health.cache_len,
        cache_capacity: facade_health.cache_capacity,
        cache_hit_rate,
        registry_client_count: state.registry.len(),
        uptime_ms: state.uptime_ms(),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    uptime_ms: u64,
    pool_ready: bool,
}

pub async fn health(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<HealthResponse>, ApiError> {
    observe_request(&state, &headers);
    let snapshot = health_snapshot(&state);
    let report = state
        .observability
        .lock()
        .health_report(snapshot)
        .map_err(ApiError::new)?;
    let status = match report.overall_status {
        embed_observability::health::HealthStatus::Healthy => "healthy",
        embed_observability::health::HealthStatus::Degraded => "degraded",
        embed_observability::health::HealthStatus::Unhealthy => "unhealthy",
    };
    Ok(Json(HealthResponse {
        status,
        uptime_ms: report.uptime_ms,
        pool_ready: report.pool_ready,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterClientRequest {
    client_id: String,
    project: String,
    pid: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RegisterClientResponse {
    ok: bool,
    client_id: String,
    registered_at: chrono::DateTime<chrono::Utc>,
    total_clients: usize,
}

pub async fn register_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterClientRequest>,
) -> Result<Json<RegisterClientResponse>, ApiError> {
    observe_request(&state, &headers);
    if req.client_id.is_empty() {
        return Err(ApiError::new(EmbedError::invalid_input("client_id must not be empty")));
    }
    let outcome = state.registry.register(req.client_id, req.project, req.pid);
    state.shutdown.record_register();
    Ok(Json(RegisterClientResponse {
        ok: true,
        client_id: outcome.client_id,
        registered_at: outcome.registered_at,
        total_clients: outcome.total_clients,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeregisterClientRequest {
    client_id: String,
}

#[derive(Debug, Serialize)]
pub struct DeregisterClientResponse {
    ok: bool,
    client_id: String,
    was_registered: bool,
    total_clients: usize,
}

pub async fn deregister_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DeregisterClientRequest>,
) -> Result<Json<DeregisterClientResponse>, ApiError> {
    observe_request(&state, &headers);
    let outcome = state.registry.deregister(&req.client_id);
    Ok(Json(DeregisterClientResponse {
        ok: true,
        client_id: outcome.client_id,
        was_registered: outcome.was_registered,
        total_clients: outcome.total_clients,
    }))
}

#[derive(Debug, Deserialize, Default)]
pub struct EmbedRequestOptions {
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmbedRequest {
    texts: Vec<String>,
    #[serde(default)]
    options: EmbedRequestOptions,
}

#[derive(Debug, Serialize)]
pub struct EmbedMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    count: usize,
}

#[derive(Debug, Serialize)]
pub struct EmbedPerformance {
    latency_ms: u64,
    cache_hits: usize,
    cache_misses: usize,
    batches_dispatched: usize,
    retried_indices: usize,
}

#[derive(Debug, Serialize)]
pub struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
    metadata: EmbedMetadata,
    performance: EmbedPerformance,
}

pub async fn embed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EmbedRequest>,
) -> Result<Json<EmbedResponse>, ApiError> {
    observe_request(&state, &headers);
    let request_id = req.options.request_id.clone();
    let started = Instant::now();
    let text_count = req.texts.len();

    let result = state.facade.embed(req.texts, embed_facade::EmbedOptions::default()).await;

    let latency = started.elapsed();
    match result {
        Ok((vectors, stats)) => {
            let mut observability = state.observability.lock();
            observability.record_call(CallLogEntry::new(
                request_id.clone(),
                text_count,
                latency,
                stats.cache_hits,
                stats.cache_misses,
                stats.batches_dispatched,
                stats.retried_indices,
                true,
            ));
            observability.record_degradations(state.facade.drain_degradation_events());
            drop(observability);

            Ok(Json(EmbedResponse {
                embeddings: vectors.into_iter().map(|v| v.into_vec()).collect(),
                metadata: EmbedMetadata {
                    request_id,
                    count: text_count,
                },
                performance: EmbedPerformance {
                    latency_ms: latency.as_millis() as u64,
                    cache_hits: stats.cache_hits,
                    cache_misses: stats.cache_misses,
                    batches_dispatched: stats.batches_dispatched,
                    retried_indices: stats.retried_indices,
                },
            }))
        }
        Err(err) => {
            let mut observability = state.observability.lock();
            observability.record_call(CallLogEntry::new(request_id.clone(), text_count, latency, 0, 0, 0, 0, false));
            observability.record_degradations(state.facade.drain_degradation_events());
            drop(observability);
            Err(ApiError::with_request_id(err, request_id))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    health: embed_observability::health::HealthReport,
    recommendations: Vec<embed_observability::health::Recommendation>,
    degradation_alerts: Vec<embed_observability::degradation::DegradationAlert>,
    metrics: serde_json::Value,
    registered_clients: usize,
}

pub async fn status(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<StatusResponse>, ApiError> {
    observe_request(&state, &headers);
    let snapshot = health_snapshot(&state);
    let mut observability = state.observability.lock();
    let health = observability.health_report(snapshot).map_err(ApiError::new)?;
    let recommendations = observability.recommendations();
    let degradation_alerts = observability.degradation_alerts();
    let metrics = observability.metrics_snapshot().map_err(ApiError::new)?;
    drop(observability);

    Ok(Json(StatusResponse {
        health,
        recommendations,
        degradation_alerts,
        metrics,
        registered_clients: state.registry.len(),
    }))
}

/// Idle duration past which a registered client is reaped even without an
/// explicit deregister, guarding against clients that crash without
/// cleaning up. Run on a slow background tick by `main`, not per-request.
pub fn reap_interval() -> Duration {
    Duration::from_secs(60)
}
