//! Maps [`EmbedError`] onto an HTTP status code and a `{error: {...}}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use embed_core::errors::EmbedError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

/// Wraps an [`EmbedError`] for a handler's return type, carrying along the
/// caller's `request_id` (if any) so it can be echoed back in the body.
pub struct ApiError {
    pub err: EmbedError,
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn new(err: EmbedError) -> Self {
        Self { err, request_id: None }
    }

    pub fn with_request_id(err: EmbedError, request_id: Option<String>) -> Self {
        Self { err, request_id }
    }
}

impl From<EmbedError> for ApiError {
    fn from(err: EmbedError) -> Self {
        ApiError::new(err)
    }
}

fn status_for(err: &EmbedError) -> StatusCode {
    match err {
        EmbedError::InvalidInput { .. } | EmbedError::InvalidVector { .. } => StatusCode::BAD_REQUEST,
        EmbedError::Overloaded { .. } => StatusCode::TOO_MANY_REQUESTS,
        EmbedError::Draining | EmbedError::Degraded { .. } => StatusCode::SERVICE_UNAVAILABLE,
        EmbedError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn detail_for(err: &EmbedError) -> Option<serde_json::Value> {
    match err {
        EmbedError::Partial {
            missing_indices,
            missing_count,
            total,
        } => Some(serde_json::json!({
            "missing_indices": missing_indices,
            "missing_count": missing_count,
            "total": total,
        })),
        EmbedError::Timeout { elapsed_ms } => Some(serde_json::json!({ "elapsed_ms": elapsed_ms })),
        _ => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.err);
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.err.kind(),
                message: self.err.to_string(),
                detail: detail_for(&self.err),
                request_id: self.request_id,
            },
        };
        (status, Json(body)).into_response()
    }
}
