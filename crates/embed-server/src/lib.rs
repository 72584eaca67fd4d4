//! Router construction, split out from the `main.rs` binary so the HTTP
//! surface can be exercised directly in integration tests without binding
//! a real socket.

pub mod error_response;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/register-client", post(handlers::register_client))
        .route("/deregister-client", post(handlers::deregister_client))
        .route("/embed", post(handlers::embed))
        .route("/status", get(handlers::status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
