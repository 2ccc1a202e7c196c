//! Route configuration.

use crate::channel;
use crate::content;
use crate::state::WorkerState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Network client state: `empty`, `building` or `ready`.
    pub client: &'static str,
}

/// GET /health
pub async fn health(State(state): State<WorkerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        client: state.handle.state_name().await,
    })
}

/// Create the worker router.
///
/// Everything not matched by an explicit route goes to content interception,
/// which answers 404 outside `/ipfs-sw/`.
pub fn create_router(state: WorkerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ipfs-sw/channel", get(channel::ws_handler))
        .fallback(content::intercept)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
