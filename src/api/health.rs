//! Health check endpoints

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use super::ApiState;

/// Readiness probes on `/ready` are kept short so load balancers don't stall
const READY_PROBE_TIMEOUT: Duration = Duration::from_millis(500);
const READY_PROBE_POLL: Duration = Duration::from_millis(100);

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub backend: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub discovery_running: bool,
}

/// Liveness probe
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe: is the bound backend answering?
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let backend_ready = state
        .backend
        .wait_for_bound_backend_ready(READY_PROBE_TIMEOUT, READY_PROBE_POLL)
        .await;
    let discovery_running = state.discovery.is_running();

    if backend_ready {
        (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                backend: "ok",
                message: None,
                discovery_running,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                backend: "fail",
                message: state.backend.last_error(),
                discovery_running,
            }),
        )
    }
}

/// Build health routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state)
}
