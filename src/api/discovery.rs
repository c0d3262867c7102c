//! Discovery status and manual sync

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use super::{ApiResult, ApiState};
use crate::discovery::{DiscoveryStatus, SyncOutcome};

/// Build discovery routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/sync", post(sync_now))
        .with_state(state)
}

async fn status(State(state): State<Arc<ApiState>>) -> Json<DiscoveryStatus> {
    Json(state.discovery.status().await)
}

/// Run one reconciliation without waiting for the next tick
async fn sync_now(State(state): State<Arc<ApiState>>) -> ApiResult<Json<SyncOutcome>> {
    Ok(Json(state.discovery.sync_once().await?))
}
