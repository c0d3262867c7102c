//! Federated catalog endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ApiResult, ApiState};
use crate::catalog::{CatalogAgentEntry, CatalogNodeScope, CatalogSnapshot, CatalogTeamEntry};

/// Catalog with flattened views for list UIs
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub scopes: Vec<CatalogNodeScope>,
    pub agents: Vec<CatalogAgentEntry>,
    pub teams: Vec<CatalogTeamEntry>,
    pub loaded_at: DateTime<Utc>,
}

impl From<&CatalogSnapshot> for CatalogResponse {
    fn from(snapshot: &CatalogSnapshot) -> Self {
        Self {
            scopes: snapshot.scopes.clone(),
            agents: snapshot.all_agents(),
            teams: snapshot.all_teams(),
            loaded_at: snapshot.loaded_at,
        }
    }
}

/// Build catalog routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(get_catalog))
        .route("/reload", post(reload_catalog))
        .with_state(state)
}

async fn get_catalog(State(state): State<Arc<ApiState>>) -> ApiResult<Json<CatalogResponse>> {
    let snapshot = state.catalog.load_catalog().await?;
    Ok(Json(CatalogResponse::from(snapshot.as_ref())))
}

async fn reload_catalog(State(state): State<Arc<ApiState>>) -> ApiResult<Json<CatalogResponse>> {
    let snapshot = state.catalog.reload_catalog().await?;
    Ok(Json(CatalogResponse::from(snapshot.as_ref())))
}
