//! Node registry API endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiResult, ApiState};
use crate::nodes::NodeProfile;

/// Body for registering a node by hand
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddNodeBody {
    pub id: Option<String>,
    pub name: String,
    pub base_url: String,
}

/// Build node routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(list_nodes).post(add_node))
        .route("/{node_id}", delete(remove_node).get(get_node))
        .with_state(state)
}

/// List all registered nodes
async fn list_nodes(State(state): State<Arc<ApiState>>) -> ApiResult<Json<Vec<NodeProfile>>> {
    state.registry.initialize().await?;
    Ok(Json(state.registry.nodes().await))
}

/// Get a specific node
async fn get_node(
    State(state): State<Arc<ApiState>>,
    Path(node_id): Path<String>,
) -> Result<Json<NodeProfile>, StatusCode> {
    state
        .registry
        .get(&node_id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Register a manual node
async fn add_node(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<AddNodeBody>,
) -> ApiResult<(StatusCode, Json<NodeProfile>)> {
    state.registry.initialize().await?;

    let id = body
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("manual-{}", Uuid::new_v4()));
    state
        .registry
        .add_manual_node(NodeProfile::manual(&id, &body.name, &body.base_url))
        .await?;

    let profile = state
        .registry
        .get(&id)
        .await
        .ok_or(crate::Error::NodeNotFound(id))?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Remove a non-system node and forget its window state
async fn remove_node(
    State(state): State<Arc<ApiState>>,
    Path(node_id): Path<String>,
) -> ApiResult<Json<NodeProfile>> {
    let removed = state.registry.remove_node(&node_id).await?;
    state.router.forget_nodes(&[node_id]).await;
    Ok(Json(removed))
}
