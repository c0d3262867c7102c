//! Node window endpoints
//!
//! REST endpoints let other processes open windows and dispatch commands.
//! A window client attaches over WebSocket; while attached its node's
//! window counts as ready and receives commands as JSON text frames.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;

use super::{ApiResult, ApiState};
use crate::commands::{DispatchResult, WindowReady};
use crate::host::{WindowHost, WindowStatus};

/// Build window REST routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/{node_id}/ensure", post(ensure_window))
        .route("/{node_id}/commands", post(dispatch_command))
        .route("/{node_id}/pending", get(window_status))
        .with_state(state)
}

/// Build window WebSocket router
pub fn ws_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/{node_id}", get(ws_upgrade))
        .with_state(state)
}

async fn ensure_window(
    State(state): State<Arc<ApiState>>,
    Path(node_id): Path<String>,
) -> ApiResult<Json<WindowReady>> {
    Ok(Json(state.router.ensure_node_window_ready(&node_id).await?))
}

/// Dispatch an untyped command; rejections are reported in the body
async fn dispatch_command(
    State(state): State<Arc<ApiState>>,
    Path(node_id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<DispatchResult>> {
    Ok(Json(state.router.dispatch_raw(&node_id, &body).await?))
}

async fn window_status(
    State(state): State<Arc<ApiState>>,
    Path(node_id): Path<String>,
) -> Json<WindowStatus> {
    Json(state.router.window_status(&node_id).await)
}

/// Handle WebSocket upgrade for a window client
async fn ws_upgrade(
    State(state): State<Arc<ApiState>>,
    Path(node_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    if state.registry.get(&node_id).await.is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }
    ws.on_upgrade(move |socket| handle_window_socket(socket, state, node_id))
}

/// Stream commands to an attached window until it disconnects
async fn handle_window_socket(socket: WebSocket, state: Arc<ApiState>, node_id: String) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before marking ready so drained commands are not missed
    let mut events = state.windows.subscribe(&node_id);

    match state.router.mark_window_ready(&node_id).await {
        Ok(delivered) => {
            tracing::info!(node_id = %node_id, delivered, "window client attached");
        }
        Err(e) => {
            tracing::warn!(node_id = %node_id, error = %e, "window attach failed");
            let _ = sender.close().await;
            return;
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let Ok(json) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                // Commands were lost; detach so the client re-attaches fresh
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(node_id = %node_id, skipped, "window client lagged, detaching");
                    break;
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.router.mark_window_closed(&node_id).await;
    tracing::info!(node_id = %node_id, "window client detached");
}
