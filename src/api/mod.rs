//! HTTP API server for the federation host

pub mod catalog;
pub mod discovery;
pub mod health;
pub mod nodes;
pub mod windows;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::backend::BackendReadiness;
use crate::catalog::FederatedCatalog;
use crate::discovery::NodeDiscoverySync;
use crate::host::{BroadcastWindowSurface, NodeWindowRouter};
use crate::nodes::NodeRegistry;
use crate::{Error, Result};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<dyn NodeRegistry>,
    pub backend: Arc<dyn BackendReadiness>,
    pub catalog: Arc<FederatedCatalog>,
    pub discovery: Arc<NodeDiscoverySync>,
    pub router: Arc<NodeWindowRouter>,
    /// Event source for attached window clients
    pub windows: BroadcastWindowSurface,
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Crate error rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            Error::NodeNotFound(_) => StatusCode::NOT_FOUND,
            Error::Registry(_) => StatusCode::CONFLICT,
            Error::Config(_) | Error::Url(_) | Error::Serialization(_) => StatusCode::BAD_REQUEST,
            Error::BackendNotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Remote(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, status = status.as_u16(), "request failed");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Handler result type
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub fn new(state: ApiState, port: u16) -> Self {
        Self {
            state: Arc::new(state),
            port,
        }
    }

    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let router = Router::new()
            .nest("/api/nodes", nodes::router(self.state.clone()))
            .nest("/api/catalog", catalog::router(self.state.clone()))
            .nest("/api/discovery", discovery::router(self.state.clone()))
            .nest("/api/windows", windows::router(self.state.clone()))
            .nest("/ws/windows", windows::ws_router(self.state.clone()))
            .merge(health::router(self.state.clone()));

        // CORS layer for cross-origin requests from window frontends
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
