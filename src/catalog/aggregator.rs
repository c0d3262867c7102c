//! Federated catalog aggregation
//!
//! Queries every registered node through the bound backend and merges the
//! answers into one ordered snapshot. A load either produces a complete
//! snapshot or an error; a failed load leaves the previous snapshot in place.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use super::normalize::normalize_scope;
use super::types::{CatalogNodeScope, CatalogQueryNode, CatalogSnapshot};
use crate::backend::{BackendReadiness, FederationApi, ReadinessPolicy};
use crate::nodes::{EMBEDDED_NODE_ID, NodeRegistry};
use crate::{Error, Result};

/// Order scopes: the preferred node first, the rest by name then id
pub fn order_scopes(scopes: &mut [CatalogNodeScope], preferred_node_id: &str) {
    scopes.sort_by(|a, b| {
        match (a.node_id == preferred_node_id, b.node_id == preferred_node_id) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        a.node_name
            .to_lowercase()
            .cmp(&b.node_name.to_lowercase())
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
}

#[derive(Debug, Default)]
struct CatalogState {
    snapshot: Option<Arc<CatalogSnapshot>>,
    last_error: Option<String>,
}

/// Process-wide merged catalog
pub struct FederatedCatalog {
    registry: Arc<dyn NodeRegistry>,
    backend: Arc<dyn BackendReadiness>,
    api: Arc<dyn FederationApi>,
    bound_node_id: Option<String>,
    readiness: ReadinessPolicy,
    state: RwLock<CatalogState>,
    reload_lock: Mutex<()>,
}

impl FederatedCatalog {
    /// Create an empty catalog over the given collaborators
    #[must_use]
    pub fn new(
        registry: Arc<dyn NodeRegistry>,
        backend: Arc<dyn BackendReadiness>,
        api: Arc<dyn FederationApi>,
    ) -> Self {
        Self {
            registry,
            backend,
            api,
            bound_node_id: None,
            readiness: ReadinessPolicy::default(),
            state: RwLock::new(CatalogState::default()),
            reload_lock: Mutex::new(()),
        }
    }

    /// Node the viewing window is bound to; its scope sorts first
    #[must_use]
    pub fn with_bound_node(mut self, node_id: impl Into<String>) -> Self {
        self.bound_node_id = Some(node_id.into());
        self
    }

    /// Override the readiness wait
    #[must_use]
    pub const fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    /// Node whose scope is placed first
    #[must_use]
    pub fn preferred_node_id(&self) -> &str {
        self.bound_node_id.as_deref().unwrap_or(EMBEDDED_NODE_ID)
    }

    /// Last successfully loaded snapshot, if any
    pub async fn snapshot(&self) -> Option<Arc<CatalogSnapshot>> {
        self.state.read().await.snapshot.clone()
    }

    /// Error from the most recent failed load, cleared on success
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Return the cached snapshot, loading it on first use
    ///
    /// # Errors
    ///
    /// Returns error if no snapshot is cached and a fresh load fails
    pub async fn load_catalog(&self) -> Result<Arc<CatalogSnapshot>> {
        if let Some(snapshot) = self.snapshot().await {
            return Ok(snapshot);
        }
        self.reload_catalog().await
    }

    /// Query every registered node and replace the cached snapshot
    ///
    /// Concurrent reloads are serialized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendNotReady`] if the bound backend does not come
    /// up in time (no query is sent), or the query error otherwise
    pub async fn reload_catalog(&self) -> Result<Arc<CatalogSnapshot>> {
        let _reload = self.reload_lock.lock().await;

        match self.fetch().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                let mut state = self.state.write().await;
                state.snapshot = Some(snapshot.clone());
                state.last_error = None;
                tracing::info!(scopes = snapshot.scopes.len(), "federated catalog loaded");
                Ok(snapshot)
            }
            Err(e) => {
                tracing::warn!(error = %e, "federated catalog load failed");
                self.state.write().await.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> Result<CatalogSnapshot> {
        self.registry.initialize().await?;

        let ready = self
            .backend
            .wait_for_bound_backend_ready(self.readiness.timeout, self.readiness.poll)
            .await;
        if !ready {
            let detail = self
                .backend
                .last_error()
                .unwrap_or_else(|| "readiness wait timed out".to_string());
            return Err(Error::BackendNotReady(detail));
        }

        let nodes = self.registry.nodes().await;
        let request: Vec<CatalogQueryNode> = nodes.iter().map(CatalogQueryNode::from).collect();
        let answered = self.api.query_catalog(&request).await?;

        let mut seen = HashSet::new();
        let mut scopes: Vec<CatalogNodeScope> = answered
            .into_iter()
            .map(normalize_scope)
            .filter(|scope| seen.insert(scope.node_id.clone()))
            .collect();

        for node in &nodes {
            if !seen.contains(&node.id) {
                tracing::debug!(node_id = %node.id, "node missing from catalog answer");
                scopes.push(CatalogNodeScope::unreachable(
                    node,
                    "node did not answer the catalog query",
                ));
            }
        }

        order_scopes(&mut scopes, self.preferred_node_id());

        Ok(CatalogSnapshot {
            scopes,
            loaded_at: Utc::now(),
        })
    }
}
