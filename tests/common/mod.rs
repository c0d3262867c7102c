//! Shared test utilities
//!
//! Mock collaborators for the federation seams. Each integration test
//! binary uses a different subset.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use node_federation::backend::{BackendReadiness, FederationApi};
use node_federation::catalog::{
    CatalogAgentRef, CatalogNodeScope, CatalogNodeStatus, CatalogQueryNode, CatalogTeamRef,
    FederatedCatalog,
};
use node_federation::commands::{DispatchResult, NodeWindowCommand, WindowReady};
use node_federation::host::{WindowHost, WindowSurface};
use node_federation::launcher::{LocalDefinition, LocalRunSurface, RunKind};
use node_federation::nodes::{
    DiscoveredNodePeer, EMBEDDED_NODE_ID, InMemoryNodeRegistry, NodeProfile, NodeRegistry,
    PeerStatus,
};
use node_federation::{Error, Result};

/// Registry holding only the embedded node
#[must_use]
pub fn embedded_registry() -> InMemoryNodeRegistry {
    InMemoryNodeRegistry::new(NodeProfile::embedded(
        EMBEDDED_NODE_ID,
        "Embedded Node",
        "http://127.0.0.1:29695",
    ))
}

/// A peer as the discovery endpoint would report it
#[must_use]
pub fn peer(id: &str, name: &str) -> DiscoveredNodePeer {
    DiscoveredNodePeer {
        node_id: id.to_string(),
        node_name: name.to_string(),
        base_url: format!("http://{id}.local:29695"),
        advertised_base_url: None,
        status: PeerStatus::Ready,
        last_seen_at_iso: "2026-01-01T00:00:00Z".to_string(),
        trust_mode: None,
        capabilities: None,
    }
}

#[must_use]
pub fn agent(home: &str, id: &str, name: &str) -> CatalogAgentRef {
    CatalogAgentRef {
        home_node_id: home.to_string(),
        definition_id: id.to_string(),
        name: name.to_string(),
        role: String::new(),
        description: String::new(),
        avatar_url: None,
        tool_names: Vec::new(),
        skill_names: Vec::new(),
    }
}

#[must_use]
pub fn team(home: &str, id: &str, name: &str) -> CatalogTeamRef {
    CatalogTeamRef {
        home_node_id: home.to_string(),
        definition_id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        role: None,
        avatar_url: None,
        member_count: 0,
        nested_team_count: 0,
    }
}

/// Registry wrapper that records every prune request
pub struct SpyRegistry {
    inner: InMemoryNodeRegistry,
    pub prune_calls: Mutex<Vec<Vec<String>>>,
}

impl SpyRegistry {
    #[must_use]
    pub fn new(inner: InMemoryNodeRegistry) -> Self {
        Self {
            inner,
            prune_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn pruned(&self) -> Vec<Vec<String>> {
        self.prune_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeRegistry for SpyRegistry {
    async fn initialize(&self) -> Result<()> {
        self.inner.initialize().await
    }

    async fn nodes(&self) -> Vec<NodeProfile> {
        self.inner.nodes().await
    }

    async fn get(&self, node_id: &str) -> Option<NodeProfile> {
        self.inner.get(node_id).await
    }

    async fn upsert_discovered_node(&self, peer: &DiscoveredNodePeer) -> Result<bool> {
        self.inner.upsert_discovered_node(peer).await
    }

    async fn prune_discovered_nodes(&self, node_ids: &[String]) -> Result<usize> {
        self.prune_calls.lock().unwrap().push(node_ids.to_vec());
        self.inner.prune_discovered_nodes(node_ids).await
    }

    async fn add_manual_node(&self, profile: NodeProfile) -> Result<()> {
        self.inner.add_manual_node(profile).await
    }

    async fn remove_node(&self, node_id: &str) -> Result<NodeProfile> {
        self.inner.remove_node(node_id).await
    }
}

/// Readiness that answers from a flag
pub struct MockReadiness {
    pub ready: AtomicBool,
    pub waits: AtomicUsize,
}

impl MockReadiness {
    #[must_use]
    pub fn new(ready: bool) -> Self {
        Self {
            ready: AtomicBool::new(ready),
            waits: AtomicUsize::new(0),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

#[async_trait]
impl BackendReadiness for MockReadiness {
    async fn wait_for_bound_backend_ready(&self, _timeout: Duration, _poll: Duration) -> bool {
        self.waits.fetch_add(1, Ordering::SeqCst);
        self.ready.load(Ordering::SeqCst)
    }

    fn last_error(&self) -> Option<String> {
        (!self.ready.load(Ordering::SeqCst)).then(|| "connection refused".to_string())
    }
}

/// Federation API with scripted peers and catalog answers
///
/// Without scripted scopes, every requested node answers as a ready scope
/// with no definitions.
#[derive(Default)]
pub struct MockFederationApi {
    pub peers: Mutex<Vec<DiscoveredNodePeer>>,
    pub scopes: Mutex<Option<Vec<CatalogNodeScope>>>,
    pub discovery_delay: Mutex<Option<Duration>>,
    pub fail_discovery: AtomicBool,
    pub fail_catalog: AtomicBool,
    pub discovery_queries: AtomicUsize,
    pub catalog_queries: AtomicUsize,
    pub last_catalog_request: Mutex<Vec<CatalogQueryNode>>,
}

impl MockFederationApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_peers(&self, peers: Vec<DiscoveredNodePeer>) {
        *self.peers.lock().unwrap() = peers;
    }

    pub fn set_scopes(&self, scopes: Vec<CatalogNodeScope>) {
        *self.scopes.lock().unwrap() = Some(scopes);
    }

    pub fn catalog_query_count(&self) -> usize {
        self.catalog_queries.load(Ordering::SeqCst)
    }

    pub fn discovery_query_count(&self) -> usize {
        self.discovery_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FederationApi for MockFederationApi {
    async fn discover_peers(&self) -> Result<Vec<DiscoveredNodePeer>> {
        self.discovery_queries.fetch_add(1, Ordering::SeqCst);
        let delay = *self.discovery_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_discovery.load(Ordering::SeqCst) {
            return Err(Error::Remote("discovery unavailable".to_string()));
        }
        Ok(self.peers.lock().unwrap().clone())
    }

    async fn query_catalog(&self, nodes: &[CatalogQueryNode]) -> Result<Vec<CatalogNodeScope>> {
        self.catalog_queries.fetch_add(1, Ordering::SeqCst);
        *self.last_catalog_request.lock().unwrap() = nodes.to_vec();
        if self.fail_catalog.load(Ordering::SeqCst) {
            return Err(Error::Remote("catalog unavailable".to_string()));
        }

        if let Some(scopes) = self.scopes.lock().unwrap().clone() {
            return Ok(scopes);
        }
        Ok(nodes
            .iter()
            .map(|n| CatalogNodeScope {
                node_id: n.node_id.clone(),
                node_name: n.node_name.clone(),
                base_url: n.base_url.clone(),
                status: CatalogNodeStatus::Ready,
                error_message: None,
                agents: Vec::new(),
                teams: Vec::new(),
            })
            .collect())
    }
}

/// Catalog over the given collaborators
#[must_use]
pub fn catalog(
    registry: Arc<dyn NodeRegistry>,
    readiness: Arc<MockReadiness>,
    api: Arc<MockFederationApi>,
) -> Arc<FederatedCatalog> {
    Arc::new(FederatedCatalog::new(registry, readiness, api))
}

/// Window surface that records what it was asked to do
#[derive(Default)]
pub struct RecordingSurface {
    pub opened: Mutex<Vec<String>>,
    pub delivered: Mutex<Vec<(String, String, NodeWindowCommand)>>,
    pub fail_deliveries: AtomicBool,
    /// Fail after this many successful deliveries
    pub fail_after: Mutex<Option<usize>>,
    /// Time each delivery takes before it is recorded
    pub delivery_delay: Mutex<Option<Duration>>,
}

impl RecordingSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered_ids(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, c)| c.command_id.clone())
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }
}

#[async_trait]
impl WindowSurface for RecordingSurface {
    async fn open_window(&self, node: &NodeProfile) -> Result<String> {
        let mut opened = self.opened.lock().unwrap();
        opened.push(node.id.clone());
        Ok(format!("window-{}-{}", node.id, opened.len()))
    }

    async fn deliver(
        &self,
        window_id: &str,
        node_id: &str,
        command: &NodeWindowCommand,
    ) -> Result<()> {
        let delay = *self.delivery_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_deliveries.load(Ordering::SeqCst) {
            return Err(Error::Window("window went away".to_string()));
        }
        let mut delivered = self.delivered.lock().unwrap();
        if let Some(limit) = *self.fail_after.lock().unwrap() {
            if delivered.len() >= limit {
                return Err(Error::Window("window went away".to_string()));
            }
        }
        delivered.push((window_id.to_string(), node_id.to_string(), command.clone()));
        Ok(())
    }
}

/// Window host that records calls and answers with a scripted result
pub struct MockWindowHost {
    pub ensured: Mutex<Vec<String>>,
    pub dispatched: Mutex<Vec<(String, NodeWindowCommand)>>,
    pub response: Mutex<DispatchResult>,
}

impl MockWindowHost {
    #[must_use]
    pub fn accepting() -> Self {
        Self::answering(DispatchResult::delivered("window-remote"))
    }

    #[must_use]
    pub fn answering(response: DispatchResult) -> Self {
        Self {
            ensured: Mutex::new(Vec::new()),
            dispatched: Mutex::new(Vec::new()),
            response: Mutex::new(response),
        }
    }
}

#[async_trait]
impl WindowHost for MockWindowHost {
    async fn ensure_node_window_ready(&self, node_id: &str) -> Result<WindowReady> {
        self.ensured.lock().unwrap().push(node_id.to_string());
        Ok(WindowReady {
            window_id: "window-remote".to_string(),
            created: true,
        })
    }

    async fn dispatch_node_window_command(
        &self,
        node_id: &str,
        command: &NodeWindowCommand,
    ) -> Result<DispatchResult> {
        self.dispatched
            .lock()
            .unwrap()
            .push((node_id.to_string(), command.clone()));
        Ok(self.response.lock().unwrap().clone())
    }
}

/// Local run surface with fixed definitions
#[derive(Default)]
pub struct MockLocalRunSurface {
    pub definitions: Mutex<HashMap<RunKind, Vec<LocalDefinition>>>,
    pub fetches: AtomicUsize,
    pub opened: Mutex<Vec<(RunKind, String)>>,
}

impl MockLocalRunSurface {
    #[must_use]
    pub fn with(kind: RunKind, definitions: &[(&str, &str)]) -> Self {
        let surface = Self::default();
        surface.definitions.lock().unwrap().insert(
            kind,
            definitions
                .iter()
                .map(|(id, name)| LocalDefinition {
                    id: (*id).to_string(),
                    name: (*name).to_string(),
                })
                .collect(),
        );
        surface
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocalRunSurface for MockLocalRunSurface {
    async fn fetch_definitions(&self, kind: RunKind) -> Result<Vec<LocalDefinition>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .definitions
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }

    async fn open_run(&self, kind: RunKind, definition: &LocalDefinition) -> Result<()> {
        self.opened
            .lock()
            .unwrap()
            .push((kind, definition.id.clone()));
        Ok(())
    }
}
