//! Registry of known federation nodes

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::types::{
    DiscoveredNodePeer, NodeProfile, NodeType, RegistrationSource, normalize_base_url,
};
use crate::{Error, Result};

/// Authoritative list of nodes the host knows about
///
/// All mutation goes through these methods; callers never edit profiles
/// in place.
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    /// Seed the registry; safe to call repeatedly
    async fn initialize(&self) -> Result<()>;

    /// Snapshot of every registered node, in registration order
    async fn nodes(&self) -> Vec<NodeProfile>;

    /// Look up a single node
    async fn get(&self, node_id: &str) -> Option<NodeProfile>;

    /// Insert or refresh a discovered peer
    ///
    /// Returns `true` only when the registry visibly changed. A refresh that
    /// only bumps `last_seen_at` is not a change.
    async fn upsert_discovered_node(&self, peer: &DiscoveredNodePeer) -> Result<bool>;

    /// Remove discovered nodes by id, returning how many were removed
    ///
    /// Ids that are not tagged `discovered` are left alone.
    async fn prune_discovered_nodes(&self, node_ids: &[String]) -> Result<usize>;

    /// Register a node by hand
    async fn add_manual_node(&self, profile: NodeProfile) -> Result<()>;

    /// Remove a non-system node
    async fn remove_node(&self, node_id: &str) -> Result<NodeProfile>;
}

#[derive(Debug, Default)]
struct RegistryState {
    initialized: bool,
    nodes: Vec<NodeProfile>,
}

/// In-process registry backed by a vector under a lock
#[derive(Debug)]
pub struct InMemoryNodeRegistry {
    embedded: NodeProfile,
    seed_manual: Vec<NodeProfile>,
    state: RwLock<RegistryState>,
}

impl InMemoryNodeRegistry {
    /// Create a registry that will hold `embedded` as its system node
    #[must_use]
    pub fn new(embedded: NodeProfile) -> Self {
        Self {
            embedded,
            seed_manual: Vec::new(),
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Register these nodes as manual entries during initialization
    #[must_use]
    pub fn with_manual_nodes(mut self, nodes: Vec<NodeProfile>) -> Self {
        self.seed_manual = nodes;
        self
    }

    /// Id of the system node
    #[must_use]
    pub fn embedded_node_id(&self) -> &str {
        &self.embedded.id
    }

    /// Whether `initialize` has run
    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.initialized
    }

    /// Number of registered nodes
    pub async fn len(&self) -> usize {
        self.state.read().await.nodes.len()
    }

    /// Whether the registry holds no nodes
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.nodes.is_empty()
    }
}

fn find_by_address<'a>(nodes: &'a [NodeProfile], base_url: &str) -> Option<&'a NodeProfile> {
    let wanted = normalize_base_url(base_url);
    nodes
        .iter()
        .find(|n| normalize_base_url(&n.base_url) == wanted)
}

#[async_trait]
impl NodeRegistry for InMemoryNodeRegistry {
    async fn initialize(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if state.initialized {
            return Ok(());
        }

        state.nodes.retain(|n| n.id != self.embedded.id);
        state.nodes.insert(0, self.embedded.clone());

        for manual in &self.seed_manual {
            if state.nodes.iter().any(|n| n.id == manual.id) {
                tracing::warn!(node_id = %manual.id, "duplicate manual node id ignored");
                continue;
            }
            state.nodes.push(manual.clone());
        }

        state.initialized = true;
        tracing::debug!(count = state.nodes.len(), "node registry initialized");
        Ok(())
    }

    async fn nodes(&self) -> Vec<NodeProfile> {
        self.state.read().await.nodes.clone()
    }

    async fn get(&self, node_id: &str) -> Option<NodeProfile> {
        self.state
            .read()
            .await
            .nodes
            .iter()
            .find(|n| n.id == node_id)
            .cloned()
    }

    async fn upsert_discovered_node(&self, peer: &DiscoveredNodePeer) -> Result<bool> {
        let node_id = peer.node_id.trim();
        let base_url = peer.effective_base_url().trim();
        if node_id.is_empty() || base_url.is_empty() {
            tracing::warn!(node_id = %peer.node_id, "discovered peer without id or address ignored");
            return Ok(false);
        }

        let mut state = self.state.write().await;
        let now = Utc::now();

        if let Some(existing) = state.nodes.iter_mut().find(|n| n.id == node_id) {
            if existing.registration_source != RegistrationSource::Discovered {
                tracing::debug!(
                    node_id,
                    source = ?existing.registration_source,
                    "discovery report ignored for non-discovered node"
                );
                return Ok(false);
            }

            let capabilities = peer.capabilities.unwrap_or(existing.capabilities);
            // A peer that reports no name keeps the one it registered with
            let name = if peer.node_name.trim().is_empty() {
                existing.name.clone()
            } else {
                peer.display_name().to_string()
            };
            let changed = existing.name != name
                || existing.base_url != base_url
                || existing.trust_mode != peer.trust_mode
                || existing.capabilities != capabilities;

            existing.last_seen_at = Some(peer.last_seen_at_iso.clone());
            if changed {
                existing.name = name;
                existing.base_url = base_url.to_string();
                existing.trust_mode.clone_from(&peer.trust_mode);
                existing.capabilities = capabilities;
                existing.updated_at = now;
                tracing::info!(node_id, base_url, "discovered node updated");
            }
            return Ok(changed);
        }

        if let Some(owner) = find_by_address(&state.nodes, base_url) {
            if owner.registration_source != RegistrationSource::Discovered {
                tracing::debug!(
                    node_id,
                    owner = %owner.id,
                    base_url,
                    "discovered peer shares an address with a registered node, keeping existing entry"
                );
                return Ok(false);
            }
        }

        state.nodes.push(NodeProfile {
            id: node_id.to_string(),
            name: peer.display_name().to_string(),
            base_url: base_url.to_string(),
            node_type: NodeType::Remote,
            is_system: false,
            registration_source: RegistrationSource::Discovered,
            capabilities: peer.capabilities.unwrap_or_default(),
            trust_mode: peer.trust_mode.clone(),
            last_seen_at: Some(peer.last_seen_at_iso.clone()),
            created_at: now,
            updated_at: now,
        });
        tracing::info!(node_id, base_url, "discovered node registered");
        Ok(true)
    }

    async fn prune_discovered_nodes(&self, node_ids: &[String]) -> Result<usize> {
        if node_ids.is_empty() {
            return Ok(0);
        }

        let mut state = self.state.write().await;
        let before = state.nodes.len();
        state
            .nodes
            .retain(|n| !(n.is_prunable() && node_ids.iter().any(|id| id == &n.id)));
        let removed = before - state.nodes.len();

        if removed > 0 {
            tracing::info!(removed, "pruned stale discovered nodes");
        }
        Ok(removed)
    }

    async fn add_manual_node(&self, mut profile: NodeProfile) -> Result<()> {
        if profile.id.trim().is_empty() || profile.base_url.trim().is_empty() {
            return Err(Error::Registry("node id and base url are required".to_string()));
        }

        let mut state = self.state.write().await;
        if state.nodes.iter().any(|n| n.id == profile.id) {
            return Err(Error::Registry(format!("node '{}' already exists", profile.id)));
        }

        profile.node_type = NodeType::Remote;
        profile.is_system = false;
        profile.registration_source = RegistrationSource::Manual;
        tracing::info!(node_id = %profile.id, base_url = %profile.base_url, "manual node registered");
        state.nodes.push(profile);
        Ok(())
    }

    async fn remove_node(&self, node_id: &str) -> Result<NodeProfile> {
        let mut state = self.state.write().await;
        let Some(index) = state.nodes.iter().position(|n| n.id == node_id) else {
            return Err(Error::NodeNotFound(node_id.to_string()));
        };
        if state.nodes[index].is_system {
            return Err(Error::Registry(format!(
                "system node '{node_id}' cannot be removed"
            )));
        }

        let removed = state.nodes.remove(index);
        tracing::info!(node_id, "node removed");
        Ok(removed)
    }
}
