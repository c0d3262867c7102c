//! Node registry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::normalize::string_or_empty;

/// Well-known id of the node bundled with the host
pub const EMBEDDED_NODE_ID: &str = "embedded-local";

/// Whether a node runs inside the host or somewhere else
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Embedded,
    Remote,
}

/// How a node entered the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationSource {
    /// The always-present local node
    Embedded,
    /// Learned from a discovery poll; eligible for pruning
    Discovered,
    /// Added by the user
    Manual,
}

/// Feature flags a node advertises
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeCapabilities {
    pub terminal: bool,
    pub file_explorer_streaming: bool,
}

/// A node known to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProfile {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub node_type: NodeType,
    pub is_system: bool,
    pub registration_source: RegistrationSource,
    pub capabilities: NodeCapabilities,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NodeProfile {
    /// Build the embedded system node
    #[must_use]
    pub fn embedded(id: &str, name: &str, base_url: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            base_url: base_url.to_string(),
            node_type: NodeType::Embedded,
            is_system: true,
            registration_source: RegistrationSource::Embedded,
            capabilities: NodeCapabilities {
                terminal: true,
                file_explorer_streaming: true,
            },
            trust_mode: None,
            last_seen_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a user-registered remote node
    #[must_use]
    pub fn manual(id: &str, name: &str, base_url: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            base_url: base_url.to_string(),
            node_type: NodeType::Remote,
            is_system: false,
            registration_source: RegistrationSource::Manual,
            capabilities: NodeCapabilities::default(),
            trust_mode: None,
            last_seen_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether discovery may remove this node when it stops being reported
    #[must_use]
    pub fn is_prunable(&self) -> bool {
        !self.is_system && self.registration_source == RegistrationSource::Discovered
    }
}

/// Health a peer reports about itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerStatus {
    Ready,
    Degraded,
    Unreachable,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A peer as reported by the discovery endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredNodePeer {
    pub node_id: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub node_name: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub base_url: String,
    #[serde(default)]
    pub advertised_base_url: Option<String>,
    #[serde(default)]
    pub status: PeerStatus,
    #[serde(default, alias = "lastSeenAt", deserialize_with = "string_or_empty")]
    pub last_seen_at_iso: String,
    #[serde(default)]
    pub trust_mode: Option<String>,
    #[serde(default)]
    pub capabilities: Option<NodeCapabilities>,
}

impl DiscoveredNodePeer {
    /// Name to register the peer under, its id when it reports none
    #[must_use]
    pub fn display_name(&self) -> &str {
        let name = self.node_name.trim();
        if name.is_empty() {
            self.node_id.trim()
        } else {
            name
        }
    }

    /// Address the host should use to reach this peer
    ///
    /// Peers behind NAT or a proxy advertise a reachable URL separately
    /// from the one they bind to.
    #[must_use]
    pub fn effective_base_url(&self) -> &str {
        self.advertised_base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(&self.base_url)
    }
}

/// Strip trailing slashes and lowercase the scheme/host for address comparison
#[must_use]
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    match url::Url::parse(trimmed) {
        Ok(parsed) => parsed.as_str().trim_end_matches('/').to_string(),
        Err(_) => trimmed.to_string(),
    }
}
