//! Federated catalog types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::normalize;
use crate::nodes::{NodeProfile, NodeType};

/// Health of one node's catalog slice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogNodeStatus {
    Ready,
    #[default]
    Degraded,
    Unreachable,
}

/// An agent definition as listed by its home node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogAgentRef {
    #[serde(default, deserialize_with = "normalize::string_or_empty")]
    pub home_node_id: String,
    pub definition_id: String,
    pub name: String,
    #[serde(default, deserialize_with = "normalize::string_or_empty")]
    pub role: String,
    #[serde(default, deserialize_with = "normalize::string_or_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, deserialize_with = "normalize::string_list")]
    pub tool_names: Vec<String>,
    #[serde(default, deserialize_with = "normalize::string_list")]
    pub skill_names: Vec<String>,
}

/// A team definition as listed by its home node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTeamRef {
    #[serde(default, deserialize_with = "normalize::string_or_empty")]
    pub home_node_id: String,
    pub definition_id: String,
    pub name: String,
    #[serde(default, deserialize_with = "normalize::string_or_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, deserialize_with = "normalize::count")]
    pub member_count: u32,
    #[serde(default, deserialize_with = "normalize::count")]
    pub nested_team_count: u32,
}

/// One node's slice of the federated catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogNodeScope {
    pub node_id: String,
    #[serde(default, deserialize_with = "normalize::string_or_empty")]
    pub node_name: String,
    #[serde(default, deserialize_with = "normalize::string_or_empty")]
    pub base_url: String,
    #[serde(default, deserialize_with = "normalize::status")]
    pub status: CatalogNodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, deserialize_with = "normalize::lenient_entries")]
    pub agents: Vec<CatalogAgentRef>,
    #[serde(default, deserialize_with = "normalize::lenient_entries")]
    pub teams: Vec<CatalogTeamRef>,
}

impl CatalogNodeScope {
    /// Placeholder for a registered node the catalog endpoint did not answer for
    #[must_use]
    pub fn unreachable(node: &NodeProfile, message: impl Into<String>) -> Self {
        Self {
            node_id: node.id.clone(),
            node_name: node.name.clone(),
            base_url: node.base_url.clone(),
            status: CatalogNodeStatus::Unreachable,
            error_message: Some(message.into()),
            agents: Vec::new(),
            teams: Vec::new(),
        }
    }
}

/// A node as sent in the catalog query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQueryNode {
    pub node_id: String,
    pub node_name: String,
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
}

impl From<&NodeProfile> for CatalogQueryNode {
    fn from(node: &NodeProfile) -> Self {
        Self {
            node_id: node.id.clone(),
            node_name: node.name.clone(),
            base_url: node.base_url.clone(),
            node_type: Some(node.node_type),
        }
    }
}

/// Agent annotated with the scope it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogAgentEntry {
    #[serde(flatten)]
    pub agent: CatalogAgentRef,
    pub node_id: String,
    pub node_name: String,
    pub node_status: CatalogNodeStatus,
}

/// Team annotated with the scope it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTeamEntry {
    #[serde(flatten)]
    pub team: CatalogTeamRef,
    pub node_id: String,
    pub node_name: String,
    pub node_status: CatalogNodeStatus,
}

/// An ordered, normalized, complete catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub scopes: Vec<CatalogNodeScope>,
    pub loaded_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    /// Every agent across all scopes, in scope order
    #[must_use]
    pub fn all_agents(&self) -> Vec<CatalogAgentEntry> {
        self.scopes
            .iter()
            .flat_map(|scope| {
                scope.agents.iter().map(|agent| CatalogAgentEntry {
                    agent: agent.clone(),
                    node_id: scope.node_id.clone(),
                    node_name: scope.node_name.clone(),
                    node_status: scope.status,
                })
            })
            .collect()
    }

    /// Every team across all scopes, in scope order
    #[must_use]
    pub fn all_teams(&self) -> Vec<CatalogTeamEntry> {
        self.scopes
            .iter()
            .flat_map(|scope| {
                scope.teams.iter().map(|team| CatalogTeamEntry {
                    team: team.clone(),
                    node_id: scope.node_id.clone(),
                    node_name: scope.node_name.clone(),
                    node_status: scope.status,
                })
            })
            .collect()
    }

    /// Look up an agent by its composite identity
    #[must_use]
    pub fn find_agent(&self, home_node_id: &str, definition_id: &str) -> Option<&CatalogAgentRef> {
        self.scopes
            .iter()
            .flat_map(|s| s.agents.iter())
            .find(|a| a.home_node_id == home_node_id && a.definition_id == definition_id)
    }

    /// Look up a team by its composite identity
    #[must_use]
    pub fn find_team(&self, home_node_id: &str, definition_id: &str) -> Option<&CatalogTeamRef> {
        self.scopes
            .iter()
            .flat_map(|s| s.teams.iter())
            .find(|t| t.home_node_id == home_node_id && t.definition_id == definition_id)
    }

    /// Scope for one node
    #[must_use]
    pub fn scope(&self, node_id: &str) -> Option<&CatalogNodeScope> {
        self.scopes.iter().find(|s| s.node_id == node_id)
    }
}
