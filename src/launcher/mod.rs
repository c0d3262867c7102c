//! Starting runs from catalog entries
//!
//! A run of a definition that lives on the current window's node starts
//! locally. Anything else is handed off to the window that hosts the
//! definition's home node.

pub mod local;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

pub use local::BackendRunSurface;

use crate::catalog::{CatalogAgentRef, CatalogTeamRef};
use crate::commands::{NodeWindowCommand, StartAgentRunPayload, StartTeamRunPayload};
use crate::host::WindowHost;
use crate::nodes::EMBEDDED_NODE_ID;
use crate::{Error, Result};

/// Reason used when a handoff is refused without one
pub const GENERIC_REJECTION: &str = "remote node rejected the run handoff";

/// Agent or team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Agent,
    Team,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent => f.write_str("agent"),
            Self::Team => f.write_str("team"),
        }
    }
}

/// What the user picked in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReference {
    pub home_node_id: String,
    pub definition_id: String,
    pub name: String,
}

impl From<&CatalogAgentRef> for RunReference {
    fn from(agent: &CatalogAgentRef) -> Self {
        Self {
            home_node_id: agent.home_node_id.clone(),
            definition_id: agent.definition_id.clone(),
            name: agent.name.clone(),
        }
    }
}

impl From<&CatalogTeamRef> for RunReference {
    fn from(team: &CatalogTeamRef) -> Self {
        Self {
            home_node_id: team.home_node_id.clone(),
            definition_id: team.definition_id.clone(),
            name: team.name.clone(),
        }
    }
}

/// A definition available on the local node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDefinition {
    pub id: String,
    pub name: String,
}

/// The local node's definitions and run surface
#[async_trait]
pub trait LocalRunSurface: Send + Sync {
    /// Definitions of `kind` on the local node
    async fn fetch_definitions(&self, kind: RunKind) -> Result<Vec<LocalDefinition>>;

    /// Apply `definition` to the run configuration and open the run surface
    async fn open_run(&self, kind: RunKind, definition: &LocalDefinition) -> Result<()>;
}

/// What a launch did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LaunchOutcome {
    /// Opened on this node
    Local { definition_id: String },
    /// Handed to the home node's window
    Remote {
        command_id: String,
        window_id: Option<String>,
        window_created: bool,
        delivered: bool,
        queued: bool,
    },
}

/// Decides between a local run and a cross-node handoff
pub struct RunLauncher {
    source_node_id: String,
    local: Arc<dyn LocalRunSurface>,
    host: Option<Arc<dyn WindowHost>>,
    local_definitions: Mutex<HashMap<RunKind, Vec<LocalDefinition>>>,
}

impl RunLauncher {
    /// Create a launcher for a window bound to `source_node_id`
    ///
    /// `None` means the embedded node. Without a `host`, remote launches
    /// fail with [`Error::TransportUnavailable`].
    #[must_use]
    pub fn new(
        source_node_id: Option<String>,
        local: Arc<dyn LocalRunSurface>,
        host: Option<Arc<dyn WindowHost>>,
    ) -> Self {
        Self {
            source_node_id: source_node_id.unwrap_or_else(|| EMBEDDED_NODE_ID.to_string()),
            local,
            host,
            local_definitions: Mutex::new(HashMap::new()),
        }
    }

    /// Node the current window is bound to
    #[must_use]
    pub fn source_node_id(&self) -> &str {
        &self.source_node_id
    }

    /// Drop cached local definitions so the next local launch refetches
    pub async fn invalidate_local_definitions(&self) {
        self.local_definitions.lock().await.clear();
    }

    /// Launch an agent run
    ///
    /// # Errors
    ///
    /// See [`Self::launch`]
    pub async fn launch_agent(&self, agent: &CatalogAgentRef) -> Result<LaunchOutcome> {
        self.launch(RunKind::Agent, &RunReference::from(agent)).await
    }

    /// Launch a team run
    ///
    /// # Errors
    ///
    /// See [`Self::launch`]
    pub async fn launch_team(&self, team: &CatalogTeamRef) -> Result<LaunchOutcome> {
        self.launch(RunKind::Team, &RunReference::from(team)).await
    }

    /// Launch a run of `reference`, locally or on its home node
    ///
    /// # Errors
    ///
    /// Returns [`Error::DefinitionUnavailable`] for a stale local id,
    /// [`Error::TransportUnavailable`] when no window host is attached, and
    /// [`Error::HandoffRejected`] carrying the host's reason verbatim
    pub async fn launch(&self, kind: RunKind, reference: &RunReference) -> Result<LaunchOutcome> {
        if reference.home_node_id == self.source_node_id {
            self.launch_local(kind, reference).await
        } else {
            self.launch_remote(kind, reference).await
        }
    }

    async fn launch_local(&self, kind: RunKind, reference: &RunReference) -> Result<LaunchOutcome> {
        let definition = {
            let mut cache = self.local_definitions.lock().await;
            let definitions = cache.entry(kind).or_default();
            if definitions.is_empty() {
                *definitions = self.local.fetch_definitions(kind).await?;
                tracing::debug!(%kind, count = definitions.len(), "loaded local definitions");
            }
            definitions
                .iter()
                .find(|d| d.id == reference.definition_id)
                .cloned()
        };

        let Some(definition) = definition else {
            return Err(Error::DefinitionUnavailable(reference.definition_id.clone()));
        };

        self.local.open_run(kind, &definition).await?;
        tracing::info!(%kind, definition_id = %definition.id, "started local run");
        Ok(LaunchOutcome::Local {
            definition_id: definition.id,
        })
    }

    async fn launch_remote(
        &self,
        kind: RunKind,
        reference: &RunReference,
    ) -> Result<LaunchOutcome> {
        let Some(host) = &self.host else {
            return Err(Error::TransportUnavailable);
        };

        let command = self.build_command(kind, reference);
        let node_id = reference.home_node_id.as_str();

        let ready = host.ensure_node_window_ready(node_id).await?;
        let result = host.dispatch_node_window_command(node_id, &command).await?;

        if !result.accepted {
            let reason = result
                .reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| GENERIC_REJECTION.to_string());
            tracing::warn!(node_id, command_id = %command.command_id, reason = %reason, "run handoff rejected");
            return Err(Error::HandoffRejected(reason));
        }

        tracing::info!(
            node_id,
            %kind,
            command_id = %command.command_id,
            delivered = result.delivered,
            "run handed off to home node"
        );
        Ok(LaunchOutcome::Remote {
            command_id: command.command_id,
            window_id: result.window_id.or(Some(ready.window_id)),
            window_created: ready.created,
            delivered: result.delivered,
            queued: result.queued,
        })
    }

    fn build_command(&self, kind: RunKind, reference: &RunReference) -> NodeWindowCommand {
        let command_id = Uuid::new_v4().to_string();
        let issued_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        match kind {
            RunKind::Agent => NodeWindowCommand::start_agent_run(
                command_id,
                issued_at,
                StartAgentRunPayload {
                    agent_definition_id: reference.definition_id.clone(),
                    agent_name: reference.name.clone(),
                    source_node_id: self.source_node_id.clone(),
                    home_node_id: reference.home_node_id.clone(),
                },
            ),
            RunKind::Team => NodeWindowCommand::start_team_run(
                command_id,
                issued_at,
                StartTeamRunPayload {
                    team_definition_id: reference.definition_id.clone(),
                    team_name: reference.name.clone(),
                    source_node_id: self.source_node_id.clone(),
                    home_node_id: reference.home_node_id.clone(),
                },
            ),
        }
    }
}
