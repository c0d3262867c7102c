//! Local run surface backed by the bound backend's definition queries

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{LocalDefinition, LocalRunSurface, RunKind};
use crate::Result;
use crate::backend::GraphqlFederationClient;

const AGENT_DEFINITIONS_QUERY: &str = "query LocalAgentDefinitions { agentDefinitions { id name } }";

const TEAM_DEFINITIONS_QUERY: &str =
    "query LocalTeamDefinitions { agentTeamDefinitions { id name } }";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentDefinitionsData {
    #[serde(default)]
    agent_definitions: Vec<LocalDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamDefinitionsData {
    #[serde(default)]
    agent_team_definitions: Vec<LocalDefinition>,
}

/// Reads local definitions from the bound backend and records the run the
/// caller should open
///
/// There is no UI in this process, so opening a run stores the selection
/// for the caller to act on.
#[derive(Debug)]
pub struct BackendRunSurface {
    client: GraphqlFederationClient,
    opened: Mutex<Option<(RunKind, LocalDefinition)>>,
}

impl BackendRunSurface {
    #[must_use]
    pub fn new(client: GraphqlFederationClient) -> Self {
        Self {
            client,
            opened: Mutex::new(None),
        }
    }

    /// The most recently opened run, if any
    #[must_use]
    pub fn last_opened(&self) -> Option<(RunKind, LocalDefinition)> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LocalRunSurface for BackendRunSurface {
    async fn fetch_definitions(&self, kind: RunKind) -> Result<Vec<LocalDefinition>> {
        match kind {
            RunKind::Agent => {
                let data: AgentDefinitionsData =
                    self.client.request(AGENT_DEFINITIONS_QUERY, Value::Null).await?;
                Ok(data.agent_definitions)
            }
            RunKind::Team => {
                let data: TeamDefinitionsData =
                    self.client.request(TEAM_DEFINITIONS_QUERY, Value::Null).await?;
                Ok(data.agent_team_definitions)
            }
        }
    }

    async fn open_run(&self, kind: RunKind, definition: &LocalDefinition) -> Result<()> {
        tracing::info!(%kind, definition_id = %definition.id, name = %definition.name, "run configuration prepared");
        *self.opened.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((kind, definition.clone()));
        Ok(())
    }
}
