//! GraphQL client for the bound backend's federation queries

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::catalog::{CatalogNodeScope, CatalogQueryNode};
use crate::nodes::DiscoveredNodePeer;
use crate::{Error, Result};

const DISCOVERY_QUERY: &str = "query DiscoveredNodeCatalog { discoveredNodeCatalog { nodeId nodeName baseUrl advertisedBaseUrl status lastSeenAtIso trustMode capabilities { terminal fileExplorerStreaming } } }";

const CATALOG_QUERY: &str = "query FederatedNodeCatalog($input: FederatedNodeCatalogQueryInput!) { federatedNodeCatalog(input: $input) { nodeId nodeName baseUrl status errorMessage agents { homeNodeId definitionId name role description avatarUrl toolNames skillNames } teams { homeNodeId definitionId name description role avatarUrl memberCount nestedTeamCount } } }";

/// Queries the host needs from the bound backend
#[async_trait]
pub trait FederationApi: Send + Sync {
    /// Current peer list from the discovery endpoint
    async fn discover_peers(&self) -> Result<Vec<DiscoveredNodePeer>>;

    /// One catalog scope per requested node
    async fn query_catalog(&self, nodes: &[CatalogQueryNode]) -> Result<Vec<CatalogNodeScope>>;
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveryData {
    #[serde(default)]
    discovered_node_catalog: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogData {
    #[serde(default)]
    federated_node_catalog: Option<Vec<Value>>,
}

/// Talks to `POST {base_url}/graphql` on the bound backend
#[derive(Debug, Clone)]
pub struct GraphqlFederationClient {
    endpoint: String,
    client: reqwest::Client,
}

impl GraphqlFederationClient {
    /// Create a client for the backend at `base_url`
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a client reusing an existing HTTP client
    #[must_use]
    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            endpoint: format!("{}/graphql", base_url.trim_end_matches('/')),
            client,
        }
    }

    /// GraphQL endpoint this client posts to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Post a GraphQL operation and unwrap the `data`/`errors` envelope
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, a non-2xx status, GraphQL errors,
    /// or a response without `data`
    pub async fn request<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote(format!("graphql request failed {status}: {body}")));
        }

        let parsed: GraphQlResponse<T> = response.json().await?;

        if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
            let msgs: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(Error::Remote(msgs.join(", ")));
        }

        parsed
            .data
            .ok_or_else(|| Error::Remote("graphql response missing data".to_string()))
    }
}

/// Parse each entry on its own so one malformed record does not sink the rest
fn parse_entries<T: DeserializeOwned>(items: Vec<Value>, what: &str) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, kind = what, "dropping malformed entry from backend");
                None
            }
        })
        .collect()
}

#[async_trait]
impl FederationApi for GraphqlFederationClient {
    async fn discover_peers(&self) -> Result<Vec<DiscoveredNodePeer>> {
        let data: DiscoveryData = self.request(DISCOVERY_QUERY, Value::Null).await?;
        let peers = parse_entries(data.discovered_node_catalog.unwrap_or_default(), "peer");
        tracing::debug!(count = peers.len(), "discovery query answered");
        Ok(peers)
    }

    async fn query_catalog(&self, nodes: &[CatalogQueryNode]) -> Result<Vec<CatalogNodeScope>> {
        let variables = serde_json::json!({ "input": { "nodes": nodes } });
        let data: CatalogData = self.request(CATALOG_QUERY, variables).await?;
        let scopes = parse_entries(data.federated_node_catalog.unwrap_or_default(), "scope");
        tracing::debug!(requested = nodes.len(), received = scopes.len(), "catalog query answered");
        Ok(scopes)
    }
}
