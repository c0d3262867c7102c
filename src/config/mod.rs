//! Configuration management for the node federation host

pub mod file;

use std::time::Duration;

use url::Url;

use crate::backend::ReadinessPolicy;
use crate::commands::DEFAULT_MAX_PENDING_PER_NODE;
use crate::host::DEFAULT_SEEN_COMMAND_CAPACITY;
use crate::nodes::{EMBEDDED_NODE_ID, NodeProfile};
use crate::{Error, Result};

/// Default bound backend address
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:29695";

/// Default host API port
pub const DEFAULT_API_PORT: u16 = 29700;

/// Node federation host configuration
#[derive(Debug, Clone)]
pub struct FederationConfig {
    /// Id of the always-present embedded node
    pub embedded_node_id: String,

    /// Display name of the embedded node
    pub embedded_node_name: String,

    /// Base URL of the backend the host window is bound to
    pub backend_url: String,

    /// Node the host window is bound to; `None` means the embedded node
    pub bound_node_id: Option<String>,

    /// Discovery loop configuration
    pub discovery: DiscoveryConfig,

    /// Relay bounds
    pub relay: RelayConfig,

    /// HTTP API server configuration
    pub api_server: ApiServerConfig,

    /// Nodes registered by hand at startup
    pub manual_nodes: Vec<ManualNode>,
}

/// Discovery loop configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Run the periodic reconciliation under `serve`
    pub enabled: bool,

    /// Time between reconciliations
    pub interval: Duration,

    /// Upper bound on each readiness wait
    pub ready_timeout: Duration,

    /// Delay between readiness probes
    pub ready_poll: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let readiness = ReadinessPolicy::default();
        Self {
            enabled: true,
            interval: Duration::from_secs(10),
            ready_timeout: readiness.timeout,
            ready_poll: readiness.poll,
        }
    }
}

impl DiscoveryConfig {
    /// Readiness wait used by discovery and catalog loads
    #[must_use]
    pub const fn readiness(&self) -> ReadinessPolicy {
        ReadinessPolicy {
            timeout: self.ready_timeout,
            poll: self.ready_poll,
        }
    }
}

/// Relay bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Queue depth per node before the oldest command is dropped
    pub max_pending_per_node: usize,

    /// Number of command ids remembered for idempotent dispatch
    pub seen_command_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_pending_per_node: DEFAULT_MAX_PENDING_PER_NODE,
            seen_command_capacity: DEFAULT_SEEN_COMMAND_CAPACITY,
        }
    }
}

/// HTTP API server configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,
}

/// A node listed in the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualNode {
    pub id: String,
    pub name: String,
    pub base_url: String,
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

impl FederationConfig {
    /// Load configuration from the environment and the TOML config file
    ///
    /// # Errors
    ///
    /// Returns error if the resulting backend URL is not a valid URL
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// Precedence is env > file > default.
    ///
    /// # Errors
    ///
    /// Returns error if the resulting backend URL is not a valid URL
    pub fn from_sources(
        fc: file::FederationConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let embedded_node_id = env("NODEFED_EMBEDDED_NODE_ID")
            .or(fc.embedded.node_id)
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| EMBEDDED_NODE_ID.to_string());
        let embedded_node_name = env("NODEFED_EMBEDDED_NODE_NAME")
            .or(fc.embedded.node_name)
            .unwrap_or_else(|| "Embedded Node".to_string());

        let backend_url = env("NODEFED_BACKEND_URL")
            .or(fc.backend.url)
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        Url::parse(&backend_url)
            .map_err(|e| Error::Config(format!("invalid backend url '{backend_url}': {e}")))?;

        let bound_node_id = env("NODEFED_BOUND_NODE_ID")
            .or(fc.backend.bound_node_id)
            .filter(|id| !id.trim().is_empty());

        // Discovery (env > toml > default)
        let defaults = DiscoveryConfig::default();
        let interval_secs = env("NODEFED_DISCOVERY_INTERVAL")
            .and_then(|s| s.parse().ok())
            .or(fc.discovery.interval_secs)
            .unwrap_or(defaults.interval.as_secs())
            .max(1);
        let discovery = DiscoveryConfig {
            enabled: env("NODEFED_DISCOVERY_ENABLED")
                .map(|v| parse_flag(&v))
                .or(fc.discovery.enabled)
                .unwrap_or(defaults.enabled),
            interval: Duration::from_secs(interval_secs),
            ready_timeout: fc
                .discovery
                .ready_timeout_ms
                .map_or(defaults.ready_timeout, Duration::from_millis),
            ready_poll: fc
                .discovery
                .ready_poll_ms
                .map_or(defaults.ready_poll, Duration::from_millis),
        };

        let relay_defaults = RelayConfig::default();
        let relay = RelayConfig {
            max_pending_per_node: env("NODEFED_MAX_PENDING_PER_NODE")
                .and_then(|s| s.parse().ok())
                .or(fc.relay.max_pending_per_node)
                .unwrap_or(relay_defaults.max_pending_per_node),
            seen_command_capacity: fc
                .relay
                .seen_command_capacity
                .unwrap_or(relay_defaults.seen_command_capacity),
        };

        let api_server = ApiServerConfig {
            port: env("NODEFED_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.api.port)
                .unwrap_or(DEFAULT_API_PORT),
        };

        let manual_nodes = fc
            .manual_nodes
            .into_iter()
            .map(|n| ManualNode {
                id: n.id,
                name: n.name,
                base_url: n.base_url,
            })
            .collect();

        Ok(Self {
            embedded_node_id,
            embedded_node_name,
            backend_url,
            bound_node_id,
            discovery,
            relay,
            api_server,
            manual_nodes,
        })
    }

    /// Profile for the embedded node, served by the bound backend
    #[must_use]
    pub fn embedded_node(&self) -> NodeProfile {
        NodeProfile::embedded(
            &self.embedded_node_id,
            &self.embedded_node_name,
            &self.backend_url,
        )
    }

    /// Profiles for the configured manual nodes
    #[must_use]
    pub fn manual_node_profiles(&self) -> Vec<NodeProfile> {
        self.manual_nodes
            .iter()
            .map(|n| NodeProfile::manual(&n.id, &n.name, &n.base_url))
            .collect()
    }

    /// Node whose catalog scope sorts first and whose runs are local
    #[must_use]
    pub fn source_node_id(&self) -> &str {
        self.bound_node_id
            .as_deref()
            .unwrap_or(&self.embedded_node_id)
    }
}
