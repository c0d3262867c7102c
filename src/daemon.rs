//! Daemon - the federation host service
//!
//! Wires the registry, discovery loop, catalog, window router and HTTP API
//! together and runs them until shutdown.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::{ApiServer, ApiState};
use crate::backend::{GraphqlFederationClient, HttpBackendReadiness};
use crate::catalog::FederatedCatalog;
use crate::commands::CommandRelay;
use crate::config::FederationConfig;
use crate::discovery::NodeDiscoverySync;
use crate::host::{BroadcastWindowSurface, NodeWindowRouter};
use crate::nodes::InMemoryNodeRegistry;
use crate::{Error, Result};

/// Every long-lived component of a federation host
pub struct Federation {
    pub registry: Arc<InMemoryNodeRegistry>,
    pub backend: Arc<HttpBackendReadiness>,
    pub client: Arc<GraphqlFederationClient>,
    pub catalog: Arc<FederatedCatalog>,
    pub windows: BroadcastWindowSurface,
    pub router: Arc<NodeWindowRouter>,
    pub discovery: Arc<NodeDiscoverySync>,
}

impl Federation {
    /// Build all components from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the backend HTTP client cannot be created
    pub fn from_config(config: &FederationConfig) -> Result<Self> {
        let registry = Arc::new(
            InMemoryNodeRegistry::new(config.embedded_node())
                .with_manual_nodes(config.manual_node_profiles()),
        );
        let backend = Arc::new(HttpBackendReadiness::new(&config.backend_url)?);
        let client = Arc::new(GraphqlFederationClient::new(&config.backend_url));
        let readiness = config.discovery.readiness();

        let catalog = Arc::new(
            FederatedCatalog::new(registry.clone(), backend.clone(), client.clone())
                .with_bound_node(config.source_node_id())
                .with_readiness(readiness),
        );

        let windows = BroadcastWindowSurface::new();
        let router = Arc::new(NodeWindowRouter::with_limits(
            registry.clone(),
            Arc::new(windows.clone()),
            CommandRelay::new(config.relay.max_pending_per_node),
            config.relay.seen_command_capacity,
        ));

        let discovery = Arc::new(
            NodeDiscoverySync::new(
                registry.clone(),
                backend.clone(),
                client.clone(),
                catalog.clone(),
            )
            .with_interval(config.discovery.interval)
            .with_readiness(readiness)
            .with_router(router.clone()),
        );

        Ok(Self {
            registry,
            backend,
            client,
            catalog,
            windows,
            router,
            discovery,
        })
    }

    /// Handler state for the HTTP API
    #[must_use]
    pub fn api_state(&self) -> ApiState {
        ApiState {
            registry: self.registry.clone(),
            backend: self.backend.clone(),
            catalog: self.catalog.clone(),
            discovery: self.discovery.clone(),
            router: self.router.clone(),
            windows: self.windows.clone(),
        }
    }
}

/// The federation daemon
pub struct Daemon {
    config: FederationConfig,
    federation: Federation,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Errors
    ///
    /// Returns error if initialization fails
    pub fn new(config: FederationConfig) -> Result<Self> {
        let federation = Federation::from_config(&config)?;
        Ok(Self { config, federation })
    }

    /// Components owned by this daemon
    #[must_use]
    pub const fn federation(&self) -> &Federation {
        &self.federation
    }

    /// Run until Ctrl-C or until the API server exits
    ///
    /// # Errors
    ///
    /// Returns error if the API server fails
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            embedded_node_id = %self.config.embedded_node_id,
            backend_url = %self.config.backend_url,
            port = self.config.api_server.port,
            "starting federation host"
        );

        if self.config.discovery.enabled {
            self.federation.discovery.start();
        } else {
            tracing::info!("discovery disabled by configuration");
        }

        let api_server = ApiServer::new(self.federation.api_state(), self.config.api_server.port);
        let mut api_handle = api_server.spawn();

        // Set up shutdown signal
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        let result = tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("shutdown requested");
                api_handle.abort();
                Ok(())
            }
            joined = &mut api_handle => match joined {
                Ok(result) => result,
                Err(e) => Err(Error::Config(format!("API server task failed: {e}"))),
            },
        };

        self.federation.discovery.stop();
        result
    }
}
