//! Periodic reconciliation of discovered peers into the node registry
//!
//! Each tick asks the bound backend who it can see, upserts those peers,
//! prunes discovered nodes that disappeared, and reloads the federated
//! catalog when the node set changed. Ticks never overlap.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendReadiness, FederationApi, ReadinessPolicy};
use crate::catalog::FederatedCatalog;
use crate::host::NodeWindowRouter;
use crate::nodes::{NodeRegistry, NodeType, RegistrationSource};
use crate::{Error, Result};

/// Default time between reconciliations
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(10);

/// What a single reconciliation did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Peers in the discovery answer
    pub peers_reported: usize,
    /// Upserts that visibly changed the registry
    pub nodes_changed: usize,
    /// Discovered nodes removed because they stopped being reported
    pub pruned_node_ids: Vec<String>,
    /// Whether the catalog was reloaded
    pub catalog_reloaded: bool,
}

/// Result of [`NodeDiscoverySync::sync_once`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "report", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Another tick was in flight
    Skipped,
    /// The bound backend did not come up; nothing was touched
    BackendNotReady,
    /// The reconciliation ran to completion
    Completed(SyncReport),
}

/// Snapshot of the loop state for status endpoints
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryStatus {
    pub running: bool,
    pub last_error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub discovered_node_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct SyncState {
    last_error: Option<String>,
    last_synced_at: Option<DateTime<Utc>>,
    discovered_node_ids: BTreeSet<String>,
    // A reload that failed after the registry changed must be retried
    catalog_stale: bool,
}

struct Runner {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Keeps the registry in step with the backend's discovery view
pub struct NodeDiscoverySync {
    registry: Arc<dyn NodeRegistry>,
    backend: Arc<dyn BackendReadiness>,
    api: Arc<dyn FederationApi>,
    catalog: Arc<FederatedCatalog>,
    router: Option<Arc<NodeWindowRouter>>,
    interval: Duration,
    readiness: ReadinessPolicy,
    in_flight: Mutex<()>,
    state: RwLock<SyncState>,
    runner: StdMutex<Option<Runner>>,
}

impl NodeDiscoverySync {
    /// Create an idle sync over the given collaborators
    #[must_use]
    pub fn new(
        registry: Arc<dyn NodeRegistry>,
        backend: Arc<dyn BackendReadiness>,
        api: Arc<dyn FederationApi>,
        catalog: Arc<FederatedCatalog>,
    ) -> Self {
        Self {
            registry,
            backend,
            api,
            catalog,
            router: None,
            interval: DEFAULT_SYNC_INTERVAL,
            readiness: ReadinessPolicy::default(),
            in_flight: Mutex::new(()),
            state: RwLock::new(SyncState::default()),
            runner: StdMutex::new(None),
        }
    }

    /// Set the time between reconciliations
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Override the readiness wait
    #[must_use]
    pub const fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    /// Clear router state for nodes this sync prunes
    #[must_use]
    pub fn with_router(mut self, router: Arc<NodeWindowRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Start the periodic loop; the first reconciliation runs immediately
    ///
    /// Returns `false` if the loop was already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut runner = self.runner.lock().unwrap_or_else(PoisonError::into_inner);
        if runner.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                // Not raced against cancellation; a tick always finishes
                this.run_tick().await;
            }
            tracing::debug!("discovery loop stopped");
        });

        *runner = Some(Runner { cancel, handle });
        tracing::info!(interval_secs = self.interval.as_secs_f64(), "discovery sync started");
        true
    }

    /// Stop the periodic loop
    ///
    /// An in-flight tick completes. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        let runner = self
            .runner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match runner {
            Some(runner) => {
                runner.cancel.cancel();
                tracing::info!("discovery sync stopped");
                true
            }
            None => false,
        }
    }

    /// Whether the periodic loop is active
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.runner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.cancel.is_cancelled() && !r.handle.is_finished())
    }

    /// Error from the most recent failed tick, cleared on success
    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Discovered node ids after the last successful tick
    pub async fn discovered_node_ids(&self) -> BTreeSet<String> {
        self.state.read().await.discovered_node_ids.clone()
    }

    /// Loop state for status reporting
    pub async fn status(&self) -> DiscoveryStatus {
        let state = self.state.read().await;
        DiscoveryStatus {
            running: self.is_running(),
            last_error: state.last_error.clone(),
            last_synced_at: state.last_synced_at,
            discovered_node_ids: state.discovered_node_ids.iter().cloned().collect(),
        }
    }

    async fn run_tick(&self) {
        match self.sync_once().await {
            Ok(SyncOutcome::Completed(report)) => {
                if report.nodes_changed > 0 || !report.pruned_node_ids.is_empty() {
                    tracing::info!(
                        peers = report.peers_reported,
                        changed = report.nodes_changed,
                        pruned = report.pruned_node_ids.len(),
                        "discovery reconciled"
                    );
                }
            }
            Ok(SyncOutcome::Skipped | SyncOutcome::BackendNotReady) => {}
            Err(e) => tracing::warn!(error = %e, "discovery sync tick failed"),
        }
    }

    /// Run one reconciliation now
    ///
    /// Returns [`SyncOutcome::Skipped`] if another tick holds the guard.
    ///
    /// # Errors
    ///
    /// Returns the discovery, registry or catalog error that aborted the
    /// tick; it is also kept in [`Self::last_error`]
    pub async fn sync_once(&self) -> Result<SyncOutcome> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!("discovery tick already in flight, skipping");
            return Ok(SyncOutcome::Skipped);
        };

        match self.reconcile().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.state.write().await.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn reconcile(&self) -> Result<SyncOutcome> {
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
            tracing::debug!(detail = %detail, "bound backend not ready, skipping discovery");
            self.state.write().await.last_error =
                Some(Error::BackendNotReady(detail).to_string());
            return Ok(SyncOutcome::BackendNotReady);
        }

        let peers = self.api.discover_peers().await?;

        let previous: HashSet<String> = self
            .registry
            .nodes()
            .await
            .into_iter()
            .filter(|n| {
                n.registration_source == RegistrationSource::Discovered
                    && n.node_type == NodeType::Remote
            })
            .map(|n| n.id)
            .collect();

        let mut nodes_changed = 0;
        let mut current = HashSet::new();
        for peer in &peers {
            if self.registry.upsert_discovered_node(peer).await? {
                nodes_changed += 1;
            }
            current.insert(peer.node_id.trim().to_string());
        }

        let mut stale: Vec<String> = previous.difference(&current).cloned().collect();
        stale.sort();
        let pruned = if stale.is_empty() {
            0
        } else {
            self.registry.prune_discovered_nodes(&stale).await?
        };
        if pruned > 0 {
            tracing::info!(node_ids = ?stale, "pruned discovered nodes no longer reported");
            if let Some(router) = &self.router {
                router.forget_nodes(&stale).await;
            }
        } else {
            stale.clear();
        }

        let changed = nodes_changed > 0 || pruned > 0;
        let reload = changed || self.state.read().await.catalog_stale;
        if reload {
            if let Err(e) = self.catalog.reload_catalog().await {
                self.state.write().await.catalog_stale = true;
                return Err(e);
            }
        }

        let discovered: BTreeSet<String> = self
            .registry
            .nodes()
            .await
            .into_iter()
            .filter(|n| n.registration_source == RegistrationSource::Discovered)
            .map(|n| n.id)
            .collect();

        let mut state = self.state.write().await;
        state.last_error = None;
        state.last_synced_at = Some(Utc::now());
        state.discovered_node_ids = discovered;
        state.catalog_stale = false;

        Ok(SyncOutcome::Completed(SyncReport {
            peers_reported: peers.len(),
            nodes_changed,
            pruned_node_ids: stale,
            catalog_reloaded: reload,
        }))
    }
}
