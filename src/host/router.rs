//! Host-side routing of commands to node windows
//!
//! Every inbound command is validated, de-duplicated by `commandId`, then
//! delivered to a ready window or parked in the relay until the window
//! reports ready.
//!
//! Routing, draining and binding changes all happen under the window table's
//! write lock. A command id is therefore checked and routed as one step, and
//! a node's commands reach its window in the order they were accepted.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use lru::LruCache;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::WindowHost;
use super::surface::WindowSurface;
use crate::commands::{
    CommandRelay, DispatchResult, NodeWindowCommand, REJECT_HOME_NODE_MISMATCH,
    REJECT_INVALID_COMMAND, REJECT_UNKNOWN_NODE, WindowReady, parse_node_window_command,
};
use crate::nodes::NodeRegistry;
use crate::{Error, Result};

/// Default number of remembered command ids
pub const DEFAULT_SEEN_COMMAND_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct WindowBinding {
    window_id: String,
    ready: bool,
    /// Window clients currently attached
    attached: usize,
}

/// Public view of a node's window binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStatus {
    pub node_id: String,
    pub window_id: Option<String>,
    pub ready: bool,
    pub pending: usize,
}

/// Routes commands to the window bound to each node
pub struct NodeWindowRouter {
    registry: Arc<dyn NodeRegistry>,
    surface: Arc<dyn WindowSurface>,
    relay: CommandRelay,
    windows: RwLock<HashMap<String, WindowBinding>>,
    seen: Mutex<LruCache<String, DispatchResult>>,
}

impl NodeWindowRouter {
    /// Create a router with default relay and idempotency bounds
    #[must_use]
    pub fn new(registry: Arc<dyn NodeRegistry>, surface: Arc<dyn WindowSurface>) -> Self {
        Self::with_limits(
            registry,
            surface,
            CommandRelay::default(),
            DEFAULT_SEEN_COMMAND_CAPACITY,
        )
    }

    /// Create a router with an explicit relay and seen-command capacity
    #[must_use]
    pub fn with_limits(
        registry: Arc<dyn NodeRegistry>,
        surface: Arc<dyn WindowSurface>,
        relay: CommandRelay,
        seen_capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(seen_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            registry,
            surface,
            relay,
            windows: RwLock::new(HashMap::new()),
            seen: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Commands waiting for `node_id`'s window
    #[must_use]
    pub fn pending_count(&self, node_id: &str) -> usize {
        self.relay.pending_count(node_id)
    }

    /// Binding and queue depth for one node
    pub async fn window_status(&self, node_id: &str) -> WindowStatus {
        let windows = self.windows.read().await;
        let binding = windows.get(node_id);
        WindowStatus {
            node_id: node_id.to_string(),
            window_id: binding.map(|b| b.window_id.clone()),
            ready: binding.is_some_and(|b| b.ready),
            pending: self.relay.pending_count(node_id),
        }
    }

    fn remembered(&self, command_id: &str) -> Option<DispatchResult> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(command_id)
            .cloned()
    }

    fn remember(&self, command_id: &str, result: &DispatchResult) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(command_id.to_string(), result.clone());
    }

    /// Validate an untyped command and route it to `node_id`
    ///
    /// Malformed input is rejected with `invalid-command`, never an error.
    ///
    /// # Errors
    ///
    /// Returns error only if the registry cannot be consulted
    pub async fn dispatch_raw(&self, node_id: &str, value: &Value) -> Result<DispatchResult> {
        let command = match parse_node_window_command(value) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(node_id, error = %e, "dropping malformed window command");
                return Ok(DispatchResult::rejected(REJECT_INVALID_COMMAND));
            }
        };

        let mut windows = self.windows.write().await;

        if let Some(previous) = self.remembered(&command.command_id) {
            tracing::debug!(node_id, command_id = %command.command_id, "duplicate command, returning first result");
            return Ok(previous);
        }

        let command_id = command.command_id.clone();
        let result = self.route(&mut windows, node_id, command).await?;
        if result.accepted {
            self.remember(&command_id, &result);
        }
        Ok(result)
    }

    async fn route(
        &self,
        windows: &mut HashMap<String, WindowBinding>,
        node_id: &str,
        command: NodeWindowCommand,
    ) -> Result<DispatchResult> {
        if self.registry.get(node_id).await.is_none() {
            tracing::warn!(node_id, command_id = %command.command_id, "command for unknown node rejected");
            return Ok(DispatchResult::rejected(REJECT_UNKNOWN_NODE));
        }

        if command.home_node_id() != node_id {
            tracing::warn!(
                node_id,
                home_node_id = %command.home_node_id(),
                command_id = %command.command_id,
                "command routed to a node other than its home"
            );
            return Ok(DispatchResult::rejected(REJECT_HOME_NODE_MISMATCH));
        }

        let window_id = windows.get(node_id).map(|b| b.window_id.clone());

        if let Some(binding) = windows.get_mut(node_id).filter(|b| b.ready) {
            match self.surface.deliver(&binding.window_id, node_id, &command).await {
                Ok(()) => {
                    tracing::info!(node_id, window_id = %binding.window_id, command_id = %command.command_id, "command delivered");
                    return Ok(DispatchResult::delivered(binding.window_id.clone()));
                }
                Err(e) => {
                    // Later commands must queue behind this one until the next drain
                    binding.ready = false;
                    tracing::warn!(node_id, error = %e, "delivery to ready window failed, queueing");
                    self.relay.enqueue(node_id, command);
                    return Ok(DispatchResult::queued(window_id));
                }
            }
        }

        let command_id = command.command_id.clone();
        self.relay.enqueue(node_id, command);
        tracing::info!(
            node_id,
            command_id = %command_id,
            pending = self.relay.pending_count(node_id),
            "window not ready, command queued"
        );
        Ok(DispatchResult::queued(window_id))
    }

    /// Record an attached window client for `node_id`, mark the window ready
    /// and deliver everything queued for it
    ///
    /// A window that attaches without having been opened by the host gets a
    /// binding here. If a delivery fails, the undelivered commands go back to
    /// the head of the queue and the window is marked not ready.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if the node is not registered
    pub async fn mark_window_ready(&self, node_id: &str) -> Result<usize> {
        if self.registry.get(node_id).await.is_none() {
            return Err(Error::NodeNotFound(node_id.to_string()));
        }

        let mut windows = self.windows.write().await;
        let binding = windows
            .entry(node_id.to_string())
            .or_insert_with(|| WindowBinding {
                window_id: format!("window-{}", Uuid::new_v4()),
                ready: false,
                attached: 0,
            });
        binding.ready = true;
        binding.attached += 1;
        let window_id = binding.window_id.clone();

        let mut pending = self.relay.drain(node_id).into_iter();
        let mut delivered = 0;
        while let Some(command) = pending.next() {
            if let Err(e) = self.surface.deliver(&window_id, node_id, &command).await {
                tracing::warn!(node_id, error = %e, "draining queued commands failed");
                let mut rest = vec![command];
                rest.extend(pending);
                self.relay.requeue_front(node_id, rest);
                if let Some(binding) = windows.get_mut(node_id) {
                    binding.ready = false;
                }
                return Ok(delivered);
            }
            delivered += 1;
        }

        tracing::info!(node_id, window_id = %window_id, delivered, "node window ready");
        Ok(delivered)
    }

    /// Release one attached client of `node_id`'s window
    ///
    /// The binding is dropped once no client remains; later commands queue
    /// until a new window is ready.
    pub async fn mark_window_closed(&self, node_id: &str) {
        let mut windows = self.windows.write().await;
        let Some(binding) = windows.get_mut(node_id) else {
            return;
        };
        binding.attached = binding.attached.saturating_sub(1);
        let remaining = binding.attached;

        if remaining == 0 {
            windows.remove(node_id);
            tracing::info!(node_id, "node window closed");
        } else {
            tracing::debug!(node_id, remaining, "window client detached, others still attached");
        }
    }

    /// Forget bindings and queued commands for deregistered nodes
    pub async fn forget_nodes(&self, node_ids: &[String]) {
        let mut windows = self.windows.write().await;
        for node_id in node_ids {
            windows.remove(node_id);
            let dropped = self.relay.clear_node(node_id);
            if dropped > 0 {
                tracing::info!(node_id = %node_id, dropped, "discarded queued commands for removed node");
            }
        }
    }
}

#[async_trait]
impl WindowHost for NodeWindowRouter {
    async fn ensure_node_window_ready(&self, node_id: &str) -> Result<WindowReady> {
        let Some(node) = self.registry.get(node_id).await else {
            return Err(Error::NodeNotFound(node_id.to_string()));
        };

        let mut windows = self.windows.write().await;
        if let Some(binding) = windows.get(node_id) {
            return Ok(WindowReady {
                window_id: binding.window_id.clone(),
                created: false,
            });
        }

        let window_id = self.surface.open_window(&node).await?;
        windows.insert(
            node_id.to_string(),
            WindowBinding {
                window_id: window_id.clone(),
                ready: false,
                attached: 0,
            },
        );
        Ok(WindowReady {
            window_id,
            created: true,
        })
    }

    async fn dispatch_node_window_command(
        &self,
        node_id: &str,
        command: &NodeWindowCommand,
    ) -> Result<DispatchResult> {
        let value = serde_json::to_value(command)?;
        self.dispatch_raw(node_id, &value).await
    }
}
