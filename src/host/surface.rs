//! Windows as seen by the router: something that can be opened and can
//! receive commands

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::commands::NodeWindowCommand;
use crate::nodes::NodeProfile;
use crate::{Error, Result};

/// Per-node broadcast buffer size for window events
const CHANNEL_CAPACITY: usize = 256;

/// Opens node windows and hands commands to them
#[async_trait]
pub trait WindowSurface: Send + Sync {
    /// Open a window for `node`, returning its id
    async fn open_window(&self, node: &NodeProfile) -> Result<String>;

    /// Hand a command to an open window
    async fn deliver(
        &self,
        window_id: &str,
        node_id: &str,
        command: &NodeWindowCommand,
    ) -> Result<()>;
}

/// Events published to attached window clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WindowEvent {
    /// The host wants a window for this node
    OpenRequested {
        window_id: String,
        node_id: String,
        node_name: String,
        base_url: String,
    },
    /// A command for the window bound to `node_id`
    Command {
        window_id: String,
        node_id: String,
        command: NodeWindowCommand,
    },
}

impl WindowEvent {
    /// Node the event concerns
    #[must_use]
    pub fn node_id(&self) -> &str {
        match self {
            Self::OpenRequested { node_id, .. } | Self::Command { node_id, .. } => node_id,
        }
    }
}

/// Publishes window events on one broadcast channel per node
///
/// Delivery fails when nobody is subscribed for the command's node, so the
/// router keeps the command queued instead of losing it.
#[derive(Debug, Clone, Default)]
pub struct BroadcastWindowSurface {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<WindowEvent>>>>,
}

impl BroadcastWindowSurface {
    /// Create a surface with no subscribers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<WindowEvent>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to events for `node_id`'s window
    #[must_use]
    pub fn subscribe(&self, node_id: &str) -> broadcast::Receiver<WindowEvent> {
        self.channels()
            .entry(node_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish to `node_id`'s subscribers; `false` if there are none
    fn publish(&self, node_id: &str, event: WindowEvent) -> bool {
        let mut channels = self.channels();
        let Some(tx) = channels.get(node_id) else {
            return false;
        };
        if tx.send(event).is_ok() {
            return true;
        }
        channels.remove(node_id);
        false
    }
}

#[async_trait]
impl WindowSurface for BroadcastWindowSurface {
    async fn open_window(&self, node: &NodeProfile) -> Result<String> {
        let window_id = format!("window-{}", Uuid::new_v4());
        let event = WindowEvent::OpenRequested {
            window_id: window_id.clone(),
            node_id: node.id.clone(),
            node_name: node.name.clone(),
            base_url: node.base_url.clone(),
        };

        // An unattended open request is fine; the window attaches later
        if !self.publish(&node.id, event) {
            tracing::debug!(node_id = %node.id, "no window client listening for open request");
        }
        tracing::info!(node_id = %node.id, window_id = %window_id, "node window opened");
        Ok(window_id)
    }

    async fn deliver(
        &self,
        window_id: &str,
        node_id: &str,
        command: &NodeWindowCommand,
    ) -> Result<()> {
        let event = WindowEvent::Command {
            window_id: window_id.to_string(),
            node_id: node_id.to_string(),
            command: command.clone(),
        };
        if self.publish(node_id, event) {
            Ok(())
        } else {
            Err(Error::Window(format!(
                "no client attached for window '{window_id}'"
            )))
        }
    }
}
