//! Host side of node windows
//!
//! The host owns one window per node. Commands addressed to a node go
//! through the [`WindowHost`] seam, whether the caller shares the process
//! with the router or reaches it over HTTP.

pub mod http;
pub mod router;
pub mod surface;

use async_trait::async_trait;

pub use http::HttpWindowHost;
pub use router::{DEFAULT_SEEN_COMMAND_CAPACITY, NodeWindowRouter, WindowStatus};
pub use surface::{BroadcastWindowSurface, WindowEvent, WindowSurface};

use crate::Result;
use crate::commands::{DispatchResult, NodeWindowCommand, WindowReady};

/// Window lifecycle and command dispatch offered by the host process
#[async_trait]
pub trait WindowHost: Send + Sync {
    /// Make sure a window exists for `node_id`, opening one if needed
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NodeNotFound`] for unregistered nodes
    async fn ensure_node_window_ready(&self, node_id: &str) -> Result<WindowReady>;

    /// Route a command to `node_id`'s window
    ///
    /// Rejections come back as `accepted: false` with a reason.
    async fn dispatch_node_window_command(
        &self,
        node_id: &str,
        command: &NodeWindowCommand,
    ) -> Result<DispatchResult>;
}
