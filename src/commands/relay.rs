//! Bounded per-node queue for commands whose window is not ready yet
//!
//! Contents live only in memory. A lost command is re-issued by the user.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use super::types::NodeWindowCommand;

/// Default bound on queued commands per destination node
pub const DEFAULT_MAX_PENDING_PER_NODE: usize = 32;

/// Per-destination FIFO with drop-oldest overflow
#[derive(Debug)]
pub struct CommandRelay {
    max_pending_per_node: usize,
    queues: Mutex<HashMap<String, VecDeque<NodeWindowCommand>>>,
}

impl Default for CommandRelay {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING_PER_NODE)
    }
}

impl CommandRelay {
    /// Create a relay holding at most `max_pending_per_node` commands per node
    ///
    /// A bound of zero is raised to one.
    #[must_use]
    pub fn new(max_pending_per_node: usize) -> Self {
        Self {
            max_pending_per_node: max_pending_per_node.max(1),
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Configured per-node bound
    #[must_use]
    pub const fn max_pending_per_node(&self) -> usize {
        self.max_pending_per_node
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<NodeWindowCommand>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a command, evicting the oldest entries past the bound
    ///
    /// Returns how many commands were evicted.
    pub fn enqueue(&self, node_id: &str, command: NodeWindowCommand) -> usize {
        let mut queues = self.lock();
        let queue = queues.entry(node_id.to_string()).or_default();
        queue.push_back(command);
        self.evict_overflow(node_id, queue)
    }

    fn evict_overflow(&self, node_id: &str, queue: &mut VecDeque<NodeWindowCommand>) -> usize {
        let mut evicted = 0;
        while queue.len() > self.max_pending_per_node {
            if let Some(dropped) = queue.pop_front() {
                evicted += 1;
                tracing::warn!(
                    node_id,
                    command_id = %dropped.command_id,
                    "pending command queue full, dropped oldest command"
                );
            }
        }
        evicted
    }

    /// Put commands back at the head of the queue, preserving their order
    ///
    /// Used when delivery of drained commands fails part way. The bound is
    /// enforced afterwards with the same drop-oldest rule.
    pub fn requeue_front(&self, node_id: &str, commands: Vec<NodeWindowCommand>) -> usize {
        if commands.is_empty() {
            return 0;
        }

        let mut queues = self.lock();
        let queue = queues.entry(node_id.to_string()).or_default();
        for command in commands.into_iter().rev() {
            queue.push_front(command);
        }
        self.evict_overflow(node_id, queue)
    }

    /// Remove and return every queued command for `node_id`, oldest first
    pub fn drain(&self, node_id: &str) -> Vec<NodeWindowCommand> {
        self.lock()
            .remove(node_id)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Number of commands waiting for `node_id`
    #[must_use]
    pub fn pending_count(&self, node_id: &str) -> usize {
        self.lock().get(node_id).map_or(0, VecDeque::len)
    }

    /// Total commands waiting across all nodes
    #[must_use]
    pub fn total_pending(&self) -> usize {
        self.lock().values().map(VecDeque::len).sum()
    }

    /// Discard everything queued for `node_id`, returning how many were dropped
    pub fn clear_node(&self, node_id: &str) -> usize {
        self.lock().remove(node_id).map_or(0, |q| q.len())
    }
}
