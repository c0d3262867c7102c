//! Collaborators provided by the bound backend node
//!
//! The host talks to one backend (the node its window is bound to) for
//! discovery and catalog queries, and waits for it to be healthy first.

pub mod client;
pub mod readiness;

use std::time::Duration;

pub use client::{FederationApi, GraphqlFederationClient};
pub use readiness::{BackendReadiness, HttpBackendReadiness};

/// Default upper bound on a readiness wait
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_millis(2_500);

/// Default delay between readiness probes
pub const DEFAULT_READY_POLL: Duration = Duration::from_millis(300);

/// How long to wait for the bound backend and how often to probe it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub timeout: Duration,
    pub poll: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_READY_TIMEOUT,
            poll: DEFAULT_READY_POLL,
        }
    }
}
