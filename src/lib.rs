//! Node federation - a merged agent/team catalog across independently
//! addressable nodes, with cross-node run handoff
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Host API (axum)                     │
//! │   nodes  │  catalog  │  discovery  │  windows (ws)   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                Federation host                       │
//! │ Registry │ Discovery Sync │ Catalog │ Window Router  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │          Bound backend (GraphQL + health)            │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod backend;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod discovery;
pub mod error;
pub mod host;
pub mod launcher;
pub mod nodes;

pub use catalog::{CatalogSnapshot, FederatedCatalog};
pub use commands::{CommandRelay, DispatchResult, NodeWindowCommand};
pub use config::FederationConfig;
pub use daemon::{Daemon, Federation};
pub use discovery::{NodeDiscoverySync, SyncOutcome};
pub use error::{Error, Result};
pub use host::{NodeWindowRouter, WindowHost};
pub use launcher::{RunKind, RunLauncher};
pub use nodes::{InMemoryNodeRegistry, NodeProfile, NodeRegistry};
