//! Federated agent/team catalog
//!
//! Each node lists the agent and team definitions it hosts. The aggregator
//! merges those lists into one deterministic view for the UI.

pub mod aggregator;
pub mod normalize;
pub mod types;

pub use aggregator::{FederatedCatalog, order_scopes};
pub use types::{
    CatalogAgentEntry, CatalogAgentRef, CatalogNodeScope, CatalogNodeStatus, CatalogQueryNode,
    CatalogSnapshot, CatalogTeamEntry, CatalogTeamRef,
};
