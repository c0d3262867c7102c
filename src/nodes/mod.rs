//! Federation node registry
//!
//! Nodes are independently addressable backends. Exactly one embedded node
//! is always present; others are added by hand or learned from discovery.

pub mod registry;
pub mod types;

pub use registry::{InMemoryNodeRegistry, NodeRegistry};
pub use types::{
    DiscoveredNodePeer, EMBEDDED_NODE_ID, NodeCapabilities, NodeProfile, NodeType, PeerStatus,
    RegistrationSource, normalize_base_url,
};
