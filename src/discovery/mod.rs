//! Node discovery
//!
//! The bound backend does the actual peer discovery on the network; the
//! host polls it and mirrors the answer into the node registry.

pub mod sync;

pub use sync::{
    DEFAULT_SYNC_INTERVAL, DiscoveryStatus, NodeDiscoverySync, SyncOutcome, SyncReport,
};
