//! Error types for the node federation

use thiserror::Error;

/// Result type alias for federation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while federating nodes
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The bound backend did not become ready in time
    #[error("bound backend is not ready: {0}")]
    BackendNotReady(String),

    /// No multi-window dispatch API is available in this process
    #[error("remote run handoff requires desktop runtime")]
    TransportUnavailable,

    /// Destination refused a handoff; the message is the reason verbatim
    #[error("{0}")]
    HandoffRejected(String),

    /// A local definition id no longer resolves
    #[error("definition is no longer available on this node: {0}")]
    DefinitionUnavailable(String),

    /// Node id is not present in the registry
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Registry refused a mutation (duplicate id, system node, ...)
    #[error("registry error: {0}")]
    Registry(String),

    /// Window surface failed to open a window or deliver a command
    #[error("window error: {0}")]
    Window(String),

    /// Remote endpoint answered with an application-level error
    #[error("remote error: {0}")]
    Remote(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing error
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}
