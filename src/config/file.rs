//! TOML configuration file loading
//!
//! Supports `~/.config/nodefed/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct FederationConfigFile {
    /// Identity of the embedded node
    #[serde(default)]
    pub embedded: EmbeddedFileConfig,

    /// Bound backend connection
    #[serde(default)]
    pub backend: BackendFileConfig,

    /// Discovery loop tuning
    #[serde(default)]
    pub discovery: DiscoveryFileConfig,

    /// Relay and idempotency bounds
    #[serde(default)]
    pub relay: RelayFileConfig,

    /// Host API server
    #[serde(default)]
    pub api: ApiFileConfig,

    /// Nodes registered by hand at startup
    #[serde(default)]
    pub manual_nodes: Vec<ManualNodeFileConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmbeddedFileConfig {
    pub node_id: Option<String>,
    pub node_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BackendFileConfig {
    /// Base URL of the bound backend (e.g. "http://127.0.0.1:29695")
    pub url: Option<String>,

    /// Node the host window is bound to, if not the embedded one
    pub bound_node_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiscoveryFileConfig {
    pub enabled: Option<bool>,
    pub interval_secs: Option<u64>,
    pub ready_timeout_ms: Option<u64>,
    pub ready_poll_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RelayFileConfig {
    pub max_pending_per_node: Option<usize>,
    pub seen_command_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiFileConfig {
    pub port: Option<u16>,
}

/// One `[[manual_nodes]]` table
#[derive(Debug, Clone, Deserialize)]
pub struct ManualNodeFileConfig {
    pub id: String,
    pub name: String,
    pub base_url: String,
}

/// Load the TOML config file from the standard path
///
/// Returns `FederationConfigFile::default()` if the file doesn't exist or
/// can't be parsed.
pub fn load_config_file() -> FederationConfigFile {
    config_file_path().map_or_else(FederationConfigFile::default, |path| {
        load_config_file_from(&path)
    })
}

/// Load a TOML config file from an explicit path
pub fn load_config_file_from(path: &Path) -> FederationConfigFile {
    if !path.exists() {
        return FederationConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => parse_config_file(&content).unwrap_or_else(|e| {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config file, using defaults"
            );
            FederationConfigFile::default()
        }),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            FederationConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the contents are not valid TOML for this schema
pub fn parse_config_file(content: &str) -> crate::Result<FederationConfigFile> {
    let config = toml::from_str(content)?;
    tracing::debug!("parsed config file");
    Ok(config)
}

/// Return the config file path: `~/.config/nodefed/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("nodefed").join("config.toml"))
}
