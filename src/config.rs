use serde::Deserialize;
use std::fs;

fn default_chunk_size() -> u64 {
    128 * 1024 * 1024
}

fn default_replication_factor() -> usize {
    2
}

fn default_liveness_timeout_secs() -> u64 {
    15
}

fn default_heartbeat_interval_secs() -> u64 {
    5
}

fn default_sweep_interval_secs() -> u64 {
    10
}

fn default_prune_grace_multiplier() -> u64 {
    3
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_download_concurrency() -> usize {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_audit_log_path() -> String {
    "audit_log.txt".to_string()
}

fn default_storage_dir() -> String {
    "storage".to_string()
}

/// Tunables shared by every component (manager, node, client).
///
/// Defaults are used whenever a field is absent from `config.toml`.
#[derive(Clone, Debug, Deserialize)]
pub struct CommonConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: usize,
    #[serde(default = "default_liveness_timeout_secs")]
    pub liveness_timeout_secs: u64,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Multiplier applied to `liveness_timeout_secs` before a chunk's
    /// replica entry for an inactive node is pruned.
    #[serde(default = "default_prune_grace_multiplier")]
    pub prune_grace_multiplier: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_download_concurrency")]
    pub download_concurrency: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            replication_factor: default_replication_factor(),
            liveness_timeout_secs: default_liveness_timeout_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            prune_grace_multiplier: default_prune_grace_multiplier(),
            request_timeout_secs: default_request_timeout_secs(),
            download_concurrency: default_download_concurrency(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ManagerConfig {
    #[serde(default = "default_manager_bind")]
    pub bind_addr: String,
    /// Append-only audit log (`REGISTER`/`REPLICATE`/`REMOVE`/`NODE
    /// FAILURE` lines), distinct from the `tracing` log stream below.
    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: String,
    /// Optional file sink for structured `tracing` logs. `None` (the
    /// default) logs to stderr only.
    #[serde(default)]
    pub trace_log_path: Option<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_manager_bind(),
            audit_log_path: default_audit_log_path(),
            trace_log_path: None,
        }
    }
}

fn default_manager_bind() -> String {
    "0.0.0.0:5000".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_node_bind")]
    pub bind_addr: String,
    /// Address this node advertises to the manager and to other nodes.
    #[serde(default)]
    pub advertise_url: String,
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,
    #[serde(default = "default_manager_url")]
    pub manager_url: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_node_bind(),
            advertise_url: String::new(),
            storage_dir: default_storage_dir(),
            manager_url: default_manager_url(),
        }
    }
}

fn default_node_bind() -> String {
    "0.0.0.0:5001".to_string()
}

fn default_manager_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_manager_url")]
    pub manager_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            manager_url: default_manager_url(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub common: CommonConfig,
}

pub fn load_config(path: &str) -> Result<Config, Box<dyn std::error::Error>> {
    // Read the config file
    let config_content = fs::read_to_string(path)?;
    // Parse the TOML content into the Config struct
    let config: Config = toml::from_str(&config_content)?;
    Ok(config)
}

/// Falls back to all-defaults when no config file is present; local runs
/// and tests should not need a `config.toml` on disk to get sane tunables.
pub fn load_config_or_default(path: &str) -> Config {
    load_config(path).unwrap_or_default()
}
