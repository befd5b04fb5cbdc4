//! Node configuration: a TOML file layered with environment variables,
//! validated before use.
//!
//! Trimmed to the single storage/swarm/blob surface this node
//! actually owns.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Node configuration, loadable from a TOML file and overridable by
/// environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NodeConfig {
    /// Directory holding the RocksDB-backed store.
    pub storage_path: PathBuf,

    /// Path to the persisted swarm (writer) keypair seed.
    pub swarm_key_path: PathBuf,

    #[validate(nested)]
    #[serde(default)]
    pub blob_server: BlobServerConfig,

    /// Default bounded-wait timeout, in milliseconds, for operations
    /// that don't name a more specific one in `newtube_swarm::Timeouts`.
    #[validate(range(min = 100, max = 300_000))]
    pub default_timeout_ms: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl NodeConfig {
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Loads from `path` (TOML), then applies any of the
    /// `NEWTUBE_*` environment variables on top.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        }
        let built = builder
            .add_source(
                config::Environment::with_prefix("NEWTUBE")
                    .try_parsing(true)
                    .separator("__"),
            )
            .build()?;

        let config: Self = built.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./data/store"),
            swarm_key_path: PathBuf::from("./data/swarm.key"),
            blob_server: BlobServerConfig::default(),
            default_timeout_ms: 10_000,
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where the blob store's read-range endpoint listens, for peers that
/// fetch blobs over plain HTTP rather than the swarm wire protocol.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BlobServerConfig {
    pub host: String,

    #[validate(range(min = 1))]
    pub port: u16,
}

impl Default for BlobServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7676,
        }
    }
}
