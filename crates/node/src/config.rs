//! Node Configuration

use ledger_runtime::LedgerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Node configuration, optionally read from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP bind address
    pub http_addr: String,
    /// Directory of the sled store
    pub data_dir: PathBuf,
    /// Seconds between background saves (0 = only on shutdown)
    pub save_interval_secs: u64,
    /// Log every request at info level
    pub verbose: bool,
    pub ledger: LedgerConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:8000".to_string(),
            data_dir: PathBuf::from("./data"),
            save_interval_secs: 30,
            verbose: false,
            ledger: LedgerConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Read `path` if given, else the defaults
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read config {:?}: {}", path, e))?;
        let config: NodeConfig = serde_json::from_str(&raw)?;
        config.ledger.validate()?;
        Ok(config)
    }
}
