//! # Node Configuration
//!
//! Unified configuration for every ledger component. Each section uses the
//! owning crate's own config type; missing sections fall back to defaults.

use lc_01_peer_score::PeerScoreConfig;
use lc_03_chain::ChainConfig;
use lc_04_fork_resolver::ForkConfig;
use lc_05_block_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use shared_bus::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_DISPATCH_CONCURRENCY};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Fallback filter when `RUST_LOG` is unset, e.g. `"info,lc_03_chain=debug"`.
    pub log_level: String,
    /// Directory for the RocksDB store. `None` keeps the chain in memory.
    pub data_dir: Option<PathBuf>,
    pub chain: ChainConfig,
    pub peers: PeerScoreConfig,
    pub fork: ForkConfig,
    pub sync: SyncConfig,
    pub bus: BusConfig,
    pub genesis: GenesisConfig,
}

impl NodeConfig {
    /// Parse a JSON document. Absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: NodeConfig = serde_json::from_str(json).context("invalid node config")?;
        if config.log_level.is_empty() {
            config.log_level = default_log_level();
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Small caches and a tiny candidate pool.
    pub fn for_testing() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: None,
            chain: ChainConfig::for_testing(),
            peers: PeerScoreConfig::for_testing(),
            fork: ForkConfig::for_testing(),
            sync: SyncConfig::for_testing(),
            bus: BusConfig::default(),
            genesis: GenesisConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Event bus sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub channel_capacity: usize,
    pub dispatch_concurrency: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            dispatch_concurrency: DEFAULT_DISPATCH_CONCURRENCY,
        }
    }
}

/// Fields of the genesis header that differ between networks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    pub timestamp: u64,
    /// Free-form network tag mixed into the genesis hash.
    pub extra_data: String,
}
