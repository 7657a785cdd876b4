//! Chain configuration.

use lc_02_block_store::StoreConfig;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Blocks waiting for an unknown parent, keyed by that parent.
    pub future_blocks: usize,
    /// Execution results kept for blocks verified but not yet committed.
    pub verified_blocks: usize,
    /// Blocks waiting for transaction bodies.
    pub pending_tx_blocks: usize,
    /// How long a block waits for the bodies it asked a peer for.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub tx_fetch_timeout: Duration,
    pub store: StoreConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            future_blocks: 10,
            verified_blocks: 10,
            pending_tx_blocks: 32,
            tx_fetch_timeout: Duration::from_secs(5),
            store: StoreConfig::default(),
        }
    }
}

impl ChainConfig {
    pub fn for_testing() -> Self {
        Self {
            future_blocks: 4,
            verified_blocks: 4,
            pending_tx_blocks: 4,
            tx_fetch_timeout: Duration::from_secs(3),
            store: StoreConfig::for_testing(),
        }
    }
}
