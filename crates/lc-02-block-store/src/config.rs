//! Block store configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Recent canonical blocks kept in memory.
    pub top_cache_size: usize,
    /// Blocks loaded into the cache when an existing store is opened.
    pub warm_blocks: u64,
    /// Upper bound on a single range query.
    pub max_range: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            top_cache_size: 20,
            warm_blocks: 10,
            max_range: 100,
        }
    }
}

impl StoreConfig {
    pub fn for_testing() -> Self {
        Self {
            top_cache_size: 4,
            warm_blocks: 2,
            max_range: 100,
        }
    }
}
