//! Block sync configuration.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How often the local top is advertised
    #[serde_as(as = "DurationSeconds<u64>")]
    pub advertise_interval: Duration,
    /// How often a sync attempt runs
    #[serde_as(as = "DurationSeconds<u64>")]
    pub sync_interval: Duration,
    /// How long a block request may stay unanswered
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
    /// Candidates tracked at once
    pub candidate_pool_size: usize,
    /// Light nodes never advertise
    pub light_mode: bool,
    /// Height lag beyond which the node reports itself as syncing
    pub syncing_lag: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            advertise_interval: Duration::from_secs(3),
            sync_interval: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
            candidate_pool_size: 100,
            light_mode: false,
            syncing_lag: 50,
        }
    }
}

impl SyncConfig {
    /// Tiny candidate pool so eviction is easy to reach
    pub fn for_testing() -> Self {
        Self {
            candidate_pool_size: 3,
            syncing_lag: 5,
            ..Self::default()
        }
    }
}
