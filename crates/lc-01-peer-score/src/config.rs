//! Peer scoring configuration.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::time::Duration;

/// Peer scoring configuration
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerScoreConfig {
    /// Timeout count above which a peer is evil
    pub evil_timeout_threshold: u32,
    /// Silence longer than this makes a peer evil
    #[serde_as(as = "DurationSeconds<u64>")]
    pub stale_after: Duration,
    /// Initial and maximum block batch size per request
    pub max_request_blocks: u32,
    /// Batch size reduction applied on each timeout
    pub request_decrease_step: u32,
    /// Maximum peers tracked at once
    pub capacity: usize,
}

impl Default for PeerScoreConfig {
    fn default() -> Self {
        Self {
            evil_timeout_threshold: 3,
            stale_after: Duration::from_secs(30),
            max_request_blocks: 16,
            request_decrease_step: 4,
            capacity: 100,
        }
    }
}

impl PeerScoreConfig {
    /// Testing config with a tiny table
    pub fn for_testing() -> Self {
        Self {
            capacity: 4,
            ..Self::default()
        }
    }
}
