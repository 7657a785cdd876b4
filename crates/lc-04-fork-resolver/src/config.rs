//! Fork resolution configuration.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::time::Duration;

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForkConfig {
    /// Hashes per chain piece
    pub piece_length: usize,
    /// How long to wait for each piece answer
    #[serde_as(as = "DurationSeconds<u64>")]
    pub piece_timeout: Duration,
    /// Exchanges allowed before giving up on a peer's branch
    pub max_rounds: u32,
}

impl Default for ForkConfig {
    fn default() -> Self {
        Self {
            piece_length: 10,
            piece_timeout: Duration::from_secs(60),
            max_rounds: 8,
        }
    }
}

impl ForkConfig {
    /// Short pieces and a short timer so tests walk several rounds quickly
    pub fn for_testing() -> Self {
        Self {
            piece_length: 4,
            piece_timeout: Duration::from_secs(5),
            max_rounds: 8,
        }
    }
}
