//! Reliability state for a single peer.

use super::config::PeerScoreConfig;
use tokio::time::Instant;

/// Score state for a single peer
#[derive(Debug, Clone)]
pub struct PeerMeter {
    timeout_count: u32,
    last_heard: Instant,
    request_blocks: u32,
}

impl PeerMeter {
    pub(crate) fn new(config: &PeerScoreConfig) -> Self {
        Self {
            timeout_count: 0,
            last_heard: Instant::now(),
            request_blocks: config.max_request_blocks,
        }
    }

    pub fn timeout_count(&self) -> u32 {
        self.timeout_count
    }

    pub fn last_heard(&self) -> Instant {
        self.last_heard
    }

    pub fn request_blocks(&self) -> u32 {
        self.request_blocks
    }

    pub fn is_evil(&self, config: &PeerScoreConfig) -> bool {
        self.timeout_count > config.evil_timeout_threshold
            || self.last_heard.elapsed() > config.stale_after
    }

    pub(crate) fn on_heard(&mut self) {
        self.last_heard = Instant::now();
        self.timeout_count = self.timeout_count.saturating_sub(1);
    }

    pub(crate) fn on_timeout(&mut self) {
        self.timeout_count = self.timeout_count.saturating_add(1);
    }

    pub(crate) fn force_evil(&mut self, config: &PeerScoreConfig) {
        self.timeout_count = self
            .timeout_count
            .max(config.evil_timeout_threshold.saturating_add(1));
    }

    pub(crate) fn adjust_request_blocks(&mut self, success: bool, config: &PeerScoreConfig) {
        self.request_blocks = if success {
            (self.request_blocks + 1).min(config.max_request_blocks)
        } else {
            self.request_blocks
                .saturating_sub(config.request_decrease_step)
                .max(1)
        };
    }
}
