//! Peer score table.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use shared_types::PeerId;
use tracing::debug;

use super::config::PeerScoreConfig;
use super::meter::PeerMeter;

/// Manages meters for all peers.
///
/// Internally locked; the lock is independent of any chain lock.
pub struct PeerScoreManager {
    meters: Mutex<LruCache<PeerId, PeerMeter>>,
    config: PeerScoreConfig,
}

impl PeerScoreManager {
    pub fn new(config: PeerScoreConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            meters: Mutex::new(LruCache::new(capacity)),
            config,
        }
    }

    pub fn config(&self) -> &PeerScoreConfig {
        &self.config
    }

    fn with_meter<R>(&self, peer: &PeerId, f: impl FnOnce(&mut PeerMeter) -> R) -> R {
        let mut meters = self.meters.lock();
        let meter = meters.get_or_insert_mut(*peer, || PeerMeter::new(&self.config));
        f(meter)
    }

    /// Record a message or successful response from `peer`
    pub fn heard_from(&self, peer: &PeerId) {
        self.with_meter(peer, PeerMeter::on_heard);
    }

    /// Record a request to `peer` that timed out
    pub fn timeout_peer(&self, peer: &PeerId) {
        let count = self.with_meter(peer, |m| {
            m.on_timeout();
            m.timeout_count()
        });
        debug!(peer = %peer, timeouts = count, "[lc-01] peer timed out");
    }

    /// Push `peer` over the evil threshold at once
    pub fn mark_evil(&self, peer: &PeerId) {
        self.with_meter(peer, |m| m.force_evil(&self.config));
        debug!(peer = %peer, "[lc-01] peer marked evil");
    }

    /// Unknown peers are not evil
    pub fn is_evil(&self, peer: &PeerId) -> bool {
        self.meters
            .lock()
            .peek(peer)
            .map(|m| m.is_evil(&self.config))
            .unwrap_or(false)
    }

    /// Block batch size to request from `peer`
    pub fn request_block_count(&self, peer: &PeerId) -> u32 {
        self.with_meter(peer, |m| m.request_blocks())
    }

    /// Grow the batch size after a success, shrink it after a timeout
    pub fn update_request_count(&self, peer: &PeerId, success: bool) {
        self.with_meter(peer, |m| m.adjust_request_blocks(success, &self.config));
    }

    pub fn meter(&self, peer: &PeerId) -> Option<PeerMeter> {
        self.meters.lock().peek(peer).cloned()
    }

    pub fn tracked_peers(&self) -> usize {
        self.meters.lock().len()
    }
}
