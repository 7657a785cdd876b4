//! Transport for a node without peers.

use async_trait::async_trait;
use lc_03_chain::{Network, NetworkError};
use shared_types::{NetworkMessage, PeerId};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Drops every outbound message.
#[derive(Debug, Default)]
pub struct OfflineNetwork {
    dropped: AtomicU64,
}

impl OfflineNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn drop_message(&self, target: &str, message: &NetworkMessage) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        debug!(target_peer = target, kind = message.kind(), "offline, message dropped");
    }
}

#[async_trait]
impl Network for OfflineNetwork {
    async fn send(&self, peer: PeerId, message: NetworkMessage) -> Result<(), NetworkError> {
        self.drop_message(&peer.to_string(), &message);
        Err(NetworkError::PeerUnreachable(peer))
    }

    async fn broadcast(&self, message: NetworkMessage) -> Result<(), NetworkError> {
        self.drop_message("all", &message);
        Ok(())
    }

    async fn relay_to_neighbors(&self, message: NetworkMessage) -> Result<(), NetworkError> {
        self.drop_message("neighbors", &message);
        Ok(())
    }
}
