//! Outbound ports.

use shared_types::{PeerId, TopWeightInfo};

/// Latest top a peer advertised, if any. Implemented by the sync candidate
/// pool.
pub trait PeerTopSource: Send + Sync {
    fn peer_top(&self, peer: &PeerId) -> Option<TopWeightInfo>;
}

/// No advertisements known. Negotiations then target the forked block itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPeerTops;

impl PeerTopSource for NoPeerTops {
    fn peer_top(&self, _peer: &PeerId) -> Option<TopWeightInfo> {
        None
    }
}
