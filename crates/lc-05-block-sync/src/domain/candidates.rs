//! Bounded pool of peers advertising a heavier chain.

use shared_types::{PeerId, TopWeightInfo};
use std::collections::HashMap;

/// What happened to an advertisement offered to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Added,
    /// The peer was already a candidate; its top was replaced.
    Refreshed,
    /// The pool was full and the lightest candidate made room.
    Displaced(PeerId),
    /// The pool was full of candidates at least as heavy.
    Rejected,
}

#[derive(Debug, Clone)]
pub struct CandidatePool {
    entries: HashMap<PeerId, TopWeightInfo>,
    capacity: usize,
}

impl CandidatePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, peer: &PeerId) -> Option<&TopWeightInfo> {
        self.entries.get(peer)
    }

    pub fn remove(&mut self, peer: &PeerId) -> Option<TopWeightInfo> {
        self.entries.remove(peer)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&PeerId, &TopWeightInfo) -> bool) {
        self.entries.retain(|peer, top| keep(peer, top));
    }

    pub fn offer(&mut self, peer: PeerId, top: TopWeightInfo) -> Admission {
        if let Some(entry) = self.entries.get_mut(&peer) {
            *entry = top;
            return Admission::Refreshed;
        }
        if self.entries.len() < self.capacity {
            self.entries.insert(peer, top);
            return Admission::Added;
        }

        let lightest = self
            .entries
            .iter()
            .min_by(|a, b| a.1.weight().cmp(&b.1.weight()))
            .map(|(p, t)| (*p, t.weight()));
        match lightest {
            Some((victim, weight)) if top.weight() > weight => {
                self.entries.remove(&victim);
                self.entries.insert(peer, top);
                Admission::Displaced(victim)
            }
            _ => Admission::Rejected,
        }
    }

    /// Heaviest candidate accepted by `eligible`.
    pub fn best(&self, mut eligible: impl FnMut(&PeerId) -> bool) -> Option<(PeerId, TopWeightInfo)> {
        self.entries
            .iter()
            .filter(|(peer, _)| eligible(peer))
            .max_by(|a, b| a.1.weight().cmp(&b.1.weight()))
            .map(|(peer, top)| (*peer, top.clone()))
    }
}
