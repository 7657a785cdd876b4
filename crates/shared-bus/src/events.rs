//! # Chain Events
//!
//! The closed set of events that flow through the chain event bus. Inbound
//! peer traffic travels as raw payload bytes plus the sending peer; the node
//! router decodes them. `BlockAdded` is raised by the chain itself after each
//! successful commit.

use serde::{Deserialize, Serialize};
use shared_types::entities::{Block, PeerId};

/// All events that can be published to the chain event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChainEvent {
    // =========================================================================
    // CHAIN
    // =========================================================================
    /// A block became part of the canonical chain.
    BlockAdded(Block),

    // =========================================================================
    // INBOUND PEER TRAFFIC
    // =========================================================================
    /// A peer pushed a freshly produced block.
    NewBlockReceived { payload: Vec<u8>, peer: PeerId },

    /// A peer asked for canonical blocks from a height.
    BlockRequest { payload: Vec<u8>, peer: PeerId },

    /// One block of a batch answer to our block request.
    BlockResponse { payload: Vec<u8>, peer: PeerId },

    /// A peer advertised its top weight.
    TopWeightAdvertised { payload: Vec<u8>, peer: PeerId },

    /// A peer asked for our chain piece below a height.
    ChainPieceRequested { payload: Vec<u8>, peer: PeerId },

    /// A peer answered our chain piece request.
    ChainPieceReceived { payload: Vec<u8>, peer: PeerId },

    /// A peer sent its chain piece and wants our blocks after the common ancestor.
    ChainPieceBlockRequested { payload: Vec<u8>, peer: PeerId },

    /// A peer answered our chain piece block request.
    ChainPieceBlockReceived { payload: Vec<u8>, peer: PeerId },
}

impl ChainEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::BlockAdded(_) => EventTopic::BlockAdded,
            Self::NewBlockReceived { .. } => EventTopic::NewBlockReceived,
            Self::BlockRequest { .. } => EventTopic::BlockRequest,
            Self::BlockResponse { .. } => EventTopic::BlockResponse,
            Self::TopWeightAdvertised { .. } => EventTopic::TopWeightAdvertised,
            Self::ChainPieceRequested { .. } => EventTopic::ChainPieceRequested,
            Self::ChainPieceReceived { .. } => EventTopic::ChainPieceReceived,
            Self::ChainPieceBlockRequested { .. } => EventTopic::ChainPieceBlockRequested,
            Self::ChainPieceBlockReceived { .. } => EventTopic::ChainPieceBlockReceived,
        }
    }

    /// The peer an inbound event came from. `None` for locally raised events.
    #[must_use]
    pub fn source_peer(&self) -> Option<PeerId> {
        match self {
            Self::BlockAdded(_) => None,
            Self::NewBlockReceived { peer, .. }
            | Self::BlockRequest { peer, .. }
            | Self::BlockResponse { peer, .. }
            | Self::TopWeightAdvertised { peer, .. }
            | Self::ChainPieceRequested { peer, .. }
            | Self::ChainPieceReceived { peer, .. }
            | Self::ChainPieceBlockRequested { peer, .. }
            | Self::ChainPieceBlockReceived { peer, .. } => Some(*peer),
        }
    }

    /// Build the inbound event for `topic` carrying `payload` from `peer`.
    ///
    /// Returns `None` for topics that are never inbound.
    #[must_use]
    pub fn inbound(topic: EventTopic, payload: Vec<u8>, peer: PeerId) -> Option<Self> {
        let event = match topic {
            EventTopic::NewBlockReceived => Self::NewBlockReceived { payload, peer },
            EventTopic::BlockRequest => Self::BlockRequest { payload, peer },
            EventTopic::BlockResponse => Self::BlockResponse { payload, peer },
            EventTopic::TopWeightAdvertised => Self::TopWeightAdvertised { payload, peer },
            EventTopic::ChainPieceRequested => Self::ChainPieceRequested { payload, peer },
            EventTopic::ChainPieceReceived => Self::ChainPieceReceived { payload, peer },
            EventTopic::ChainPieceBlockRequested => {
                Self::ChainPieceBlockRequested { payload, peer }
            }
            EventTopic::ChainPieceBlockReceived => Self::ChainPieceBlockReceived { payload, peer },
            EventTopic::BlockAdded | EventTopic::All => return None,
        };
        Some(event)
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    BlockAdded,
    NewBlockReceived,
    BlockRequest,
    BlockResponse,
    TopWeightAdvertised,
    ChainPieceRequested,
    ChainPieceReceived,
    ChainPieceBlockRequested,
    ChainPieceBlockReceived,
    /// All events (no filtering).
    All,
}

impl EventTopic {
    /// Every topic that carries inbound peer traffic.
    pub const INBOUND: [EventTopic; 8] = [
        EventTopic::NewBlockReceived,
        EventTopic::BlockRequest,
        EventTopic::BlockResponse,
        EventTopic::TopWeightAdvertised,
        EventTopic::ChainPieceRequested,
        EventTopic::ChainPieceReceived,
        EventTopic::ChainPieceBlockRequested,
        EventTopic::ChainPieceBlockReceived,
    ];
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Source peers to include. Empty means any source, including local events.
    pub peers: Vec<PeerId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            peers: Vec::new(),
        }
    }

    /// Create a filter for inbound events from specific peers.
    #[must_use]
    pub fn from_peers(peers: Vec<PeerId>) -> Self {
        Self {
            topics: Vec::new(),
            peers,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &ChainEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let peer_match = self.peers.is_empty()
            || event
                .source_peer()
                .is_some_and(|peer| self.peers.contains(&peer));

        topic_match && peer_match
    }
}
