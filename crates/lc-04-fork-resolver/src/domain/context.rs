//! State of one ancestor negotiation.

use shared_types::{Block, BlockHeader, ChainPieceInfo, Hash, PeerId, TopWeightInfo};

/// What the negotiation waits for next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Awaiting {
    /// Blocks answering our chain piece.
    PieceBlocks,
    /// The peer's own piece ending at `height`.
    PieceInfo { height: u64 },
}

#[derive(Debug, Clone)]
pub struct ForkContext {
    /// Distinguishes this negotiation from earlier ones in timer callbacks.
    pub id: u64,
    pub target: PeerId,
    pub target_top: TopWeightInfo,
    /// Local top when the negotiation started.
    pub local_top: TopWeightInfo,
    /// The piece most recently sent with a block request.
    pub last_req_piece: Option<ChainPieceInfo>,
    pub awaiting: Awaiting,
    /// Requests sent so far.
    pub rounds: u32,
}

impl ForkContext {
    pub fn new(id: u64, target: PeerId, target_top: TopWeightInfo, local_top: TopWeightInfo) -> Self {
        Self {
            id,
            target,
            target_top,
            local_top,
            last_req_piece: None,
            awaiting: Awaiting::PieceBlocks,
            rounds: 0,
        }
    }

    /// Oldest hash of the last piece sent.
    pub fn last_hash(&self) -> Option<Hash> {
        self.last_req_piece
            .as_ref()
            .and_then(|piece| piece.hashes.last().copied())
    }

    /// Whether a trigger from `peer` advertising `top` should take over.
    pub fn superseded_by(&self, peer: &PeerId, top: &TopWeightInfo) -> bool {
        *peer != self.target && top.weight() > self.target_top.weight()
    }

    /// A piece answer from a peer other than the target still counts when it
    /// carries the branch we are negotiating for.
    pub fn is_same_fork(&self, top_header: &BlockHeader, blocks: &[Block]) -> bool {
        top_header.hash == self.target_top.hash
            || blocks.iter().any(|b| b.hash() == self.target_top.hash)
    }
}

/// First hash in `piece` satisfying `known`. Pieces are newest first, so this
/// is the highest shared block the piece covers.
pub fn first_known(piece: &[Hash], known: impl Fn(&Hash) -> bool) -> Option<Hash> {
    piece.iter().find(|h| known(h)).copied()
}
