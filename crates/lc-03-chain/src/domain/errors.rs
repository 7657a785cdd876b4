//! Error types for the chain and its collaborators.

use lc_02_block_store::StoreError;
use shared_types::{short_hex, CodecError, Hash, PeerId};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Block {} is not on the canonical chain", short_hex(.0))]
    NotCanonical(Hash),

    #[error("Genesis cannot be removed")]
    CannotRemoveGenesis,

    #[error("Genesis block must have height 0, got {0}")]
    InvalidGenesis(u64),
}

pub type ChainResult<T> = Result<T, ChainError>;

/// Failure reported by an executor.
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    #[error("Execution failed: {0}")]
    Failed(String),

    #[error("State {} not available", short_hex(.0))]
    MissingState(Hash),
}

#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("Peer {0} is unreachable")]
    PeerUnreachable(PeerId),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Network is shut down")]
    Closed,
}
