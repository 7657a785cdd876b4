//! Fork resolution errors.
//!
//! None of these are fatal to the node. The router logs them and the
//! negotiation, if any, is already cleared.

use lc_03_chain::ChainError;
use shared_types::{short_hex, CodecError, Hash, PeerId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForkError {
    #[error("no fork negotiation in progress")]
    NoNegotiation,

    #[error("answer from {peer} belongs to another negotiation")]
    UnexpectedPeer { peer: PeerId },

    #[error("unexpected {kind} while negotiating")]
    UnexpectedMessage { kind: &'static str },

    #[error("peer top header fails its hash check")]
    InvalidTopHeader,

    #[error("returned branch is not chained")]
    NotChained,

    #[error("claimed ancestor {} is not on the local chain", short_hex(.0))]
    AncestorNotCanonical(Hash),

    #[error("no common ancestor with {peer}")]
    NoCommonAncestor { peer: PeerId },

    #[error("gave up after {rounds} rounds")]
    RoundsExhausted { rounds: u32 },

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub type ForkResult<T> = Result<T, ForkError>;
