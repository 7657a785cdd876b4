//! # Fork Resolver
//!
//! Negotiates a common ancestor with a peer whose block arrived with an
//! unknown parent below our height, then replays that peer's branch.
//!
//! ## Protocol
//!
//! 1. Send the peer our newest chain piece (`piece_length` canonical hashes
//!    from the top) as a `ChainPieceBlockRequest`. The peer answers with the
//!    first hash it knows and its canonical blocks from there.
//! 2. When the peer knows none of them, ask for *its* piece below our oldest
//!    hash (`ChainPieceInfoRequest`) and look for a hash we know. A hit is
//!    sent back as a one-hash `ChainPieceBlockRequest`; a miss walks further
//!    down.
//! 3. Every exchange is a round and re-arms the piece timer. Negotiation is
//!    abandoned after `max_rounds`.
//!
//! One negotiation runs at a time. A trigger from a different peer with a
//! strictly heavier top replaces it; anything else is ignored meanwhile.
//!
//! Timeouts penalize the peer through the peer score table and shrink the
//! batch size we ask it for.

pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use config::ForkConfig;
pub use domain::*;
pub use ports::*;
pub use service::{ForkDependencies, ForkResolver};
