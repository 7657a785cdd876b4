//! Ports for the fork resolver.

pub mod outbound;

pub use outbound::{NoPeerTops, PeerTopSource};
