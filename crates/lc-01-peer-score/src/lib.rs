//! # Peer Score
//!
//! Tracks per-peer reliability for the sync components: a timeout counter, the
//! last time we heard from the peer, and the batch size we ask it for.
//!
//! A peer is **evil** (excluded from sync candidacy) when its timeout counter
//! exceeds the configured threshold or it has been silent longer than the
//! staleness window. Entries are created lazily on first contact and the table
//! is bounded by an LRU.
//!
//! ## Request batch sizing
//!
//! Each peer starts at the maximum block batch size. A successful response
//! grows it by one (capped at the maximum); a timeout shrinks it by the
//! decrease step (floored at one).

mod config;
mod manager;
mod meter;

pub use config::PeerScoreConfig;
pub use manager::PeerScoreManager;
pub use meter::PeerMeter;
