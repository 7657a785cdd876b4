//! # Block Sync
//!
//! Keeps the node on the heaviest chain its neighbors know about.
//!
//! - **Advertise**: every `advertise_interval` the local top weight goes to
//!   neighbors (skipped in light mode and while we only have genesis).
//! - **Collect**: a neighbor advertising more weight than ours enters the
//!   bounded candidate pool, displacing the lightest entry when full.
//! - **Sync**: every `sync_interval`, and greedily after each successful
//!   batch, the heaviest candidate that is not evil is asked for blocks just
//!   above our height. Each request has a timer; a timeout marks the peer
//!   evil and moves on to the next candidate.
//!
//! Responses stream in one block per message and are buffered per peer until
//! the batch's last message, then applied through
//! `ChainStateMachine::batch_add_blocks`.

pub mod config;
pub mod domain;
pub mod service;

pub use config::SyncConfig;
pub use domain::*;
pub use service::{SyncDependencies, SyncLoop};
