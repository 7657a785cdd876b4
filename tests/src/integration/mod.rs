//! # Cross-Node Flows
//!
//! Every scenario runs several [`crate::harness::TestNode`]s on one loopback
//! hub under paused tokio time, so the 3 s advertise and sync timers and the
//! 5 s request timeouts elapse instantly once every task is idle.
//!
//! - `propagation` - produced blocks reaching peers, out-of-order arrival,
//!   `BlockAdded` events
//! - `sync` - lagging nodes catching up, unresponsive peers penalized
//! - `forks` - competing tops, deep forks resolved by chain piece negotiation

pub mod forks;
pub mod propagation;
pub mod sync;
