//! # Chain State Machine (lc-03)
//!
//! Owns the canonical path. Every candidate block, whether produced locally
//! or received from a peer, goes through [`ChainStateMachine::add_block`]:
//!
//! 1. existence check
//! 2. structural validation (header hash, transaction root, height)
//! 3. parent lookup; an unknown parent parks the block as a future block and
//!    hands it to fork resolution or sync
//! 4. cheap weight pre-check against the current top
//! 5. consensus verification
//! 6. transaction resolution; missing bodies suspend the block
//! 7. execution and root verification, cached by block hash
//! 8. commit under the chain write lock: append, or reorganize when the
//!    block is heavier than a top it does not extend
//!
//! Steps 1-7 run without the write lock. The weight comparison is repeated
//! under the lock because local production can move the top in between.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - add-block outcomes, execution results, errors
//! - `ports/` - collaborators: executor, transaction pool, consensus helper,
//!   network, plus the fork/sync hand-off points
//! - `service/` - `ChainStateMachine`

pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use config::ChainConfig;
pub use domain::*;
pub use ports::*;
pub use service::{ChainDependencies, ChainStateMachine};
