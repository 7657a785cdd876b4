//! # Shared Types Crate
//!
//! Chain entities and wire messages used by every ledger crate.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: headers, blocks and the weight ordering are
//!   defined once here so that the store, the chain and the sync components
//!   agree on hashing and comparison.
//! - **Self-verifying headers**: a header's `hash` is recomputed from its other
//!   fields on every ingestion (`BlockHeader::verify_hash`).
//! - **Typed messages**: every peer message is a variant of `NetworkMessage`;
//!   byte encoding is bincode and lives in `messages`.

pub mod entities;
pub mod errors;
pub mod messages;
pub mod weight;

pub use entities::*;
pub use errors::*;
pub use messages::*;
pub use weight::*;
