//! # Block Store (lc-02)
//!
//! Durable mapping of the canonical chain over an abstract key-value store.
//!
//! ## Persisted layout
//!
//! | Prefix | Key | Value |
//! |--------|-----|-------|
//! | `bh` | block hash | bincode `BlockHeader` |
//! | `bb` | block hash | bincode `Vec<Transaction>` |
//! | `hi` | 8-byte big-endian height | block hash |
//! | `bcurrent` | (none) | hash of the current top |
//!
//! Only canonical blocks are stored. Detaching a block tombstones all of its
//! keys. Every append and every reset is a single atomic batch that also
//! rewrites the top key, so a crash never leaves the indexes disagreeing with
//! the top pointer.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - keys and errors
//! - `ports/` - the `KeyValueStore` driven port
//! - `adapters/` - in-memory key-value store
//! - `service/` - `BlockStore`, the only type the chain talks to

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::InMemoryKVStore;
pub use config::StoreConfig;
pub use domain::{KVStoreError, KeyPrefix, StoreError, StoreResult};
pub use ports::{BatchOperation, KeyValueStore};
pub use service::BlockStore;
