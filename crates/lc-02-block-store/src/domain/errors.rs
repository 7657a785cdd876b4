//! # Domain Errors
//!
//! - `KVStoreError` is what a key-value backend reports.
//! - `StoreError` is what the block store reports to the chain.

use shared_types::{short_hex, Hash};
use thiserror::Error;

/// Key-value store errors.
#[derive(Debug, Clone, Error)]
pub enum KVStoreError {
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },

    #[error("Key not found in KV store")]
    NotFound,
}

/// Errors that can occur during block store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Block not found: {}", short_hex(.hash))]
    BlockNotFound { hash: Hash },

    #[error("Store already holds a chain; genesis can only be inserted once")]
    AlreadyInitialized,

    #[error("Genesis block must have height 0, got {height}")]
    InvalidGenesis { height: u64 },

    #[error("Block parent {} is not the current top {}", short_hex(.parent), short_hex(.top))]
    ParentNotTop { parent: Hash, top: Hash },

    #[error("Block {} is not on the canonical chain", short_hex(.hash))]
    NotCanonical { hash: Hash },

    #[error("Store has no top block")]
    Uninitialized,

    #[error("Stored data is corrupt: {message}")]
    Corruption { message: String },

    #[error(transparent)]
    Backend(KVStoreError),
}

impl StoreError {
    /// Corruption cannot be recovered from by retrying.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StoreError::Corruption { .. } | StoreError::Backend(KVStoreError::CorruptionError { .. })
        )
    }
}

impl From<KVStoreError> for StoreError {
    fn from(e: KVStoreError) -> Self {
        StoreError::Backend(e)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
