//! Domain layer: storage keys and errors.

pub mod errors;
pub mod keys;

pub use errors::{KVStoreError, StoreError, StoreResult};
pub use keys::KeyPrefix;
