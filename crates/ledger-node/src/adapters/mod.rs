//! # Adapters
//!
//! Collaborator implementations the node can run with on its own. A host
//! embedding the ledger core supplies its own executor, transaction pool,
//! consensus helper and transport instead.

pub mod consensus;
pub mod executor;
pub mod network;
pub mod pool;

#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;

pub use consensus::SequentialConsensus;
pub use executor::HashingExecutor;
pub use network::OfflineNetwork;
pub use pool::MemoryTxPool;

#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{RocksDbConfig, RocksDbStore};
