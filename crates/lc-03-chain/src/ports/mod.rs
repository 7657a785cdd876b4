//! Ports layer.

pub mod outbound;

pub use outbound::{ConsensusHelper, Executor, ForkHandler, Network, SyncTrigger, TransactionPool};
