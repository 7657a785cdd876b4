//! # Outbound Ports (Driven Ports)
//!
//! Collaborators the chain consumes. Execution, pooling, consensus and
//! transport live behind these traits.

use crate::domain::{ExecutionOutput, ExecutorError, NetworkError, ResolvedTransactions};
use async_trait::async_trait;
use shared_types::{
    default_prove_value, Block, BlockHeader, ChainWeight, Hash, NetworkMessage, PeerId,
    Transaction, U256,
};
use std::cmp::Ordering;

/// Executes a block's transactions on top of its parent's state.
#[async_trait]
pub trait Executor: Send + Sync {
    /// `parent_state_root` is the handle of the state to execute against.
    async fn execute(
        &self,
        header: &BlockHeader,
        transactions: &[Transaction],
        parent_state_root: Hash,
    ) -> Result<ExecutionOutput, ExecutorError>;
}

/// The transaction pool, as far as the chain needs it.
///
/// Called while the chain write lock is held, so implementations must not
/// call back into the chain.
pub trait TransactionPool: Send + Sync {
    fn resolve(&self, hashes: &[Hash]) -> ResolvedTransactions;

    /// `transactions` were committed in `block_hash`.
    fn mark_executed(&self, block_hash: &Hash, transactions: &[Transaction]);

    /// `transactions` belonged to a detached block and are pending again.
    fn unmark_executed(&self, transactions: &[Transaction]);

    /// Drop transactions the executor evicted.
    fn remove_evicted(&self, hashes: &[Hash]);
}

/// Consensus-side checks and the weight function.
pub trait ConsensusHelper: Send + Sync {
    /// Verify the proof and signature of `header` against its parent.
    fn verify_block(&self, header: &BlockHeader, parent: &BlockHeader) -> Result<bool, String>;

    /// Approximate height of `header`'s parent, derived from its proof.
    fn estimate_ancestor_height(&self, header: &BlockHeader) -> u64;

    fn provable_value(&self, header: &BlockHeader) -> U256 {
        default_prove_value(&header.prove_value)
    }

    fn chain_weight(&self, header: &BlockHeader) -> ChainWeight {
        ChainWeight::new(header.total_qn, self.provable_value(header))
    }

    fn compare_provable_weight(&self, a: &BlockHeader, b: &BlockHeader) -> Ordering {
        self.chain_weight(a).cmp(&self.chain_weight(b))
    }
}

/// Peer transport.
#[async_trait]
pub trait Network: Send + Sync {
    async fn send(&self, peer: PeerId, message: NetworkMessage) -> Result<(), NetworkError>;

    async fn broadcast(&self, message: NetworkMessage) -> Result<(), NetworkError>;

    async fn relay_to_neighbors(&self, message: NetworkMessage) -> Result<(), NetworkError>;
}

/// Receives blocks whose parent is unknown but whose estimated ancestor is
/// at or below the local height.
#[async_trait]
pub trait ForkHandler: Send + Sync {
    async fn on_fork_detected(&self, source: PeerId, block: Block);
}

/// Receives requests to catch up with a heavier peer.
#[async_trait]
pub trait SyncTrigger: Send + Sync {
    /// `None` lets the syncer pick its best candidate.
    async fn request_sync(&self, peer: Option<PeerId>);
}
