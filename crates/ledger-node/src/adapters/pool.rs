//! In-memory transaction pool.

use lc_03_chain::{ResolvedTransactions, TransactionPool};
use parking_lot::Mutex;
use shared_types::{Hash, Transaction};
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct PoolState {
    transactions: HashMap<Hash, Transaction>,
    /// Hashes committed in some canonical block.
    executed: HashSet<Hash>,
}

/// Keeps every transaction it has seen, flagged pending or executed.
#[derive(Default)]
pub struct MemoryTxPool {
    state: Mutex<PoolState>,
}

impl MemoryTxPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the transaction was already known.
    pub fn add(&self, tx: Transaction) -> bool {
        let hash = tx.hash();
        self.state.lock().transactions.insert(hash, tx).is_none()
    }

    /// Transactions not yet committed, in no particular order.
    pub fn pending(&self) -> Vec<Transaction> {
        let state = self.state.lock();
        state
            .transactions
            .iter()
            .filter(|(hash, _)| !state.executed.contains(*hash))
            .map(|(_, tx)| tx.clone())
            .collect()
    }

    pub fn is_executed(&self, hash: &Hash) -> bool {
        self.state.lock().executed.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.state.lock().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransactionPool for MemoryTxPool {
    fn resolve(&self, hashes: &[Hash]) -> ResolvedTransactions {
        let state = self.state.lock();
        let mut resolved = ResolvedTransactions::default();
        for hash in hashes {
            match state.transactions.get(hash) {
                Some(tx) => resolved.found.push(tx.clone()),
                None => resolved.missing.push(*hash),
            }
        }
        resolved
    }

    fn mark_executed(&self, _block_hash: &Hash, transactions: &[Transaction]) {
        let mut state = self.state.lock();
        for tx in transactions {
            let hash = tx.hash();
            state.transactions.entry(hash).or_insert_with(|| tx.clone());
            state.executed.insert(hash);
        }
    }

    fn unmark_executed(&self, transactions: &[Transaction]) {
        let mut state = self.state.lock();
        for tx in transactions {
            state.executed.remove(&tx.hash());
        }
    }

    fn remove_evicted(&self, hashes: &[Hash]) {
        let mut state = self.state.lock();
        for hash in hashes {
            state.transactions.remove(hash);
            state.executed.remove(hash);
        }
    }
}
