//! Execution results.

use shared_types::{Hash, Receipt, Transaction};

/// What an executor returns for one block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionOutput {
    pub state_root: Hash,
    pub receipts: Vec<Receipt>,
    /// Transactions the pool should drop.
    pub evicted: Vec<Hash>,
}

/// Transaction pool lookup result. `found` is in request order and is only
/// complete when `missing` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedTransactions {
    pub found: Vec<Transaction>,
    pub missing: Vec<Hash>,
}

/// Execution result cached by block hash until the block commits or is
/// superseded.
#[derive(Debug, Clone)]
pub(crate) struct VerifiedBlock {
    pub transactions: Vec<Transaction>,
    pub output: ExecutionOutput,
}
