//! # Core Chain Entities
//!
//! ## Clusters
//!
//! - **Identity**: `Hash`, `PeerId`, `Address`
//! - **Chain**: `BlockHeader`, `Block`, `Transaction`
//! - **Execution**: `Receipt`

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

// Re-export U256 from primitive-types for use across all crates
pub use primitive_types::U256;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; 32];

/// Hash used for empty roots (no transactions, no receipts).
pub const EMPTY_HASH: Hash = [0u8; 32];

/// A 20-byte account address.
pub type Address = [u8; 20];

/// Unique identifier of a node on the network.
///
/// Block producers (castors) are nodes too, so a header's `castor` is a `PeerId`
/// that missing transactions can be requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&short_hex(&self.0))
    }
}

/// Abbreviated lowercase hex of the first six bytes, for log fields.
pub fn short_hex(bytes: &[u8]) -> String {
    bytes.iter().take(6).map(|b| format!("{b:02x}")).collect()
}

// =============================================================================
// CLUSTER B: THE CHAIN
// =============================================================================

/// A transaction as carried inside a block.
///
/// Execution semantics belong to the executor; the chain only needs a stable
/// identity for each transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Transaction {
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: u64,
    pub value: u64,
    pub gas_price: u64,
    pub data: Vec<u8>,
}

impl Transaction {
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.from);
        if let Some(to) = &self.to {
            hasher.update(to);
        }
        hasher.update(self.nonce.to_le_bytes());
        hasher.update(self.value.to_le_bytes());
        hasher.update(self.gas_price.to_le_bytes());
        hasher.update(&self.data);
        hasher.finalize().into()
    }
}

/// Block header. Immutable once sealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Hash over every other field except `signature`.
    pub hash: Hash,
    pub height: u64,
    pub pre_hash: Hash,
    /// Accumulated weight counter along the chain.
    pub total_qn: u64,
    /// Opaque proof bytes; the provable value used as weight tie-breaker is
    /// derived from them.
    pub prove_value: Vec<u8>,
    pub castor: PeerId,
    pub group_id: Hash,
    /// Castor signature over `hash`.
    pub signature: Vec<u8>,
    pub tx_root: Hash,
    pub receipt_root: Hash,
    pub state_root: Hash,
    pub cur_time: u64,
    pub extra_data: Vec<u8>,
    /// Hashes of the block's transactions, in execution order.
    pub tx_hashes: Vec<Hash>,
}

impl BlockHeader {
    /// Recompute the header hash from its fields.
    pub fn compute_hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.pre_hash);
        hasher.update(self.total_qn.to_le_bytes());
        hasher.update((self.prove_value.len() as u64).to_le_bytes());
        hasher.update(&self.prove_value);
        hasher.update(self.castor.0);
        hasher.update(self.group_id);
        hasher.update(self.tx_root);
        hasher.update(self.receipt_root);
        hasher.update(self.state_root);
        hasher.update(self.cur_time.to_le_bytes());
        hasher.update((self.extra_data.len() as u64).to_le_bytes());
        hasher.update(&self.extra_data);
        for tx_hash in &self.tx_hashes {
            hasher.update(tx_hash);
        }
        hasher.finalize().into()
    }

    /// Set `hash` from the current field values.
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.hash = self.compute_hash();
        self
    }

    pub fn verify_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

/// A header plus its ordered transactions.
///
/// `transactions` may be empty while `header.tx_hashes` is not: compact blocks
/// carry only hashes and the bodies are resolved from the transaction pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn pre_hash(&self) -> Hash {
        self.header.pre_hash
    }

    /// True when the block carries every transaction body it declares.
    pub fn has_bodies(&self) -> bool {
        self.transactions.len() == self.header.tx_hashes.len()
    }

    /// Check that carried bodies hash, in order, to the declared hashes.
    pub fn bodies_match_declared(&self) -> bool {
        self.has_bodies()
            && self
                .transactions
                .iter()
                .zip(&self.header.tx_hashes)
                .all(|(tx, declared)| tx.hash() == *declared)
    }
}

/// Transaction root: SHA-256 over the concatenated transaction hashes.
pub fn compute_tx_root(tx_hashes: &[Hash]) -> Hash {
    if tx_hashes.is_empty() {
        return EMPTY_HASH;
    }
    let mut hasher = Sha256::new();
    for h in tx_hashes {
        hasher.update(h);
    }
    hasher.finalize().into()
}

// =============================================================================
// CLUSTER C: EXECUTION
// =============================================================================

/// Outcome of executing one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Receipt {
    pub tx_hash: Hash,
    pub success: bool,
    pub gas_used: u64,
    pub logs: Vec<Vec<u8>>,
}

impl Receipt {
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.tx_hash);
        hasher.update([u8::from(self.success)]);
        hasher.update(self.gas_used.to_le_bytes());
        for log in &self.logs {
            hasher.update((log.len() as u64).to_le_bytes());
            hasher.update(log);
        }
        hasher.finalize().into()
    }
}

/// Receipt root: SHA-256 over the concatenated receipt hashes.
pub fn compute_receipt_root(receipts: &[Receipt]) -> Hash {
    if receipts.is_empty() {
        return EMPTY_HASH;
    }
    let mut hasher = Sha256::new();
    for r in receipts {
        hasher.update(r.hash());
    }
    hasher.finalize().into()
}
