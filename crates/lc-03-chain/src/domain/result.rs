//! Outcomes of adding blocks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of [`crate::ChainStateMachine::add_block`]. Never an error: every
/// way a block can fail to become canonical is one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddBlockResult {
    Accepted,
    AlreadyExists,
    /// The local chain is at least as heavy.
    LowerWeight,
    Rejected(RejectReason),
}

impl AddBlockResult {
    /// Accepted or already known: a batch can keep going.
    pub fn is_success(&self) -> bool {
        matches!(self, AddBlockResult::Accepted | AddBlockResult::AlreadyExists)
    }
}

impl fmt::Display for AddBlockResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddBlockResult::Accepted => f.write_str("accepted"),
            AddBlockResult::AlreadyExists => f.write_str("already-exists"),
            AddBlockResult::LowerWeight => f.write_str("lower-weight"),
            AddBlockResult::Rejected(reason) => write!(f, "rejected({reason})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    HashMismatch,
    TxRootMismatch,
    InvalidHeight,
    /// Parked as a future block; not a failure.
    MissingParent,
    Consensus,
    /// Suspended until the bodies arrive; not a failure.
    MissingTransactions,
    Execution,
    StateRootMismatch,
    ReceiptRootMismatch,
    CommitFailure,
}

impl RejectReason {
    /// Suspensions are retried when the dependency arrives.
    pub fn is_suspension(&self) -> bool {
        matches!(
            self,
            RejectReason::MissingParent | RejectReason::MissingTransactions
        )
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::HashMismatch => "hash-mismatch",
            RejectReason::TxRootMismatch => "tx-root-mismatch",
            RejectReason::InvalidHeight => "invalid-height",
            RejectReason::MissingParent => "missing-parent",
            RejectReason::Consensus => "consensus",
            RejectReason::MissingTransactions => "missing-transactions",
            RejectReason::Execution => "execution",
            RejectReason::StateRootMismatch => "state-root-mismatch",
            RejectReason::ReceiptRootMismatch => "receipt-root-mismatch",
            RejectReason::CommitFailure => "commit-failure",
        };
        f.write_str(s)
    }
}

/// Outcome of [`crate::ChainStateMachine::batch_add_blocks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchAddOutcome {
    /// Each block was offered in order until one failed. `last` is the
    /// result of the final block attempted.
    Applied { added: usize, last: AddBlockResult },
    /// Every block was already known.
    AllKnown,
    NotChained,
    /// The batch ends lighter than the local top; nothing changed.
    LowerWeight,
    /// The first unknown block's parent is unknown; handed to fork resolution.
    ForkDetected,
    /// Resetting the top to the batch's attachment point failed.
    ResetFailed,
}

impl BatchAddOutcome {
    /// True when every offered block was accepted or already known.
    pub fn all_succeeded(&self) -> bool {
        match self {
            BatchAddOutcome::Applied { last, .. } => last.is_success(),
            BatchAddOutcome::AllKnown => true,
            _ => false,
        }
    }
}
