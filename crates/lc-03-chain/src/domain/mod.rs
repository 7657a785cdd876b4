//! Domain layer.

pub mod chained;
pub mod errors;
pub mod execution;
pub mod result;

pub use chained::ensure_chained;
pub use errors::{ChainError, ChainResult, ExecutorError, NetworkError};
pub use execution::{ExecutionOutput, ResolvedTransactions};
pub(crate) use execution::VerifiedBlock;
pub use result::{AddBlockResult, BatchAddOutcome, RejectReason};
