//! # Error Types
//!
//! Errors shared across crates.

use thiserror::Error;

/// Failure to encode or decode a wire message.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    #[error("Encode failed for {kind}: {reason}")]
    Encode { kind: &'static str, reason: String },

    #[error("Decode failed for {kind}: {reason}")]
    Decode { kind: &'static str, reason: String },
}

pub type CodecResult<T> = Result<T, CodecError>;
