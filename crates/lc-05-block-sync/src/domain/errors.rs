//! Block sync errors.

use shared_types::{CodecError, PeerId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("block response from {peer} without a request in flight")]
    Unsolicited { peer: PeerId },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub type SyncResult<T> = Result<T, SyncError>;
