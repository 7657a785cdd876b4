//! Block sync domain.

pub mod candidates;
pub mod errors;

pub use candidates::{Admission, CandidatePool};
pub use errors::{SyncError, SyncResult};
