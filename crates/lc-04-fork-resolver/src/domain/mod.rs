//! Fork negotiation domain.

pub mod context;
pub mod errors;

pub use context::{first_known, Awaiting, ForkContext};
pub use errors::{ForkError, ForkResult};
