//! # Ledger Test Suite
//!
//! Multi-node scenarios over an in-process loopback transport.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # criterion benchmarks for the chain hot paths
//! └── src/
//!     ├── harness.rs    # loopback hub, node spawning, block builders
//!     └── integration/  # cross-node flows: propagation, sync, forks
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p ledger-tests
//!
//! # By category
//! cargo test -p ledger-tests integration::sync
//! cargo test -p ledger-tests integration::forks
//!
//! # Benchmarks
//! cargo bench -p ledger-tests
//! ```

pub mod harness;
pub mod integration;
