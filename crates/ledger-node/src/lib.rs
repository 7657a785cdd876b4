//! # Ledger Node
//!
//! The ledger core as one explicitly constructed context. [`LedgerNode`]
//! owns the chain state machine, the fork resolver, the sync loop and the
//! peer score table, plus the event bus that inbound peer traffic arrives on.
//!
//! ## Startup Sequence
//!
//! 1. Load [`NodeConfig`] (JSON file or defaults)
//! 2. Install the tracing subscriber
//! 3. Build the context: store, chain, sync loop, fork resolver
//! 4. `start()`: register the message router and spawn the sync timers
//! 5. `shutdown()`: stop timers, router loops and outstanding requests
//!
//! ## Modular Structure
//!
//! - `config` - aggregated configuration
//! - `logging` - tracing subscriber setup
//! - `genesis` - genesis block construction
//! - `router` - decodes inbound payloads and dispatches them
//! - `adapters` - collaborator implementations for standalone runs and the
//!   optional RocksDB key-value store
//! - `node` - the context object

pub mod adapters;
pub mod config;
pub mod genesis;
pub mod logging;
pub mod node;
pub mod router;

pub use config::{BusConfig, GenesisConfig, NodeConfig};
pub use node::{Collaborators, LedgerNode};
pub use router::{inbound_event, MessageRouter, RouteError};
