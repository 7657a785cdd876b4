//! # Ledger Node
//!
//! Runs a single ledger node with the standalone collaborators: deterministic
//! execution, an in-memory pool and no peers. Useful for exercising the
//! storage backend and the timers; a networked deployment embeds
//! [`ledger_node::LedgerNode`] with its own transport.
//!
//! ```text
//! ledger-node [CONFIG.json]
//! ```
//!
//! `LEDGER_CONFIG` is read when no path is given. `RUST_LOG` overrides the
//! configured log level.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use ledger_node::adapters::{HashingExecutor, MemoryTxPool, OfflineNetwork, SequentialConsensus};
use ledger_node::logging::init_tracing;
use ledger_node::{Collaborators, LedgerNode, NodeConfig};
use tracing::info;

fn load_config() -> Result<NodeConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("LEDGER_CONFIG").ok())
        .map(PathBuf::from);
    match path {
        Some(path) => NodeConfig::load(&path),
        None => NodeConfig::from_json("{}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_tracing(&config.log_level)?;

    let node = LedgerNode::open(
        config,
        Collaborators {
            executor: Arc::new(HashingExecutor),
            tx_pool: Arc::new(MemoryTxPool::new()),
            consensus: Arc::new(SequentialConsensus),
            network: Arc::new(OfflineNetwork::new()),
        },
    )?;
    node.start();

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    node.shutdown().await;
    Ok(())
}
