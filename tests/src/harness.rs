//! # Loopback Harness
//!
//! Nodes built here run the full ledger core: real chain, fork resolver,
//! sync loop and event bus. Their transport is a [`LoopbackHub`] that hands
//! every outbound message straight to the target node's `deliver`, so
//! propagation is exercised end to end without sockets.
//!
//! Blocks come from [`next_block`], which derives roots the same way the
//! node's `HashingExecutor` does; anything built here passes validation on
//! every node.

use async_trait::async_trait;
use lc_02_block_store::InMemoryKVStore;
use lc_03_chain::{AddBlockResult, Network, NetworkError};
use ledger_node::adapters::executor::TRANSFER_GAS;
use ledger_node::adapters::{HashingExecutor, MemoryTxPool, SequentialConsensus};
use ledger_node::{Collaborators, LedgerNode, NodeConfig};
use parking_lot::RwLock;
use shared_types::{
    compute_receipt_root, compute_tx_root, Block, BlockHeader, Hash, NetworkMessage, PeerId,
    Receipt, Transaction,
};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

// =============================================================================
// LOOPBACK TRANSPORT
// =============================================================================

/// In-process switchboard connecting every node spawned on it.
#[derive(Default)]
pub struct LoopbackHub {
    nodes: RwLock<HashMap<PeerId, Weak<LedgerNode>>>,
    /// Directed links that silently lose traffic.
    cut: RwLock<HashSet<(PeerId, PeerId)>>,
    /// Message kinds a node never gets out.
    muted: RwLock<HashSet<(PeerId, &'static str)>>,
    delivered: AtomicU64,
    lost: AtomicU64,
}

impl LoopbackHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Build a node with `config` wired to this hub. It receives traffic
    /// only after [`TestNode::start`].
    pub fn spawn_node(self: &Arc<Self>, seed: u8, config: NodeConfig) -> TestNode {
        let id = PeerId::new([seed; 32]);
        let pool = Arc::new(MemoryTxPool::new());
        let collaborators = Collaborators {
            executor: Arc::new(HashingExecutor),
            tx_pool: pool.clone(),
            consensus: Arc::new(SequentialConsensus),
            network: Arc::new(LoopbackNetwork {
                me: id,
                hub: Arc::clone(self),
            }),
        };
        let node = LedgerNode::new(config, Box::new(InMemoryKVStore::new()), collaborators)
            .map(Arc::new)
            .unwrap_or_else(|e| panic!("node {id} failed to build: {e:#}"));
        self.nodes.write().insert(id, Arc::downgrade(&node));
        TestNode { id, node, pool }
    }

    /// Lose all traffic between `a` and `b` in both directions.
    pub fn partition(&self, a: PeerId, b: PeerId) {
        let mut cut = self.cut.write();
        cut.insert((a, b));
        cut.insert((b, a));
    }

    pub fn heal(&self) {
        self.cut.write().clear();
    }

    /// Drop every `kind` message `peer` sends from now on.
    pub fn mute(&self, peer: PeerId, kind: &'static str) {
        self.muted.write().insert((peer, kind));
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn lost(&self) -> u64 {
        self.lost.load(Ordering::Relaxed)
    }

    fn peers_of(&self, me: PeerId) -> Vec<PeerId> {
        self.nodes.read().keys().copied().filter(|p| *p != me).collect()
    }

    async fn route(&self, from: PeerId, to: PeerId, message: &NetworkMessage) -> Result<(), NetworkError> {
        let Some(node) = self.nodes.read().get(&to).and_then(Weak::upgrade) else {
            return Err(NetworkError::PeerUnreachable(to));
        };
        if self.cut.read().contains(&(from, to)) || self.muted.read().contains(&(from, message.kind())) {
            self.lost.fetch_add(1, Ordering::Relaxed);
            debug!(%from, %to, kind = message.kind(), "loopback message lost");
            return Ok(());
        }
        match node.deliver(from, message).await {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => debug!(%from, %to, error = %e, "loopback delivery refused"),
        }
        Ok(())
    }
}

/// One node's view of the hub.
pub struct LoopbackNetwork {
    me: PeerId,
    hub: Arc<LoopbackHub>,
}

#[async_trait]
impl Network for LoopbackNetwork {
    async fn send(&self, peer: PeerId, message: NetworkMessage) -> Result<(), NetworkError> {
        self.hub.route(self.me, peer, &message).await
    }

    async fn broadcast(&self, message: NetworkMessage) -> Result<(), NetworkError> {
        for peer in self.hub.peers_of(self.me) {
            self.hub.route(self.me, peer, &message).await?;
        }
        Ok(())
    }

    async fn relay_to_neighbors(&self, message: NetworkMessage) -> Result<(), NetworkError> {
        self.broadcast(message).await
    }
}

// =============================================================================
// NODES
// =============================================================================

pub struct TestNode {
    pub id: PeerId,
    pub node: Arc<LedgerNode>,
    pub pool: Arc<MemoryTxPool>,
}

impl TestNode {
    pub fn start(&self) {
        self.node.start();
    }

    pub fn top(&self) -> BlockHeader {
        self.node.chain().top()
    }

    pub fn height(&self) -> u64 {
        self.node.chain().height()
    }

    /// Add blocks directly to the chain without announcing them.
    pub async fn import(&self, blocks: &[Block]) {
        for block in blocks {
            let result = self.node.chain().add_block(None, block.clone()).await;
            assert_eq!(
                result,
                AddBlockResult::Accepted,
                "import of height {} on {} failed",
                block.height(),
                self.id
            );
        }
    }

    /// Extend our own top by `steps.len()` blocks without announcing them.
    pub async fn grow(&self, steps: &[u64], salt: u8) -> Vec<Block> {
        let blocks = branch(&self.top(), steps, salt);
        self.import(&blocks).await;
        blocks
    }

    /// Produce one block on our top and broadcast it.
    pub async fn produce(&self, qn_step: u64, salt: u8, transactions: Vec<Transaction>) -> Block {
        let block = next_block(&self.top(), qn_step, salt, transactions);
        let result = self.node.submit_block(block.clone()).await;
        assert_eq!(result, AddBlockResult::Accepted, "produced block rejected on {}", self.id);
        block
    }
}

// =============================================================================
// BLOCK BUILDERS
// =============================================================================

/// A child of `parent` whose roots match what `HashingExecutor` computes.
pub fn next_block(parent: &BlockHeader, qn_step: u64, salt: u8, transactions: Vec<Transaction>) -> Block {
    let tx_hashes: Vec<Hash> = transactions.iter().map(Transaction::hash).collect();
    let receipts: Vec<Receipt> = tx_hashes
        .iter()
        .map(|tx_hash| Receipt {
            tx_hash: *tx_hash,
            success: true,
            gas_used: TRANSFER_GAS,
            logs: vec![],
        })
        .collect();
    let header = BlockHeader {
        height: parent.height + 1,
        pre_hash: parent.hash,
        total_qn: parent.total_qn + qn_step,
        prove_value: vec![salt, (parent.height + 1) as u8],
        castor: PeerId::new([salt; 32]),
        tx_root: compute_tx_root(&tx_hashes),
        receipt_root: compute_receipt_root(&receipts),
        state_root: HashingExecutor::state_root(&parent.state_root, &transactions),
        cur_time: parent.cur_time + 3,
        tx_hashes,
        ..Default::default()
    }
    .sealed();
    Block::new(header, transactions)
}

/// Empty blocks on top of `parent`, one per qn step.
pub fn branch(parent: &BlockHeader, steps: &[u64], salt: u8) -> Vec<Block> {
    let mut tip = parent.clone();
    steps
        .iter()
        .map(|step| {
            let block = next_block(&tip, *step, salt, vec![]);
            tip = block.header.clone();
            block
        })
        .collect()
}

pub fn transfer(nonce: u64, value: u64) -> Transaction {
    Transaction {
        from: [7; 20],
        to: Some([8; 20]),
        nonce,
        value,
        gas_price: 1,
        data: vec![],
    }
}

// =============================================================================
// WAITING
// =============================================================================

/// Poll `done` until it holds or `limit` elapses. Under paused time the
/// sleeps advance the clock, so sync and advertise timers keep firing.
pub async fn wait_until(limit: Duration, mut done: impl FnMut() -> bool) -> bool {
    let step = Duration::from_millis(50);
    let mut waited = Duration::ZERO;
    while waited < limit {
        if done() {
            return true;
        }
        tokio::time::sleep(step).await;
        waited += step;
    }
    done()
}

/// Run `nodes` to a clean stop.
pub async fn shutdown_all(nodes: &[&TestNode]) {
    for node in nodes {
        node.node.shutdown().await;
    }
}

/// Await `fut` with a generous deadline, panicking with `what` on expiry.
pub async fn within<T>(what: &str, fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(120), fut)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}
