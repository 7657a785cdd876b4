//! # Chain Service
//!
//! `ChainStateMachine` construction and read queries. The add-block pipeline
//! lives in `pipeline`, top resets and batch replays in `adjust`.

mod adjust;
mod pipeline;

use crate::config::ChainConfig;
use crate::domain::{ChainError, ChainResult, VerifiedBlock};
use crate::ports::{ConsensusHelper, Executor, ForkHandler, Network, SyncTrigger, TransactionPool};
use lc_01_peer_score::PeerScoreManager;
use lc_02_block_store::{BlockStore, KeyValueStore, StoreResult};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use shared_bus::EventPublisher;
use shared_types::{
    short_hex, Block, BlockHeader, ChainWeight, Hash, PeerId, TopWeightInfo,
};
use std::cmp::Ordering;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Dependencies for ChainStateMachine
pub struct ChainDependencies {
    pub kv: Box<dyn KeyValueStore>,
    pub executor: Arc<dyn Executor>,
    pub tx_pool: Arc<dyn TransactionPool>,
    pub consensus: Arc<dyn ConsensusHelper>,
    pub network: Arc<dyn Network>,
    pub events: Arc<dyn EventPublisher>,
    /// Charged when a peer leaves a transaction request unanswered.
    pub peers: Arc<PeerScoreManager>,
}

/// A block suspended on missing transaction bodies.
struct PendingBlock {
    source: Option<PeerId>,
    block: Block,
    /// Tells this suspension apart from a later one of the same block.
    ticket: u64,
    /// Expires the transaction request sent for this block.
    timer: Option<JoinHandle<()>>,
}

impl Drop for PendingBlock {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// A block waiting for its parent, with the peer that sent it.
type FutureBlock = (Option<PeerId>, Block);

pub struct ChainStateMachine {
    store: BlockStore,
    executor: Arc<dyn Executor>,
    tx_pool: Arc<dyn TransactionPool>,
    consensus: Arc<dyn ConsensusHelper>,
    network: Arc<dyn Network>,
    events: Arc<dyn EventPublisher>,
    peers: Arc<PeerScoreManager>,
    /// Guards the canonical path. Never held across an await.
    lock: RwLock<()>,
    /// Serializes batch replays, which span many awaits.
    batch_lock: tokio::sync::Mutex<()>,
    /// Blocks waiting for their parent, keyed by the parent hash.
    future_blocks: Mutex<LruCache<Hash, FutureBlock>>,
    verified: Mutex<LruCache<Hash, VerifiedBlock>>,
    /// Shared with the fetch timers, which expire entries on their own.
    pending_tx: Arc<Mutex<LruCache<Hash, PendingBlock>>>,
    next_ticket: AtomicU64,
    /// Number of reorganizations and batch replays in progress.
    adjusting: AtomicUsize,
    fork_handler: RwLock<Option<Weak<dyn ForkHandler>>>,
    sync_trigger: RwLock<Option<Weak<dyn SyncTrigger>>>,
    config: ChainConfig,
}

fn lru<K: std::hash::Hash + Eq, V>(capacity: usize) -> LruCache<K, V> {
    LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
}

impl ChainStateMachine {
    /// Open the chain over `deps.kv`. An empty store is initialized with
    /// `genesis`; otherwise the persisted top is loaded and `genesis` is
    /// ignored.
    pub fn new(deps: ChainDependencies, config: ChainConfig, genesis: Block) -> ChainResult<Self> {
        let store = BlockStore::open(deps.kv, config.store.clone())?;
        if store.is_empty() {
            if !genesis.header.is_genesis() {
                return Err(ChainError::InvalidGenesis(genesis.height()));
            }
            store.insert_genesis(&genesis)?;
        }
        let top = store.top().unwrap_or_default();
        info!(
            height = top.height,
            hash = %short_hex(&top.hash),
            total_qn = top.total_qn,
            "[lc-03] chain ready"
        );

        Ok(Self {
            store,
            executor: deps.executor,
            tx_pool: deps.tx_pool,
            consensus: deps.consensus,
            network: deps.network,
            events: deps.events,
            peers: deps.peers,
            lock: RwLock::new(()),
            batch_lock: tokio::sync::Mutex::new(()),
            future_blocks: Mutex::new(lru(config.future_blocks)),
            verified: Mutex::new(lru(config.verified_blocks)),
            pending_tx: Arc::new(Mutex::new(lru(config.pending_tx_blocks))),
            next_ticket: AtomicU64::new(0),
            adjusting: AtomicUsize::new(0),
            fork_handler: RwLock::new(None),
            sync_trigger: RwLock::new(None),
            config,
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Install the component that negotiates common ancestors. Held weakly.
    pub fn set_fork_handler<H: ForkHandler + 'static>(&self, handler: &Arc<H>) {
        let weak: Weak<H> = Arc::downgrade(handler);
        let weak: Weak<dyn ForkHandler> = weak;
        *self.fork_handler.write() = Some(weak);
    }

    /// Install the component that catches up with heavier peers. Held weakly.
    pub fn set_sync_trigger<S: SyncTrigger + 'static>(&self, trigger: &Arc<S>) {
        let weak: Weak<S> = Arc::downgrade(trigger);
        let weak: Weak<dyn SyncTrigger> = weak;
        *self.sync_trigger.write() = Some(weak);
    }

    pub(crate) fn fork_handler(&self) -> Option<Arc<dyn ForkHandler>> {
        self.fork_handler.read().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn sync_trigger(&self) -> Option<Arc<dyn SyncTrigger>> {
        self.sync_trigger.read().as_ref().and_then(Weak::upgrade)
    }

    /// Ask the syncer to catch up, with `peer` or its best candidate.
    pub async fn request_sync(&self, peer: Option<PeerId>) {
        if let Some(trigger) = self.sync_trigger() {
            trigger.request_sync(peer).await;
        }
    }

    // =========================================================================
    // READ QUERIES
    // =========================================================================

    /// Run a store read under the chain read lock. Read failures are logged
    /// and reported as absent.
    fn read<T: Default>(&self, what: &'static str, f: impl FnOnce(&BlockStore) -> StoreResult<T>) -> T {
        let _guard = self.lock.read();
        match f(&self.store) {
            Ok(value) => value,
            Err(e) => {
                error!(query = what, error = %e, "[lc-03] store read failed");
                T::default()
            }
        }
    }

    pub fn top(&self) -> BlockHeader {
        let _guard = self.lock.read();
        self.store.top().unwrap_or_default()
    }

    pub fn height(&self) -> u64 {
        let _guard = self.lock.read();
        self.store.height()
    }

    pub fn top_weight(&self) -> ChainWeight {
        self.consensus.chain_weight(&self.top())
    }

    /// What the syncer advertises to neighbors.
    pub fn top_weight_info(&self) -> TopWeightInfo {
        let top = self.top();
        TopWeightInfo::from_header(&top, self.consensus.chain_weight(&top))
    }

    pub fn chain_weight(&self, header: &BlockHeader) -> ChainWeight {
        self.consensus.chain_weight(header)
    }

    /// Local top compared against `header`: `Less` means `header` is heavier.
    pub fn compare_chain_weight(&self, header: &BlockHeader) -> Ordering {
        self.consensus.compare_provable_weight(&self.top(), header)
    }

    pub fn has_block(&self, hash: &Hash) -> bool {
        self.read("has_block", |s| s.has_block(hash))
    }

    pub fn is_canonical(&self, hash: &Hash) -> bool {
        self.read("is_canonical", |s| s.is_canonical(hash))
    }

    pub fn header_by_hash(&self, hash: &Hash) -> Option<BlockHeader> {
        self.read("header_by_hash", |s| s.header_by_hash(hash))
    }

    pub fn block_by_hash(&self, hash: &Hash) -> Option<Block> {
        self.read("block_by_hash", |s| s.block_by_hash(hash))
    }

    pub fn header_by_height(&self, height: u64) -> Option<BlockHeader> {
        self.read("header_by_height", |s| s.header_by_height(height))
    }

    pub fn block_by_height(&self, height: u64) -> Option<Block> {
        self.read("block_by_height", |s| s.block_by_height(height))
    }

    pub fn header_floor(&self, height: u64) -> Option<BlockHeader> {
        self.read("header_floor", |s| s.header_floor(height))
    }

    pub fn header_ceil(&self, height: u64) -> Option<BlockHeader> {
        self.read("header_ceil", |s| s.header_ceil(height))
    }

    /// Canonical blocks from `height` inclusive, at most `limit`.
    pub fn blocks_after_height(&self, height: u64, limit: usize) -> Vec<Block> {
        self.read("blocks_after_height", |s| s.blocks_after_height(height, limit))
    }

    /// Up to `len` canonical hashes ending at the floor of `height`, newest first.
    pub fn chain_piece(&self, height: u64, len: usize) -> Vec<Hash> {
        self.read("chain_piece", |s| s.chain_piece(height, len))
    }

    /// True while a reorganization or a batch replay is running.
    pub fn is_adjusting(&self) -> bool {
        self.adjusting.load(AtomicOrdering::SeqCst) > 0
    }

    pub fn future_block_count(&self) -> usize {
        self.future_blocks.lock().len()
    }

    pub fn pending_block_count(&self) -> usize {
        self.pending_tx.lock().len()
    }
}

/// Counts as one adjustment in progress for its lifetime.
pub(crate) struct AdjustingGuard<'a>(&'a AtomicUsize);

impl<'a> AdjustingGuard<'a> {
    pub(crate) fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, AtomicOrdering::SeqCst);
        Self(counter)
    }
}

impl Drop for AdjustingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, AtomicOrdering::SeqCst);
    }
}
