//! # Ledger Node Context
//!
//! Construction order matters: the sync loop exists before the fork resolver
//! because the resolver reads peer advertisements from its candidate pool,
//! and the chain only holds weak references to both.

use crate::config::NodeConfig;
use crate::genesis::genesis_block;
use crate::router::{inbound_event, MessageRouter, RouteError};
use anyhow::{Context, Result};
use lc_01_peer_score::PeerScoreManager;
use lc_02_block_store::{InMemoryKVStore, KeyValueStore};
use lc_03_chain::{
    AddBlockResult, ChainDependencies, ChainStateMachine, ConsensusHelper, Executor, Network,
    TransactionPool,
};
use lc_04_fork_resolver::{ForkDependencies, ForkResolver};
use lc_05_block_sync::{SyncDependencies, SyncLoop};
use parking_lot::Mutex;
use shared_bus::{EventDispatcher, EventFilter, EventHandler, EventPublisher, EventTopic, InMemoryEventBus};
use shared_types::{short_hex, Block, NetworkMessage, PeerId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{info, warn};

/// What the host plugs into the ledger core.
pub struct Collaborators {
    pub executor: Arc<dyn Executor>,
    pub tx_pool: Arc<dyn TransactionPool>,
    pub consensus: Arc<dyn ConsensusHelper>,
    pub network: Arc<dyn Network>,
}

pub struct LedgerNode {
    config: NodeConfig,
    bus: Arc<InMemoryEventBus>,
    chain: Arc<ChainStateMachine>,
    peers: Arc<PeerScoreManager>,
    fork: Arc<ForkResolver>,
    sync: Arc<SyncLoop>,
    network: Arc<dyn Network>,
    dispatcher: EventDispatcher,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl LedgerNode {
    /// Build every component over `kv`. Nothing runs until [`Self::start`].
    pub fn new(config: NodeConfig, kv: Box<dyn KeyValueStore>, collaborators: Collaborators) -> Result<Self> {
        let genesis = genesis_block(&config.genesis);
        let bus = Arc::new(InMemoryEventBus::with_capacity(config.bus.channel_capacity));
        let network = collaborators.network;
        let peers = Arc::new(PeerScoreManager::new(config.peers.clone()));

        let chain = Arc::new(
            ChainStateMachine::new(
                ChainDependencies {
                    kv,
                    executor: collaborators.executor,
                    tx_pool: collaborators.tx_pool,
                    consensus: collaborators.consensus,
                    network: Arc::clone(&network),
                    events: bus.clone(),
                    peers: Arc::clone(&peers),
                },
                config.chain.clone(),
                genesis,
            )
            .context("chain state machine failed to open")?,
        );
        let sync = SyncLoop::new(
            SyncDependencies {
                chain: Arc::clone(&chain),
                peers: Arc::clone(&peers),
                network: Arc::clone(&network),
            },
            config.sync.clone(),
        );
        let fork = ForkResolver::new(
            ForkDependencies {
                chain: Arc::clone(&chain),
                peers: Arc::clone(&peers),
                network: Arc::clone(&network),
                peer_tops: sync.clone(),
            },
            config.fork.clone(),
        );
        chain.set_fork_handler(&fork);
        chain.set_sync_trigger(&sync);

        let dispatcher = EventDispatcher::with_concurrency(bus.clone(), config.bus.dispatch_concurrency);
        let (shutdown_tx, _) = watch::channel(false);

        let top = chain.top();
        info!(
            height = top.height,
            hash = %short_hex(&top.hash),
            "ledger node built"
        );

        Ok(Self {
            config,
            bus,
            chain,
            peers,
            fork,
            sync,
            network,
            dispatcher,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    /// Open the store named by `config.data_dir`, or an in-memory one.
    pub fn open(config: NodeConfig, collaborators: Collaborators) -> Result<Self> {
        let kv: Box<dyn KeyValueStore> = match &config.data_dir {
            None => Box::new(InMemoryKVStore::new()),
            Some(dir) => open_disk_store(dir)?,
        };
        Self::new(config, kv, collaborators)
    }

    /// Register the message router and spawn the sync timers. Idempotent.
    /// Must be called inside a tokio runtime.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let router = Arc::new(MessageRouter::new(
            Arc::clone(&self.chain),
            Arc::clone(&self.fork),
            Arc::clone(&self.sync),
        ));

        // Batch answers are buffered per request and must keep arrival
        // order, so they bypass the concurrent worker pool.
        let pooled: Vec<EventTopic> = MessageRouter::topics()
            .into_iter()
            .filter(|t| *t != EventTopic::BlockResponse)
            .collect();
        self.dispatcher.register(EventFilter::topics(pooled), router.clone());

        let mut ordered = self
            .bus
            .event_stream(EventFilter::topics(vec![EventTopic::BlockResponse]));
        let mut shutdown = self.shutdown_tx.subscribe();
        let ordered_loop = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    event = ordered.next() => match event {
                        Some(event) => router.handle(event).await,
                        None => break,
                    },
                }
            }
        });

        let sync_loop = self.sync.spawn(self.shutdown_tx.subscribe());
        self.tasks.lock().extend([ordered_loop, sync_loop]);
        info!(height = self.chain.height(), "ledger node started");
    }

    /// Stop the timers and router loops and drop outstanding requests.
    pub async fn shutdown(&self) {
        info!("ledger node shutting down");
        let _ = self.shutdown_tx.send(true);
        self.dispatcher.shutdown().await;
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "node task ended abnormally");
            }
        }
        self.sync.cancel_requests();
        info!(height = self.chain.height(), "ledger node stopped");
    }

    /// Hand a message received from `peer` to the node.
    pub async fn deliver(&self, peer: PeerId, message: &NetworkMessage) -> Result<(), RouteError> {
        let event = inbound_event(peer, message)?;
        self.bus.publish(event).await;
        Ok(())
    }

    /// Add a locally produced block and announce it when it becomes canonical.
    pub async fn submit_block(&self, block: Block) -> AddBlockResult {
        let result = self.chain.add_block(None, block.clone()).await;
        if result == AddBlockResult::Accepted {
            if let Err(e) = self.network.broadcast(NetworkMessage::NewBlock(block)).await {
                warn!(error = %e, "new block broadcast failed");
            }
        }
        result
    }

    /// Resume blocks that were waiting for transaction bodies. Call after
    /// the pool has taken in transactions from the network. Returns how many
    /// blocks were added.
    pub async fn transactions_arrived(&self) -> usize {
        let pending = self.chain.pending_block_count();
        if pending == 0 {
            return 0;
        }
        let added = self.chain.retry_pending_blocks().await;
        info!(pending, added, "suspended blocks retried");
        added
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    pub fn chain(&self) -> &Arc<ChainStateMachine> {
        &self.chain
    }

    pub fn peer_scores(&self) -> &Arc<PeerScoreManager> {
        &self.peers
    }

    pub fn fork_resolver(&self) -> &Arc<ForkResolver> {
        &self.fork
    }

    pub fn sync_loop(&self) -> &Arc<SyncLoop> {
        &self.sync
    }
}

#[cfg(feature = "rocksdb")]
fn open_disk_store(dir: &std::path::Path) -> Result<Box<dyn KeyValueStore>> {
    use crate::adapters::{RocksDbConfig, RocksDbStore};
    let store = RocksDbStore::open(RocksDbConfig {
        path: dir.to_path_buf(),
        ..RocksDbConfig::default()
    })
    .with_context(|| format!("cannot open ledger store at {}", dir.display()))?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "rocksdb"))]
fn open_disk_store(dir: &std::path::Path) -> Result<Box<dyn KeyValueStore>> {
    anyhow::bail!(
        "data_dir {} needs the rocksdb feature; leave it unset for an in-memory chain",
        dir.display()
    )
}
