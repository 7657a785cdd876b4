//! # Sync Loop Service
//!
//! Candidate bookkeeping and in-flight requests share one short mutex. As in
//! the fork resolver, nothing awaits while it is held.


use crate::config::SyncConfig;
use crate::domain::{Admission, CandidatePool, SyncError, SyncResult};
use async_trait::async_trait;
use lc_01_peer_score::PeerScoreManager;
use lc_03_chain::{ChainStateMachine, Network, SyncTrigger};
use lc_04_fork_resolver::PeerTopSource;
use parking_lot::Mutex;
use shared_types::{
    short_hex, Block, BlockBatchResponse, BlockRequest, NetworkMessage, PeerId, TopWeightInfo,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Dependencies for SyncLoop
pub struct SyncDependencies {
    pub chain: Arc<ChainStateMachine>,
    pub peers: Arc<PeerScoreManager>,
    pub network: Arc<dyn Network>,
}

/// An outstanding block request and the blocks received for it so far.
struct InFlight {
    id: u64,
    height: u64,
    buffer: Vec<Block>,
    timer: Option<JoinHandle<()>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct SyncState {
    candidates: CandidatePool,
    in_flight: HashMap<PeerId, InFlight>,
}

pub struct SyncLoop {
    chain: Arc<ChainStateMachine>,
    peers: Arc<PeerScoreManager>,
    network: Arc<dyn Network>,
    state: Mutex<SyncState>,
    initialized: AtomicBool,
    next_id: AtomicU64,
    this: Weak<SyncLoop>,
    config: SyncConfig,
}

impl SyncLoop {
    pub fn new(deps: SyncDependencies, config: SyncConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            chain: deps.chain,
            peers: deps.peers,
            network: deps.network,
            state: Mutex::new(SyncState {
                candidates: CandidatePool::new(config.candidate_pool_size),
                in_flight: HashMap::new(),
            }),
            initialized: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            this: this.clone(),
            config,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// True once a sync attempt found no candidate heavier than us.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// True while the best usable candidate is far above the local height.
    pub fn is_syncing(&self) -> bool {
        let local = self.chain.height();
        let state = self.state.lock();
        state
            .candidates
            .best(|p| !self.peers.is_evil(p))
            .is_some_and(|(_, top)| top.height > local + self.config.syncing_lag)
    }

    pub fn candidate_count(&self) -> usize {
        self.state.lock().candidates.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Drop every outstanding request and its timer.
    pub fn cancel_requests(&self) {
        let cancelled = std::mem::take(&mut self.state.lock().in_flight);
        if !cancelled.is_empty() {
            debug!(requests = cancelled.len(), "[lc-05] outstanding requests cancelled");
        }
    }

    /// Run the advertise and sync timers until `shutdown` flips or its
    /// sender goes away.
    pub fn spawn(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut advertise = tokio::time::interval(this.config.advertise_interval);
            let mut sync = tokio::time::interval(this.config.sync_interval);
            advertise.set_missed_tick_behavior(MissedTickBehavior::Delay);
            sync.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                advertise_secs = this.config.advertise_interval.as_secs(),
                sync_secs = this.config.sync_interval.as_secs(),
                "[lc-05] sync loop started"
            );
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = advertise.tick() => this.advertise().await,
                    _ = sync.tick() => {
                        this.try_sync(None).await;
                    }
                }
            }
            this.cancel_requests();
            info!("[lc-05] sync loop stopped");
        })
    }

    // =========================================================================
    // ADVERTISE AND COLLECT
    // =========================================================================

    /// Tell neighbors about our top. Light nodes and nodes at genesis stay quiet.
    pub async fn advertise(&self) {
        if self.config.light_mode || self.chain.height() == 0 {
            return;
        }
        let top = self.chain.top_weight_info();
        debug!(height = top.height, total_qn = top.total_qn, "[lc-05] advertising top weight");
        if let Err(e) = self
            .network
            .relay_to_neighbors(NetworkMessage::TopWeight(top))
            .await
        {
            warn!(error = %e, "[lc-05] top weight relay failed");
        }
    }

    /// A neighbor advertised its top.
    pub async fn handle_top_weight(&self, peer: PeerId, top: TopWeightInfo) {
        self.peers.heard_from(&peer);
        let heavier = top.weight() > self.chain.top_weight();
        let trigger = {
            let mut state = self.state.lock();
            if !heavier {
                state.candidates.remove(&peer);
                false
            } else {
                let height = top.height;
                let admission = state.candidates.offer(peer, top);
                debug!(peer = %peer, height, ?admission, "[lc-05] candidate offered");
                matches!(admission, Admission::Displaced(_)) && state.in_flight.is_empty()
            }
        };
        if trigger {
            self.try_sync(None).await;
        }
    }

    // =========================================================================
    // REQUESTER SIDE
    // =========================================================================

    /// Ask the best candidate for the blocks above our height.
    ///
    /// `prefer` is tried first when it is a usable candidate. Returns whether
    /// a request went out.
    pub async fn try_sync(&self, prefer: Option<PeerId>) -> bool {
        if self.chain.is_adjusting() {
            debug!("[lc-05] chain adjusting, sync skipped");
            return false;
        }
        let local = self.chain.top_weight();
        let local_height = self.chain.height();

        let (peer, request) = {
            let mut state = self.state.lock();
            state.candidates.retain(|_, top| top.weight() > local);

            let preferred = prefer
                .filter(|p| !self.peers.is_evil(p))
                .and_then(|p| state.candidates.get(&p).map(|top| (p, top.clone())));
            let best = preferred.or_else(|| state.candidates.best(|p| !self.peers.is_evil(p)));
            let Some((peer, top)) = best else {
                if !self.initialized.swap(true, Ordering::SeqCst) {
                    info!(height = local_height, "[lc-05] no heavier peer, node initialized");
                }
                return false;
            };

            if self.chain.has_block(&top.hash) {
                debug!(peer = %peer, hash = %short_hex(&top.hash), "[lc-05] candidate top already known");
                return false;
            }
            let height = if top.height <= local_height {
                top.height
            } else {
                local_height + 1
            };
            if state.in_flight.contains_key(&peer) || state.in_flight.values().any(|r| r.height == height) {
                debug!(peer = %peer, height, "[lc-05] request already in flight");
                return false;
            }

            let size = self.peers.request_block_count(&peer);
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            state.in_flight.insert(
                peer,
                InFlight {
                    id,
                    height,
                    buffer: Vec::new(),
                    timer: Some(self.arm_timer(peer, id)),
                },
            );
            info!(
                peer = %peer,
                height,
                size,
                peer_height = top.height,
                peer_qn = top.total_qn,
                "[lc-05] requesting blocks"
            );
            (peer, BlockRequest { height, size })
        };

        if let Err(e) = self
            .network
            .send(peer, NetworkMessage::BlockRequest(request))
            .await
        {
            warn!(peer = %peer, error = %e, "[lc-05] block request send failed");
        }
        true
    }

    /// One message of a block batch answer.
    pub async fn handle_block_response(&self, peer: PeerId, response: BlockBatchResponse) -> SyncResult<()> {
        let batch = {
            let mut state = self.state.lock();
            let Some(request) = state.in_flight.get_mut(&peer) else {
                return Err(SyncError::Unsolicited { peer });
            };
            if let Some(block) = response.block {
                request.buffer.push(block);
            }
            if !response.is_last_in_batch {
                return Ok(());
            }
            match state.in_flight.remove(&peer) {
                Some(mut request) => std::mem::take(&mut request.buffer),
                None => return Ok(()),
            }
        };
        self.peers.heard_from(&peer);
        self.peers.update_request_count(&peer, true);

        let Some(last) = batch.last() else {
            debug!(peer = %peer, "[lc-05] peer answered with no blocks");
            return Ok(());
        };
        let target = self
            .peer_top(&peer)
            .map(|top| top.weight())
            .unwrap_or_else(|| self.chain.chain_weight(&last.header));
        if self.chain.top_weight() > target {
            debug!(peer = %peer, "[lc-05] local chain already heavier, batch ignored");
            return Ok(());
        }

        let size = batch.len();
        let outcome = self.chain.batch_add_blocks(Some(peer), batch).await;
        info!(
            peer = %peer,
            size,
            ?outcome,
            height = self.chain.height(),
            "[lc-05] block batch applied"
        );

        let still_behind = self
            .peer_top(&peer)
            .is_some_and(|top| top.weight() > self.chain.top_weight());
        if outcome.all_succeeded() && still_behind {
            self.try_sync(None).await;
        }
        Ok(())
    }

    fn arm_timer(&self, peer: PeerId, id: u64) -> JoinHandle<()> {
        let this = self.this.clone();
        let timeout = self.config.request_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(sync) = this.upgrade() {
                sync.on_request_timeout(peer, id).await;
            }
        })
    }

    async fn on_request_timeout(&self, peer: PeerId, id: u64) {
        {
            let mut state = self.state.lock();
            if state.in_flight.get(&peer).map(|r| r.id) != Some(id) {
                return;
            }
            if let Some(mut request) = state.in_flight.remove(&peer) {
                // this runs on the timer task itself; detach rather than abort it
                request.timer = None;
                warn!(peer = %peer, height = request.height, "[lc-05] block request timed out");
            }
        }
        self.peers.mark_evil(&peer);
        self.peers.update_request_count(&peer, false);
        self.try_sync(None).await;
    }

    // =========================================================================
    // RESPONDER SIDE
    // =========================================================================

    /// Answer with canonical blocks from the requested height, one per message.
    pub async fn handle_block_request(&self, peer: PeerId, request: BlockRequest) -> SyncResult<()> {
        let max = self.peers.config().max_request_blocks.max(1);
        let count = request.size.clamp(1, max) as usize;
        let blocks = self.chain.blocks_after_height(request.height, count);
        debug!(
            peer = %peer,
            height = request.height,
            requested = request.size,
            blocks = blocks.len(),
            "[lc-05] answering block request"
        );

        let mut responses: Vec<BlockBatchResponse> = blocks
            .into_iter()
            .map(|block| BlockBatchResponse {
                block: Some(block),
                is_last_in_batch: false,
            })
            .collect();
        match responses.last_mut() {
            Some(last) => last.is_last_in_batch = true,
            None => responses.push(BlockBatchResponse {
                block: None,
                is_last_in_batch: true,
            }),
        }

        for response in responses {
            if let Err(e) = self
                .network
                .send(peer, NetworkMessage::BlockResponse(response))
                .await
            {
                warn!(peer = %peer, error = %e, "[lc-05] block response send failed");
                break;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SyncTrigger for SyncLoop {
    async fn request_sync(&self, peer: Option<PeerId>) {
        self.try_sync(peer).await;
    }
}

impl PeerTopSource for SyncLoop {
    fn peer_top(&self, peer: &PeerId) -> Option<TopWeightInfo> {
        self.state.lock().candidates.get(peer).cloned()
    }
}
