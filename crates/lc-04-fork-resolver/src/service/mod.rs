//! # Fork Resolver Service
//!
//! Owns the single in-flight negotiation. All state changes happen under one
//! short mutex that is never held across an await: each handler decides under
//! the lock, then sends or replays after releasing it.


use crate::config::ForkConfig;
use crate::domain::{first_known, Awaiting, ForkContext, ForkError, ForkResult};
use crate::ports::PeerTopSource;
use async_trait::async_trait;
use lc_01_peer_score::PeerScoreManager;
use lc_03_chain::{ensure_chained, ChainStateMachine, ForkHandler, Network};
use parking_lot::Mutex;
use shared_types::{
    short_hex, Block, BlockHeader, ChainPieceBlockMsg, ChainPieceInfo, ChainPieceInfoRequest,
    Hash, NetworkMessage, PeerId, TopWeightInfo,
};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Dependencies for ForkResolver
pub struct ForkDependencies {
    pub chain: Arc<ChainStateMachine>,
    pub peers: Arc<PeerScoreManager>,
    pub network: Arc<dyn Network>,
    pub peer_tops: Arc<dyn PeerTopSource>,
}

/// A negotiation plus the timer guarding its outstanding request.
struct Negotiation {
    ctx: ForkContext,
    timer: Option<JoinHandle<()>>,
}

impl Drop for Negotiation {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// A message to send once the negotiation lock is released.
type Outgoing = (PeerId, NetworkMessage);

enum PieceBlocksStep {
    Send(Outgoing),
    Adopt,
    Done,
}

pub struct ForkResolver {
    chain: Arc<ChainStateMachine>,
    peers: Arc<PeerScoreManager>,
    network: Arc<dyn Network>,
    peer_tops: Arc<dyn PeerTopSource>,
    negotiation: Mutex<Option<Negotiation>>,
    next_id: AtomicU64,
    /// Handed to timer tasks so they never keep the resolver alive.
    this: Weak<ForkResolver>,
    config: ForkConfig,
}

impl ForkResolver {
    pub fn new(deps: ForkDependencies, config: ForkConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            chain: deps.chain,
            peers: deps.peers,
            network: deps.network,
            peer_tops: deps.peer_tops,
            negotiation: Mutex::new(None),
            next_id: AtomicU64::new(0),
            this: this.clone(),
            config,
        })
    }

    pub fn config(&self) -> &ForkConfig {
        &self.config
    }

    pub fn is_negotiating(&self) -> bool {
        self.negotiation.lock().is_some()
    }

    /// Snapshot of the running negotiation.
    pub fn negotiation(&self) -> Option<ForkContext> {
        self.negotiation.lock().as_ref().map(|n| n.ctx.clone())
    }

    // =========================================================================
    // REQUESTER SIDE
    // =========================================================================

    /// Start negotiating with `source`, whose `block` has a parent we lack.
    ///
    /// If the parent showed up in the meantime the block is simply added.
    pub async fn try_process_fork(&self, source: PeerId, block: Block) {
        if self.chain.has_block(&block.pre_hash()) {
            let result = self.chain.add_block(Some(source), block).await;
            debug!(%result, peer = %source, "[lc-04] parent arrived, added directly");
            return;
        }

        let outgoing = {
            let mut slot = self.negotiation.lock();
            let target_top = self.target_top(&source, &block.header);
            if let Some(current) = slot.as_ref() {
                if !current.ctx.superseded_by(&source, &target_top) {
                    debug!(
                        current = %current.ctx.target,
                        current_qn = current.ctx.target_top.total_qn,
                        peer = %source,
                        offered_qn = target_top.total_qn,
                        "[lc-04] negotiation in progress, trigger ignored"
                    );
                    return;
                }
                info!(
                    old = %current.ctx.target,
                    new = %source,
                    "[lc-04] heavier fork supersedes negotiation"
                );
            }

            let id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1;
            let local_top = self.chain.top_weight_info();
            info!(
                peer = %source,
                target_height = target_top.height,
                target_qn = target_top.total_qn,
                local_height = local_top.height,
                local_qn = local_top.total_qn,
                "[lc-04] fork negotiation started"
            );
            let mut negotiation = Negotiation {
                ctx: ForkContext::new(id, source, target_top, local_top),
                timer: None,
            };
            let top = self.chain.top().hash;
            match self.piece_block_request(&mut negotiation, top) {
                Ok(outgoing) => {
                    *slot = Some(negotiation);
                    outgoing
                }
                Err(e) => {
                    *slot = None;
                    warn!(peer = %source, error = %e, "[lc-04] fork negotiation not started");
                    return;
                }
            }
        };
        self.send(outgoing).await;
    }

    /// Handle the answer to a chain piece block request.
    pub async fn handle_piece_blocks(&self, peer: PeerId, msg: ChainPieceBlockMsg) -> ForkResult<()> {
        let step = {
            let mut slot = self.negotiation.lock();
            let Some(negotiation) = slot.as_mut() else {
                return Err(ForkError::NoNegotiation);
            };
            if peer != negotiation.ctx.target
                && !negotiation.ctx.is_same_fork(&msg.top_header, &msg.blocks)
            {
                return Err(ForkError::UnexpectedPeer { peer });
            }
            if negotiation.ctx.awaiting != Awaiting::PieceBlocks {
                return Err(ForkError::UnexpectedMessage {
                    kind: "chain_piece_blocks",
                });
            }
            self.finish_request(negotiation, &peer);

            if !self.still_heavier(&negotiation.ctx, &msg.top_header) {
                debug!(
                    peer = %peer,
                    peer_qn = msg.top_header.total_qn,
                    local_qn = negotiation.ctx.local_top.total_qn,
                    "[lc-04] peer no longer heavier, negotiation dropped"
                );
                *slot = None;
                PieceBlocksStep::Done
            } else if !msg.found_ancestor {
                debug!(peer = %peer, round = negotiation.ctx.rounds, "[lc-04] no common ancestor in piece, keep looking");
                match self.after_piece_miss(negotiation) {
                    Ok(outgoing) => PieceBlocksStep::Send(outgoing),
                    Err(e) => {
                        *slot = None;
                        return Err(e);
                    }
                }
            } else if msg.blocks.is_empty() {
                *slot = None;
                PieceBlocksStep::Done
            } else {
                *slot = None;
                PieceBlocksStep::Adopt
            }
        };

        match step {
            PieceBlocksStep::Send(outgoing) => {
                self.send(outgoing).await;
                Ok(())
            }
            PieceBlocksStep::Adopt => self.adopt_branch(peer, msg).await,
            PieceBlocksStep::Done => Ok(()),
        }
    }

    /// Handle the peer's own chain piece, sent in answer to our piece request.
    pub async fn handle_piece_info(&self, peer: PeerId, info: ChainPieceInfo) -> ForkResult<()> {
        let outgoing = {
            let mut slot = self.negotiation.lock();
            let Some(negotiation) = slot.as_mut() else {
                return Err(ForkError::NoNegotiation);
            };
            if peer != negotiation.ctx.target {
                return Err(ForkError::UnexpectedPeer { peer });
            }
            let Awaiting::PieceInfo { height } = negotiation.ctx.awaiting else {
                return Err(ForkError::UnexpectedMessage {
                    kind: "chain_piece_info",
                });
            };
            self.finish_request(negotiation, &peer);

            if negotiation.ctx.target_top.weight() <= self.chain.top_weight() {
                debug!(
                    peer = %peer,
                    peer_qn = negotiation.ctx.target_top.total_qn,
                    "[lc-04] local chain caught up, negotiation dropped"
                );
                *slot = None;
                return Ok(());
            }

            let step = match first_known(&info.hashes, |h| self.chain.is_canonical(h)) {
                Some(ancestor) => self.ancestor_block_request(negotiation, ancestor),
                None => {
                    let covered = info.hashes.len() as u64;
                    if covered == 0 || covered > height {
                        Err(ForkError::NoCommonAncestor { peer })
                    } else {
                        self.piece_info_request(negotiation, height - covered)
                    }
                }
            };
            match step {
                Ok(outgoing) => outgoing,
                Err(e) => {
                    *slot = None;
                    return Err(e);
                }
            }
        };
        self.send(outgoing).await;
        Ok(())
    }

    /// Reset to the common ancestor if the peer is still heavier, replay its
    /// branch, and hand over to sync if that was not enough.
    async fn adopt_branch(&self, source: PeerId, msg: ChainPieceBlockMsg) -> ForkResult<()> {
        let Some(ancestor) = msg.blocks.first().map(|b| b.header.clone()) else {
            return Ok(());
        };
        if !msg.top_header.verify_hash() {
            return Err(ForkError::InvalidTopHeader);
        }
        if !self.chain.is_canonical(&ancestor.hash) {
            return Err(ForkError::AncestorNotCanonical(ancestor.hash));
        }
        if !ensure_chained(&msg.blocks) {
            return Err(ForkError::NotChained);
        }
        if self.chain.compare_chain_weight(&msg.top_header) != Ordering::Less {
            debug!(
                peer = %source,
                peer_qn = msg.top_header.total_qn,
                "[lc-04] local chain caught up, nothing to adopt"
            );
            return Ok(());
        }

        if msg.blocks.len() > 1 {
            if ancestor.hash != self.chain.top().hash {
                let detached = self.chain.reset_top(&ancestor.hash)?;
                info!(
                    height = ancestor.height,
                    hash = %short_hex(&ancestor.hash),
                    detached = detached.len(),
                    "[lc-04] top reset to common ancestor"
                );
            }
            let outcome = self.chain.batch_add_blocks(Some(source), msg.blocks).await;
            info!(
                peer = %source,
                ?outcome,
                height = self.chain.height(),
                "[lc-04] fork branch replayed"
            );
        }

        if self.chain.compare_chain_weight(&msg.top_header) == Ordering::Less {
            self.chain.request_sync(Some(source)).await;
        }
        Ok(())
    }

    /// Our piece missed: ask the peer for its piece below our oldest hash.
    fn after_piece_miss(&self, negotiation: &mut Negotiation) -> ForkResult<Outgoing> {
        let peer = negotiation.ctx.target;
        let oldest = negotiation
            .ctx
            .last_hash()
            .and_then(|h| self.chain.header_by_hash(&h))
            .ok_or(ForkError::NoCommonAncestor { peer })?;
        if oldest.is_genesis() {
            return Err(ForkError::NoCommonAncestor { peer });
        }
        self.piece_info_request(negotiation, oldest.height - 1)
    }

    fn piece_block_request(&self, negotiation: &mut Negotiation, from: Hash) -> ForkResult<Outgoing> {
        let peer = negotiation.ctx.target;
        let header = self
            .chain
            .header_by_hash(&from)
            .ok_or(ForkError::NoCommonAncestor { peer })?;
        let hashes = self.chain.chain_piece(header.height, self.config.piece_length);
        if hashes.is_empty() {
            return Err(ForkError::NoCommonAncestor { peer });
        }
        self.block_request(negotiation, hashes)
    }

    fn ancestor_block_request(&self, negotiation: &mut Negotiation, ancestor: Hash) -> ForkResult<Outgoing> {
        debug!(
            peer = %negotiation.ctx.target,
            ancestor = %short_hex(&ancestor),
            "[lc-04] common ancestor located in peer piece"
        );
        self.block_request(negotiation, vec![ancestor])
    }

    fn block_request(&self, negotiation: &mut Negotiation, hashes: Vec<Hash>) -> ForkResult<Outgoing> {
        self.begin_round(negotiation)?;
        let ctx = &mut negotiation.ctx;
        let piece = ChainPieceInfo {
            hashes,
            request_count: self.peers.request_block_count(&ctx.target),
        };
        debug!(
            peer = %ctx.target,
            round = ctx.rounds,
            piece = piece.hashes.len(),
            request_count = piece.request_count,
            "[lc-04] requesting chain piece blocks"
        );
        ctx.last_req_piece = Some(piece.clone());
        ctx.awaiting = Awaiting::PieceBlocks;
        let target = ctx.target;
        self.arm_timer(negotiation);
        Ok((target, NetworkMessage::ChainPieceBlockRequest(piece)))
    }

    fn piece_info_request(&self, negotiation: &mut Negotiation, height: u64) -> ForkResult<Outgoing> {
        self.begin_round(negotiation)?;
        let ctx = &mut negotiation.ctx;
        debug!(peer = %ctx.target, round = ctx.rounds, height, "[lc-04] requesting peer chain piece");
        ctx.awaiting = Awaiting::PieceInfo { height };
        let target = ctx.target;
        self.arm_timer(negotiation);
        Ok((
            target,
            NetworkMessage::ChainPieceInfoRequest(ChainPieceInfoRequest { height }),
        ))
    }

    fn begin_round(&self, negotiation: &mut Negotiation) -> ForkResult<()> {
        let ctx = &mut negotiation.ctx;
        if ctx.rounds >= self.config.max_rounds {
            warn!(peer = %ctx.target, rounds = ctx.rounds, "[lc-04] negotiation round budget spent");
            return Err(ForkError::RoundsExhausted { rounds: ctx.rounds });
        }
        ctx.rounds += 1;
        Ok(())
    }

    fn arm_timer(&self, negotiation: &mut Negotiation) {
        if let Some(old) = negotiation.timer.take() {
            old.abort();
        }
        let this = self.this.clone();
        let (id, round) = (negotiation.ctx.id, negotiation.ctx.rounds);
        let timeout = self.config.piece_timeout;
        negotiation.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(resolver) = this.upgrade() {
                resolver.on_piece_timeout(id, round);
            }
        }));
    }

    fn on_piece_timeout(&self, id: u64, round: u32) {
        let mut slot = self.negotiation.lock();
        let current = slot
            .as_ref()
            .is_some_and(|n| n.ctx.id == id && n.ctx.rounds == round);
        if !current {
            return;
        }
        if let Some(mut negotiation) = slot.take() {
            // this runs on the timer task itself; detach rather than abort it
            negotiation.timer = None;
            let target = negotiation.ctx.target;
            warn!(peer = %target, round, "[lc-04] chain piece request timed out");
            self.peers.timeout_peer(&target);
            self.peers.update_request_count(&target, false);
        }
    }

    fn finish_request(&self, negotiation: &mut Negotiation, peer: &PeerId) {
        if let Some(timer) = negotiation.timer.take() {
            timer.abort();
        }
        self.peers.heard_from(peer);
        self.peers.update_request_count(peer, true);
    }

    /// `peer_top` must beat the local top from when the negotiation began
    /// and the local top now.
    fn still_heavier(&self, ctx: &ForkContext, peer_top: &BlockHeader) -> bool {
        self.chain.chain_weight(peer_top) > ctx.local_top.weight()
            && self.chain.compare_chain_weight(peer_top) == Ordering::Less
    }

    /// The heavier of the forked block and what the peer last advertised.
    fn target_top(&self, peer: &PeerId, header: &BlockHeader) -> TopWeightInfo {
        let offered = TopWeightInfo::from_header(header, self.chain.chain_weight(header));
        match self.peer_tops.peer_top(peer) {
            Some(advertised) if advertised.weight() > offered.weight() => advertised,
            _ => offered,
        }
    }

    // =========================================================================
    // RESPONDER SIDE
    // =========================================================================

    /// Answer a peer's chain piece with our canonical blocks from the first
    /// hash of the piece we share.
    pub async fn handle_piece_block_request(&self, peer: PeerId, req: ChainPieceInfo) -> ForkResult<()> {
        let max = self.peers.config().max_request_blocks;
        let count = req.request_count.clamp(1, max.max(1)) as usize;
        let ancestor = first_known(&req.hashes, |h| self.chain.is_canonical(h));
        let blocks = ancestor
            .and_then(|h| self.chain.header_by_hash(&h))
            .map(|a| self.chain.blocks_after_height(a.height, count))
            .unwrap_or_default();
        debug!(
            peer = %peer,
            piece = req.hashes.len(),
            found_ancestor = ancestor.is_some(),
            blocks = blocks.len(),
            "[lc-04] answering chain piece block request"
        );
        let msg = ChainPieceBlockMsg {
            blocks,
            top_header: self.chain.top(),
            found_ancestor: ancestor.is_some(),
        };
        self.send((peer, NetworkMessage::ChainPieceBlocks(msg))).await;
        Ok(())
    }

    /// Answer with our canonical hashes ending at the requested height.
    pub async fn handle_piece_request(&self, peer: PeerId, req: ChainPieceInfoRequest) -> ForkResult<()> {
        let hashes = self.chain.chain_piece(req.height, self.config.piece_length);
        if hashes.is_empty() {
            return Ok(());
        }
        debug!(peer = %peer, height = req.height, piece = hashes.len(), "[lc-04] sending chain piece");
        let info = ChainPieceInfo {
            hashes,
            request_count: 0,
        };
        self.send((peer, NetworkMessage::ChainPieceInfo(info))).await;
        Ok(())
    }

    async fn send(&self, (peer, message): Outgoing) {
        let kind = message.kind();
        if let Err(e) = self.network.send(peer, message).await {
            warn!(peer = %peer, kind, error = %e, "[lc-04] send failed");
        }
    }
}

#[async_trait]
impl ForkHandler for ForkResolver {
    async fn on_fork_detected(&self, source: PeerId, block: Block) {
        self.try_process_fork(source, block).await;
    }
}
