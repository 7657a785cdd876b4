//! The add-block pipeline.

use super::{ChainStateMachine, PendingBlock};
use crate::domain::{AddBlockResult, ExecutionOutput, RejectReason, VerifiedBlock};
use lc_02_block_store::StoreError;
use shared_bus::ChainEvent;
use shared_types::{
    compute_receipt_root, compute_tx_root, short_hex, Block, BlockHeader, Hash, NetworkMessage,
    PeerId, Transaction, TransactionRequest,
};
use std::cmp::Ordering;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

impl ChainStateMachine {
    /// Offer `block` to the chain. `source` is the peer it came from, `None`
    /// for locally produced blocks.
    ///
    /// When the block commits, any future blocks waiting on it are added in
    /// turn.
    pub async fn add_block(&self, source: Option<PeerId>, block: Block) -> AddBlockResult {
        let hash = block.hash();
        let height = block.height();
        let result = self.add_single(source, block).await;
        debug!(
            height,
            hash = %short_hex(&hash),
            peer = ?source.map(|p| p.to_string()),
            %result,
            "[lc-03] add block"
        );
        if result == AddBlockResult::Accepted {
            self.cascade_future_blocks(hash).await;
        }
        result
    }

    async fn cascade_future_blocks(&self, mut parent: Hash) {
        loop {
            let waiting = self.future_blocks.lock().pop(&parent);
            let Some((source, child)) = waiting else {
                break;
            };
            let hash = child.hash();
            debug!(
                height = child.height(),
                hash = %short_hex(&hash),
                peer = ?source.map(|p| p.to_string()),
                "[lc-03] retrying future block"
            );
            if self.add_single(source, child).await != AddBlockResult::Accepted {
                break;
            }
            parent = hash;
        }
    }

    /// Register an execution result computed elsewhere, typically by local
    /// block production, so committing the block does not execute it again.
    pub fn remember_execution(&self, block: &Block, output: ExecutionOutput) {
        self.verified.lock().put(
            block.hash(),
            VerifiedBlock {
                transactions: block.transactions.clone(),
                output,
            },
        );
    }

    /// Re-offer the suspended blocks whose transactions are now all in the
    /// pool, oldest first. Returns how many were accepted.
    pub async fn retry_pending_blocks(&self) -> usize {
        let ready: Vec<PendingBlock> = {
            let mut cache = self.pending_tx.lock();
            let hashes: Vec<Hash> = cache
                .iter()
                .rev()
                .filter(|(_, entry)| {
                    self.tx_pool
                        .resolve(&entry.block.header.tx_hashes)
                        .missing
                        .is_empty()
                })
                .map(|(hash, _)| *hash)
                .collect();
            hashes.iter().filter_map(|hash| cache.pop(hash)).collect()
        };
        let mut accepted = 0;
        for entry in ready {
            if self.add_block(entry.source, entry.block.clone()).await == AddBlockResult::Accepted {
                accepted += 1;
            }
        }
        accepted
    }

    async fn add_single(&self, source: Option<PeerId>, block: Block) -> AddBlockResult {
        let hash = block.hash();
        if self.has_block(&hash) {
            return AddBlockResult::AlreadyExists;
        }

        if let Err(reason) = check_structure(&block) {
            warn!(
                hash = %short_hex(&hash),
                peer = ?source.map(|p| p.to_string()),
                %reason,
                "[lc-03] malformed block"
            );
            return AddBlockResult::Rejected(reason);
        }

        let Some(parent) = self.header_by_hash(&block.pre_hash()) else {
            self.on_unknown_parent(source, block).await;
            return AddBlockResult::Rejected(RejectReason::MissingParent);
        };
        if block.height() != parent.height + 1 {
            return AddBlockResult::Rejected(RejectReason::InvalidHeight);
        }

        if self.compare_chain_weight(&block.header) != Ordering::Less {
            return AddBlockResult::LowerWeight;
        }

        match self.consensus.verify_block(&block.header, &parent) {
            Ok(true) => {}
            Ok(false) => return AddBlockResult::Rejected(RejectReason::Consensus),
            Err(e) => {
                warn!(hash = %short_hex(&hash), error = %e, "[lc-03] consensus verification failed");
                return AddBlockResult::Rejected(RejectReason::Consensus);
            }
        }

        let cached = self.verified.lock().get(&hash).cloned();
        let verified = match cached {
            Some(verified) => verified,
            None => match self.verify(source, &block, &parent).await {
                Ok(verified) => verified,
                Err(reason) => return AddBlockResult::Rejected(reason),
            },
        };

        let full = Block::new(block.header, verified.transactions.clone());
        let result = self.commit(source, &full, &verified);
        if result == AddBlockResult::Accepted {
            self.events.publish(ChainEvent::BlockAdded(full)).await;
        }
        result
    }

    /// Resolve bodies, execute, and check the declared roots.
    async fn verify(
        &self,
        source: Option<PeerId>,
        block: &Block,
        parent: &BlockHeader,
    ) -> Result<VerifiedBlock, RejectReason> {
        let hash = block.hash();
        let transactions = self
            .resolve_transactions(source, block)
            .await
            .ok_or(RejectReason::MissingTransactions)?;

        let output = self
            .executor
            .execute(&block.header, &transactions, parent.state_root)
            .await
            .map_err(|e| {
                warn!(hash = %short_hex(&hash), error = %e, "[lc-03] execution failed");
                RejectReason::Execution
            })?;
        if output.state_root != block.header.state_root {
            return Err(RejectReason::StateRootMismatch);
        }
        if compute_receipt_root(&output.receipts) != block.header.receipt_root {
            return Err(RejectReason::ReceiptRootMismatch);
        }

        let verified = VerifiedBlock {
            transactions,
            output,
        };
        self.verified.lock().put(hash, verified.clone());
        Ok(verified)
    }

    /// Bodies carried by the block, or looked up in the pool. Missing bodies
    /// are requested and the block is parked; returns `None` in that case.
    async fn resolve_transactions(
        &self,
        source: Option<PeerId>,
        block: &Block,
    ) -> Option<Vec<Transaction>> {
        if block.has_bodies() {
            return Some(block.transactions.clone());
        }
        let resolved = self.tx_pool.resolve(&block.header.tx_hashes);
        if resolved.missing.is_empty() {
            return Some(resolved.found);
        }

        let hash = block.hash();
        let peer = source.unwrap_or(block.header.castor);
        info!(
            hash = %short_hex(&hash),
            missing = resolved.missing.len(),
            peer = %peer,
            "[lc-03] block waits for transactions"
        );
        let ticket = self.next_ticket.fetch_add(1, AtomicOrdering::SeqCst);
        let timer = self.arm_fetch_timer(hash, peer, ticket);
        self.pending_tx.lock().put(
            hash,
            PendingBlock {
                source,
                block: block.clone(),
                ticket,
                timer: Some(timer),
            },
        );
        let request = NetworkMessage::TransactionRequest(TransactionRequest {
            block_hash: hash,
            hashes: resolved.missing,
        });
        if let Err(e) = self.network.send(peer, request).await {
            warn!(peer = %peer, error = %e, "[lc-03] transaction request not sent");
        }
        None
    }

    /// Drop the suspension of `hash` and charge `peer` if the bodies have not
    /// arrived within the fetch timeout.
    fn arm_fetch_timer(&self, hash: Hash, peer: PeerId, ticket: u64) -> JoinHandle<()> {
        let pending = Arc::clone(&self.pending_tx);
        let peers = Arc::clone(&self.peers);
        let timeout = self.config.tx_fetch_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let expired = {
                let mut cache = pending.lock();
                let current = cache.peek(&hash).is_some_and(|entry| entry.ticket == ticket);
                if current {
                    cache.pop(&hash)
                } else {
                    None
                }
            };
            if let Some(mut entry) = expired {
                // this runs on the timer task itself; detach rather than abort it
                entry.timer = None;
                warn!(
                    hash = %short_hex(&hash),
                    height = entry.block.height(),
                    peer = %peer,
                    "[lc-03] transaction request timed out"
                );
                peers.timeout_peer(&peer);
            }
        })
    }

    /// Park a block whose parent is unknown and decide whether it signals a
    /// fork or just a lag.
    async fn on_unknown_parent(&self, source: Option<PeerId>, block: Block) {
        self.future_blocks.lock().put(block.pre_hash(), (source, block.clone()));
        let Some(source) = source else {
            return;
        };

        let estimated = self.consensus.estimate_ancestor_height(&block.header);
        let local_height = self.height();
        if estimated <= local_height {
            let top = self.top();
            warn!(
                hash = %short_hex(&block.hash()),
                height = block.height(),
                pre_hash = %short_hex(&block.pre_hash()),
                top_height = top.height,
                top_hash = %short_hex(&top.hash),
                peer = %source,
                "[lc-03] fork detected"
            );
            if let Some(handler) = self.fork_handler() {
                handler.on_fork_detected(source, block).await;
            }
        } else if let Some(trigger) = self.sync_trigger() {
            trigger.request_sync(Some(source)).await;
        }
    }

    /// The serialized commit decision.
    fn commit(&self, source: Option<PeerId>, block: &Block, verified: &VerifiedBlock) -> AddBlockResult {
        let _guard = self.lock.write();
        let hash = block.hash();

        match self.store.has_block(&hash) {
            Ok(true) => return AddBlockResult::AlreadyExists,
            Ok(false) => {}
            Err(e) => return commit_failed(block, e),
        }
        let top = self.store.top().unwrap_or_default();

        let detached = if block.pre_hash() == top.hash {
            match self.store.append(block) {
                Ok(()) => Vec::new(),
                Err(e) => return commit_failed(block, e),
            }
        } else {
            match self.consensus.compare_provable_weight(&top, &block.header) {
                Ordering::Greater => return AddBlockResult::LowerWeight,
                Ordering::Equal => return AddBlockResult::AlreadyExists,
                Ordering::Less => {}
            }
            match self.store.is_canonical(&block.pre_hash()) {
                Ok(true) => {}
                Ok(false) => {
                    // parent was detached after the pre-check
                    self.future_blocks.lock().put(block.pre_hash(), (source, block.clone()));
                    return AddBlockResult::Rejected(RejectReason::MissingParent);
                }
                Err(e) => return commit_failed(block, e),
            }
            info!(
                old_height = top.height,
                old_hash = %short_hex(&top.hash),
                old_qn = top.total_qn,
                new_height = block.height(),
                new_hash = %short_hex(&hash),
                new_qn = block.header.total_qn,
                "[lc-03] reorganizing onto heavier branch"
            );
            match self.store.reorganize(block) {
                Ok(detached) => detached,
                Err(e) => return commit_failed(block, e),
            }
        };

        for old in &detached {
            self.tx_pool.unmark_executed(&old.transactions);
        }
        self.tx_pool.mark_executed(&hash, &verified.transactions);
        if !verified.output.evicted.is_empty() {
            self.tx_pool.remove_evicted(&verified.output.evicted);
        }
        self.verified.lock().pop(&hash);
        self.pending_tx.lock().pop(&hash);

        info!(
            height = block.height(),
            hash = %short_hex(&hash),
            total_qn = block.header.total_qn,
            txs = verified.transactions.len(),
            detached = detached.len(),
            "[lc-03] block committed"
        );
        AddBlockResult::Accepted
    }
}

/// Checks that need nothing but the block itself.
fn check_structure(block: &Block) -> Result<(), RejectReason> {
    let header = &block.header;
    if !header.verify_hash() {
        return Err(RejectReason::HashMismatch);
    }
    if header.is_genesis() {
        return Err(RejectReason::InvalidHeight);
    }
    if compute_tx_root(&header.tx_hashes) != header.tx_root {
        return Err(RejectReason::TxRootMismatch);
    }
    if !block.transactions.is_empty() && !block.bodies_match_declared() {
        return Err(RejectReason::TxRootMismatch);
    }
    Ok(())
}

/// Corruption is fatal to the process; anything else fails this attempt.
pub(super) fn commit_failed(block: &Block, e: StoreError) -> AddBlockResult {
    if e.is_corruption() {
        panic!(
            "[lc-03] storage corrupted while committing block {} at height {}: {e}",
            short_hex(&block.hash()),
            block.height()
        );
    }
    error!(
        height = block.height(),
        hash = %short_hex(&block.hash()),
        error = %e,
        "[lc-03] commit failed"
    );
    AddBlockResult::Rejected(RejectReason::CommitFailure)
}
