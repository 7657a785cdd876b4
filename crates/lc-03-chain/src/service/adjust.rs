//! Top resets, block removal and batch replays.

use super::{AdjustingGuard, ChainStateMachine};
use crate::domain::{ensure_chained, AddBlockResult, BatchAddOutcome, ChainError, ChainResult};
use shared_types::{short_hex, Block, Hash, PeerId};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

impl ChainStateMachine {
    /// Detach every canonical block above `target` and make it the top.
    /// Detached transactions go back to the pool. Returns the detached
    /// blocks, newest first.
    pub fn reset_top(&self, target: &Hash) -> ChainResult<Vec<Block>> {
        let _guard = self.lock.write();
        self.reset_top_locked(target)
    }

    fn reset_top_locked(&self, target: &Hash) -> ChainResult<Vec<Block>> {
        let _adjusting = AdjustingGuard::new(&self.adjusting);
        let detached = self.store.reset_top(target).map_err(|e| {
            if e.is_corruption() {
                panic!("[lc-03] storage corrupted while resetting top to {}: {e}", short_hex(target));
            }
            ChainError::from(e)
        })?;
        for block in &detached {
            self.tx_pool.unmark_executed(&block.transactions);
        }
        Ok(detached)
    }

    /// Detach `hash` and every block above it.
    pub fn remove_block(&self, hash: &Hash) -> ChainResult<Vec<Block>> {
        let _guard = self.lock.write();
        let header = self
            .store
            .header_by_hash(hash)?
            .ok_or(ChainError::NotCanonical(*hash))?;
        if header.is_genesis() {
            return Err(ChainError::CannotRemoveGenesis);
        }
        if !self.store.is_canonical(hash)? {
            return Err(ChainError::NotCanonical(*hash));
        }
        let detached = self.reset_top_locked(&header.pre_hash)?;
        info!(
            height = header.height,
            hash = %short_hex(hash),
            removed = detached.len(),
            "[lc-03] block removed"
        );
        Ok(detached)
    }

    /// Apply a chained run of blocks from `source`, e.g. a sync batch or the
    /// suffix returned by fork negotiation.
    ///
    /// Known blocks at the front are skipped. When the first unknown block
    /// attaches below the top, the top is reset to its parent first, but only
    /// if the batch ends heavier than the local top. When its parent is
    /// unknown the block goes to fork resolution instead. Blocks are then
    /// added in order until one is neither accepted nor already known.
    pub async fn batch_add_blocks(&self, source: Option<PeerId>, blocks: Vec<Block>) -> BatchAddOutcome {
        if !ensure_chained(&blocks) {
            warn!(
                peer = ?source.map(|p| p.to_string()),
                size = blocks.len(),
                "[lc-03] batch is not chained"
            );
            return BatchAddOutcome::NotChained;
        }

        let _batch = self.batch_lock.lock().await;

        let Some(start) = blocks.iter().position(|b| !self.has_block(&b.hash())) else {
            return BatchAddOutcome::AllKnown;
        };
        let pending = &blocks[start..];
        let (first, last) = match (pending.first(), pending.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return BatchAddOutcome::AllKnown,
        };

        let top = self.top();
        if first.pre_hash() != top.hash {
            if self.has_block(&first.pre_hash()) {
                if self.compare_chain_weight(&last.header) != Ordering::Less {
                    debug!(
                        last_height = last.height(),
                        last_qn = last.header.total_qn,
                        top_qn = top.total_qn,
                        "[lc-03] batch is not heavier than local chain"
                    );
                    return BatchAddOutcome::LowerWeight;
                }
                info!(
                    old_height = top.height,
                    old_hash = %short_hex(&top.hash),
                    new_height = first.height().saturating_sub(1),
                    new_hash = %short_hex(&first.pre_hash()),
                    last_height = last.height(),
                    "[lc-03] batch resets top"
                );
                if let Err(e) = self.reset_top(&first.pre_hash()) {
                    warn!(error = %e, "[lc-03] batch reset failed");
                    return BatchAddOutcome::ResetFailed;
                }
            } else {
                warn!(
                    peer = ?source.map(|p| p.to_string()),
                    height = first.height(),
                    hash = %short_hex(&first.hash()),
                    "[lc-03] batch does not attach to local chain"
                );
                if let (Some(peer), Some(handler)) = (source, self.fork_handler()) {
                    handler.on_fork_detected(peer, first.clone()).await;
                }
                return BatchAddOutcome::ForkDetected;
            }
        }

        let _adjusting = AdjustingGuard::new(&self.adjusting);
        let mut added = 0;
        let mut last_result = AddBlockResult::AlreadyExists;
        for block in pending.iter().cloned() {
            last_result = self.add_block(source, block).await;
            if last_result == AddBlockResult::Accepted {
                added += 1;
            }
            if !last_result.is_success() {
                break;
            }
        }
        BatchAddOutcome::Applied {
            added,
            last: last_result,
        }
    }
}
