//! Consensus helper for standalone runs.

use lc_03_chain::ConsensusHelper;
use shared_types::BlockHeader;

/// Accepts any header that extends its parent by one height with a strictly
/// larger weight counter. The proof bytes are not checked.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialConsensus;

impl ConsensusHelper for SequentialConsensus {
    fn verify_block(&self, header: &BlockHeader, parent: &BlockHeader) -> Result<bool, String> {
        if header.height != parent.height + 1 {
            return Err(format!(
                "height {} does not follow parent height {}",
                header.height, parent.height
            ));
        }
        Ok(header.total_qn > parent.total_qn && header.cur_time >= parent.cur_time)
    }

    fn estimate_ancestor_height(&self, header: &BlockHeader) -> u64 {
        header.height.saturating_sub(1)
    }
}
