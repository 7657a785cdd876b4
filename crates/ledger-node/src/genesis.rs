//! Genesis block construction.

use crate::config::GenesisConfig;
use shared_types::{compute_receipt_root, compute_tx_root, Block, BlockHeader};

/// The height-0 block every node of a network must agree on.
pub fn genesis_block(config: &GenesisConfig) -> Block {
    let header = BlockHeader {
        height: 0,
        cur_time: config.timestamp,
        extra_data: config.extra_data.as_bytes().to_vec(),
        tx_root: compute_tx_root(&[]),
        receipt_root: compute_receipt_root(&[]),
        ..Default::default()
    }
    .sealed();
    Block::new(header, vec![])
}
