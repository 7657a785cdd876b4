use shared_types::Block;

/// True when each block's parent is the block before it.
pub fn ensure_chained(blocks: &[Block]) -> bool {
    blocks
        .windows(2)
        .all(|pair| pair[1].pre_hash() == pair[0].hash())
}
