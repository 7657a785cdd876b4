//! # Block Store Service
//!
//! Canonical-chain persistence. The chain state machine serializes every
//! mutation under its own lock; the internal locks here only keep individual
//! calls consistent.


use crate::config::StoreConfig;
use crate::domain::{KeyPrefix, StoreError, StoreResult};
use crate::ports::{BatchOperation, KeyValueStore};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{short_hex, Block, BlockHeader, Hash, Transaction};
use std::num::NonZeroUsize;
use tracing::{debug, info};

/// Deletes needed to bring the top back down to `target`.
struct DetachPlan {
    target: BlockHeader,
    detached: Vec<Block>,
    ops: Vec<BatchOperation>,
}

pub struct BlockStore {
    kv: RwLock<Box<dyn KeyValueStore>>,
    /// Cached copy of the persisted top header.
    latest: RwLock<Option<BlockHeader>>,
    /// Recent canonical blocks by hash.
    top_cache: Mutex<LruCache<Hash, Block>>,
    config: StoreConfig,
}

fn encode<T: Serialize>(what: &str, value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Corruption {
        message: format!("failed to encode {what}: {e}"),
    })
}

fn decode<T: DeserializeOwned>(what: &str, bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Corruption {
        message: format!("failed to decode {what}: {e}"),
    })
}

fn decode_hash(bytes: &[u8]) -> StoreResult<Hash> {
    Hash::try_from(bytes).map_err(|_| StoreError::Corruption {
        message: format!("stored hash has {} bytes", bytes.len()),
    })
}

impl BlockStore {
    /// Open a store over `kv`, loading the persisted top if there is one and
    /// warming the cache with the most recent canonical blocks.
    pub fn open(kv: Box<dyn KeyValueStore>, config: StoreConfig) -> StoreResult<Self> {
        let capacity = NonZeroUsize::new(config.top_cache_size).unwrap_or(NonZeroUsize::MIN);
        let store = Self {
            kv: RwLock::new(kv),
            latest: RwLock::new(None),
            top_cache: Mutex::new(LruCache::new(capacity)),
            config,
        };

        let top_hash = store.kv.read().get(&KeyPrefix::top_key())?;
        if let Some(bytes) = top_hash {
            let hash = decode_hash(&bytes)?;
            let header = store.read_header(&hash)?.ok_or_else(|| StoreError::Corruption {
                message: format!("top pointer {} has no header", short_hex(&hash)),
            })?;
            info!(
                height = header.height,
                hash = %short_hex(&header.hash),
                "[lc-02] loaded persisted top"
            );
            *store.latest.write() = Some(header);
            store.warm_cache()?;
        }
        Ok(store)
    }

    fn warm_cache(&self) -> StoreResult<()> {
        let Some(top) = self.top() else {
            return Ok(());
        };
        let mut hash = top.hash;
        for _ in 0..self.config.warm_blocks {
            let Some(block) = self.read_block(&hash)? else {
                break;
            };
            let parent = block.pre_hash();
            let genesis = block.header.is_genesis();
            self.top_cache.lock().put(hash, block);
            if genesis {
                break;
            }
            hash = parent;
        }
        Ok(())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn is_empty(&self) -> bool {
        self.latest.read().is_none()
    }

    /// Persist `genesis` as the first canonical block.
    pub fn insert_genesis(&self, genesis: &Block) -> StoreResult<()> {
        if !self.is_empty() {
            return Err(StoreError::AlreadyInitialized);
        }
        if !genesis.header.is_genesis() {
            return Err(StoreError::InvalidGenesis {
                height: genesis.height(),
            });
        }
        self.write_block(genesis)?;
        info!(hash = %short_hex(&genesis.hash()), "[lc-02] genesis stored");
        Ok(())
    }

    /// Current top header.
    pub fn top(&self) -> Option<BlockHeader> {
        self.latest.read().clone()
    }

    /// Height of the current top, zero when empty.
    pub fn height(&self) -> u64 {
        self.latest.read().as_ref().map(|h| h.height).unwrap_or(0)
    }

    pub fn has_block(&self, hash: &Hash) -> StoreResult<bool> {
        if self.top_cache.lock().contains(hash) {
            return Ok(true);
        }
        Ok(self.kv.read().exists(&KeyPrefix::header_key(hash))?)
    }

    pub fn header_by_hash(&self, hash: &Hash) -> StoreResult<Option<BlockHeader>> {
        if let Some(block) = self.top_cache.lock().peek(hash) {
            return Ok(Some(block.header.clone()));
        }
        self.read_header(hash)
    }

    pub fn block_by_hash(&self, hash: &Hash) -> StoreResult<Option<Block>> {
        if let Some(block) = self.top_cache.lock().get(hash) {
            return Ok(Some(block.clone()));
        }
        self.read_block(hash)
    }

    pub fn hash_at_height(&self, height: u64) -> StoreResult<Option<Hash>> {
        match self.kv.read().get(&KeyPrefix::height_key(height))? {
            Some(bytes) => Ok(Some(decode_hash(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn header_by_height(&self, height: u64) -> StoreResult<Option<BlockHeader>> {
        match self.hash_at_height(height)? {
            Some(hash) => self.header_by_hash(&hash),
            None => Ok(None),
        }
    }

    pub fn block_by_height(&self, height: u64) -> StoreResult<Option<Block>> {
        match self.hash_at_height(height)? {
            Some(hash) => self.block_by_hash(&hash),
            None => Ok(None),
        }
    }

    /// True when `hash` is stored and indexed at its own height.
    pub fn is_canonical(&self, hash: &Hash) -> StoreResult<bool> {
        let Some(header) = self.header_by_hash(hash)? else {
            return Ok(false);
        };
        Ok(self.hash_at_height(header.height)? == Some(*hash))
    }

    /// Highest canonical header at or below `height`.
    pub fn header_floor(&self, height: u64) -> StoreResult<Option<BlockHeader>> {
        let Some(top) = self.top() else {
            return Ok(None);
        };
        if height >= top.height {
            return Ok(Some(top));
        }
        let mut h = height;
        loop {
            if let Some(header) = self.header_by_height(h)? {
                return Ok(Some(header));
            }
            if h == 0 {
                return Ok(None);
            }
            h -= 1;
        }
    }

    /// Lowest canonical header at or above `height`.
    pub fn header_ceil(&self, height: u64) -> StoreResult<Option<BlockHeader>> {
        let top_height = match self.top() {
            Some(top) if top.height >= height => top.height,
            _ => return Ok(None),
        };
        for h in height..=top_height {
            if let Some(header) = self.header_by_height(h)? {
                return Ok(Some(header));
            }
        }
        Ok(None)
    }

    /// Canonical blocks from `height` (inclusive) upward, at most `limit`
    /// (further capped by `max_range`).
    pub fn blocks_after_height(&self, height: u64, limit: usize) -> StoreResult<Vec<Block>> {
        let limit = limit.min(self.config.max_range);
        let mut blocks = Vec::new();
        if self.is_empty() {
            return Ok(blocks);
        }
        let top_height = self.height();
        let mut h = height;
        while blocks.len() < limit && h <= top_height {
            if let Some(block) = self.block_by_height(h)? {
                blocks.push(block);
            }
            h += 1;
        }
        Ok(blocks)
    }

    /// Up to `len` canonical hashes, newest first, starting from the floor
    /// header of `height` and following parent links.
    pub fn chain_piece(&self, height: u64, len: usize) -> StoreResult<Vec<Hash>> {
        let mut piece = Vec::with_capacity(len);
        let Some(mut header) = self.header_floor(height)? else {
            return Ok(piece);
        };
        loop {
            piece.push(header.hash);
            if piece.len() >= len || header.is_genesis() {
                break;
            }
            header = self
                .header_by_hash(&header.pre_hash)?
                .ok_or(StoreError::BlockNotFound {
                    hash: header.pre_hash,
                })?;
        }
        Ok(piece)
    }

    /// Make `block` the new top. Its parent must be the current top.
    pub fn append(&self, block: &Block) -> StoreResult<()> {
        let top = self.top().ok_or(StoreError::Uninitialized)?;
        if block.pre_hash() != top.hash {
            return Err(StoreError::ParentNotTop {
                parent: block.pre_hash(),
                top: top.hash,
            });
        }
        self.write_block(block)?;
        debug!(
            height = block.height(),
            hash = %short_hex(&block.hash()),
            "[lc-02] block appended"
        );
        Ok(())
    }

    /// Detach every canonical block above `target` and make `target` the top.
    ///
    /// Returns the detached blocks, newest first. One atomic batch.
    pub fn reset_top(&self, target: &Hash) -> StoreResult<Vec<Block>> {
        let plan = self.plan_detach(target)?;
        if plan.detached.is_empty() {
            return Ok(plan.detached);
        }
        let mut ops = plan.ops;
        ops.push(BatchOperation::put(KeyPrefix::top_key(), target.to_vec()));

        self.kv.write().atomic_batch_write(ops)?;
        self.forget(&plan.detached);
        *self.latest.write() = Some(plan.target.clone());
        info!(
            height = plan.target.height,
            hash = %short_hex(target),
            detached = plan.detached.len(),
            "[lc-02] top reset"
        );
        Ok(plan.detached)
    }

    /// Detach everything above `block`'s parent and append `block`, in one
    /// atomic batch. Returns the detached blocks, newest first.
    pub fn reorganize(&self, block: &Block) -> StoreResult<Vec<Block>> {
        let plan = self.plan_detach(&block.pre_hash())?;
        let mut ops = plan.ops;
        ops.extend(Self::block_ops(block)?);

        self.kv.write().atomic_batch_write(ops)?;
        self.forget(&plan.detached);
        self.top_cache.lock().put(block.hash(), block.clone());
        *self.latest.write() = Some(block.header.clone());
        info!(
            height = block.height(),
            hash = %short_hex(&block.hash()),
            detached = plan.detached.len(),
            "[lc-02] reorganized onto new branch"
        );
        Ok(plan.detached)
    }

    fn plan_detach(&self, target: &Hash) -> StoreResult<DetachPlan> {
        let target_header = self
            .header_by_hash(target)?
            .ok_or(StoreError::BlockNotFound { hash: *target })?;
        if !self.is_canonical(target)? {
            return Err(StoreError::NotCanonical { hash: *target });
        }
        let top = self.top().ok_or(StoreError::Uninitialized)?;

        let mut detached = Vec::new();
        let mut ops = Vec::new();
        let mut hash = top.hash;
        while hash != *target {
            let block = self.block_by_hash(&hash)?.ok_or_else(|| StoreError::Corruption {
                message: format!("canonical block {} missing", short_hex(&hash)),
            })?;
            if block.height() <= target_header.height {
                return Err(StoreError::Corruption {
                    message: format!("walked below {} without meeting it", short_hex(target)),
                });
            }
            ops.push(BatchOperation::delete(KeyPrefix::header_key(&hash)));
            ops.push(BatchOperation::delete(KeyPrefix::body_key(&hash)));
            ops.push(BatchOperation::delete(KeyPrefix::height_key(block.height())));
            hash = block.pre_hash();
            detached.push(block);
        }
        Ok(DetachPlan {
            target: target_header,
            detached,
            ops,
        })
    }

    fn forget(&self, detached: &[Block]) {
        let mut cache = self.top_cache.lock();
        for block in detached {
            cache.pop(&block.hash());
        }
    }

    fn block_ops(block: &Block) -> StoreResult<Vec<BatchOperation>> {
        let hash = block.hash();
        Ok(vec![
            BatchOperation::put(KeyPrefix::header_key(&hash), encode("header", &block.header)?),
            BatchOperation::put(KeyPrefix::body_key(&hash), encode("body", &block.transactions)?),
            BatchOperation::put(KeyPrefix::height_key(block.height()), hash.to_vec()),
            BatchOperation::put(KeyPrefix::top_key(), hash.to_vec()),
        ])
    }

    fn write_block(&self, block: &Block) -> StoreResult<()> {
        self.kv.write().atomic_batch_write(Self::block_ops(block)?)?;
        self.top_cache.lock().put(block.hash(), block.clone());
        *self.latest.write() = Some(block.header.clone());
        Ok(())
    }

    fn read_header(&self, hash: &Hash) -> StoreResult<Option<BlockHeader>> {
        match self.kv.read().get(&KeyPrefix::header_key(hash))? {
            Some(bytes) => Ok(Some(decode("header", &bytes)?)),
            None => Ok(None),
        }
    }

    fn read_block(&self, hash: &Hash) -> StoreResult<Option<Block>> {
        let Some(header) = self.read_header(hash)? else {
            return Ok(None);
        };
        let transactions: Vec<Transaction> = match self.kv.read().get(&KeyPrefix::body_key(hash))? {
            Some(bytes) => decode("body", &bytes)?,
            None => {
                return Err(StoreError::Corruption {
                    message: format!("header {} has no body", short_hex(hash)),
                })
            }
        };
        Ok(Some(Block::new(header, transactions)))
    }
}
