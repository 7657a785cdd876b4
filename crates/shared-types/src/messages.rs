//! # Peer Wire Messages
//!
//! Logical message shapes exchanged between ledger nodes, plus their bincode
//! encoding. Transport framing belongs to the network adapter.

use crate::entities::{Block, BlockHeader, Hash, U256};
use crate::errors::{CodecError, CodecResult};
use crate::weight::ChainWeight;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Advertised top of a peer's canonical chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopWeightInfo {
    pub hash: Hash,
    pub total_qn: u64,
    pub pv: U256,
    pub height: u64,
    pub pre_hash: Hash,
}

impl TopWeightInfo {
    pub fn from_header(header: &BlockHeader, weight: ChainWeight) -> Self {
        Self {
            hash: header.hash,
            total_qn: weight.total_qn,
            pv: weight.pv,
            height: header.height,
            pre_hash: header.pre_hash,
        }
    }

    pub fn weight(&self) -> ChainWeight {
        ChainWeight::new(self.total_qn, self.pv)
    }
}

/// Request for the sender's chain piece ending at (or below) `height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainPieceInfoRequest {
    pub height: u64,
}

/// A contiguous run of canonical block hashes, newest first.
///
/// When sent as a chain-piece block request, `request_count` bounds how many
/// blocks the responder returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChainPieceInfo {
    pub hashes: Vec<Hash>,
    pub request_count: u32,
}

/// Answer to a chain-piece block request.
///
/// When `found_ancestor` is set, `blocks[0]` is the common ancestor and the
/// rest are the responder's canonical blocks above it, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainPieceBlockMsg {
    pub blocks: Vec<Block>,
    pub top_header: BlockHeader,
    pub found_ancestor: bool,
}

/// Request for canonical blocks starting at `height` (inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRequest {
    pub height: u64,
    pub size: u32,
}

/// One block of a batch answer. An empty answer is a single message with
/// `block: None` and `is_last_in_batch: true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockBatchResponse {
    pub block: Option<Block>,
    pub is_last_in_batch: bool,
}

/// Request for transaction bodies a block referenced but the pool lacked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub block_hash: Hash,
    pub hashes: Vec<Hash>,
}

/// Every message the ledger core sends to peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkMessage {
    NewBlock(Block),
    BlockRequest(BlockRequest),
    BlockResponse(BlockBatchResponse),
    TopWeight(TopWeightInfo),
    ChainPieceInfoRequest(ChainPieceInfoRequest),
    ChainPieceInfo(ChainPieceInfo),
    ChainPieceBlockRequest(ChainPieceInfo),
    ChainPieceBlocks(ChainPieceBlockMsg),
    TransactionRequest(TransactionRequest),
}

impl NetworkMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewBlock(_) => "new_block",
            Self::BlockRequest(_) => "block_request",
            Self::BlockResponse(_) => "block_response",
            Self::TopWeight(_) => "top_weight",
            Self::ChainPieceInfoRequest(_) => "chain_piece_info_request",
            Self::ChainPieceInfo(_) => "chain_piece_info",
            Self::ChainPieceBlockRequest(_) => "chain_piece_block_request",
            Self::ChainPieceBlocks(_) => "chain_piece_blocks",
            Self::TransactionRequest(_) => "transaction_request",
        }
    }

    /// Encode only the payload; the topic the bytes travel on names the type.
    pub fn encode_payload(&self) -> CodecResult<Vec<u8>> {
        let kind = self.kind();
        let encoded = match self {
            Self::NewBlock(m) => bincode::serialize(m),
            Self::BlockRequest(m) => bincode::serialize(m),
            Self::BlockResponse(m) => bincode::serialize(m),
            Self::TopWeight(m) => bincode::serialize(m),
            Self::ChainPieceInfoRequest(m) => bincode::serialize(m),
            Self::ChainPieceInfo(m) => bincode::serialize(m),
            Self::ChainPieceBlockRequest(m) => bincode::serialize(m),
            Self::ChainPieceBlocks(m) => bincode::serialize(m),
            Self::TransactionRequest(m) => bincode::serialize(m),
        };
        encoded.map_err(|e| CodecError::Encode {
            kind,
            reason: e.to_string(),
        })
    }
}

/// Decode a payload of a known type.
pub fn decode_payload<T: DeserializeOwned>(kind: &'static str, bytes: &[u8]) -> CodecResult<T> {
    bincode::deserialize(bytes).map_err(|e| CodecError::Decode {
        kind,
        reason: e.to_string(),
    })
}
