//! # Message Router
//!
//! Network adapters publish inbound peer traffic on the bus as raw payload
//! bytes; the topic names the message type. The router decodes each payload
//! and hands it to the component that owns it:
//!
//! | Topic | Component |
//! |---|---|
//! | `NewBlockReceived` | chain `add_block` |
//! | `BlockRequest` / `BlockResponse` / `TopWeightAdvertised` | sync loop |
//! | `ChainPiece*` | fork resolver |

use async_trait::async_trait;
use lc_03_chain::ChainStateMachine;
use lc_04_fork_resolver::{ForkError, ForkResolver};
use lc_05_block_sync::{SyncError, SyncLoop};
use shared_bus::{ChainEvent, EventHandler, EventTopic};
use shared_types::{
    decode_payload, Block, BlockBatchResponse, BlockRequest, ChainPieceBlockMsg, ChainPieceInfo,
    ChainPieceInfoRequest, CodecError, NetworkMessage, PeerId, TopWeightInfo,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Fork(#[from] ForkError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("{kind} is not routed to the ledger core")]
    Unroutable { kind: &'static str },
}

/// The bus event a peer's `message` arrives as.
pub fn inbound_event(peer: PeerId, message: &NetworkMessage) -> Result<ChainEvent, RouteError> {
    let topic = match message {
        NetworkMessage::NewBlock(_) => EventTopic::NewBlockReceived,
        NetworkMessage::BlockRequest(_) => EventTopic::BlockRequest,
        NetworkMessage::BlockResponse(_) => EventTopic::BlockResponse,
        NetworkMessage::TopWeight(_) => EventTopic::TopWeightAdvertised,
        NetworkMessage::ChainPieceInfoRequest(_) => EventTopic::ChainPieceRequested,
        NetworkMessage::ChainPieceInfo(_) => EventTopic::ChainPieceReceived,
        NetworkMessage::ChainPieceBlockRequest(_) => EventTopic::ChainPieceBlockRequested,
        NetworkMessage::ChainPieceBlocks(_) => EventTopic::ChainPieceBlockReceived,
        NetworkMessage::TransactionRequest(_) => {
            return Err(RouteError::Unroutable {
                kind: message.kind(),
            })
        }
    };
    let payload = message.encode_payload()?;
    ChainEvent::inbound(topic, payload, peer).ok_or(RouteError::Unroutable {
        kind: message.kind(),
    })
}

pub struct MessageRouter {
    chain: Arc<ChainStateMachine>,
    fork: Arc<ForkResolver>,
    sync: Arc<SyncLoop>,
}

impl MessageRouter {
    pub fn new(chain: Arc<ChainStateMachine>, fork: Arc<ForkResolver>, sync: Arc<SyncLoop>) -> Self {
        Self { chain, fork, sync }
    }

    /// Topics this router consumes.
    pub fn topics() -> Vec<EventTopic> {
        EventTopic::INBOUND.to_vec()
    }

    /// Decode and dispatch one inbound event.
    pub async fn route(&self, event: ChainEvent) -> Result<(), RouteError> {
        match event {
            ChainEvent::BlockAdded(_) => Ok(()),
            ChainEvent::NewBlockReceived { payload, peer } => {
                let block: Block = decode_payload("new_block", &payload)?;
                let height = block.height();
                let result = self.chain.add_block(Some(peer), block).await;
                debug!(peer = %peer, height, %result, "new block from peer");
                Ok(())
            }
            ChainEvent::BlockRequest { payload, peer } => {
                let request: BlockRequest = decode_payload("block_request", &payload)?;
                Ok(self.sync.handle_block_request(peer, request).await?)
            }
            ChainEvent::BlockResponse { payload, peer } => {
                let response: BlockBatchResponse = decode_payload("block_response", &payload)?;
                Ok(self.sync.handle_block_response(peer, response).await?)
            }
            ChainEvent::TopWeightAdvertised { payload, peer } => {
                let top: TopWeightInfo = decode_payload("top_weight", &payload)?;
                self.sync.handle_top_weight(peer, top).await;
                Ok(())
            }
            ChainEvent::ChainPieceRequested { payload, peer } => {
                let request: ChainPieceInfoRequest =
                    decode_payload("chain_piece_info_request", &payload)?;
                Ok(self.fork.handle_piece_request(peer, request).await?)
            }
            ChainEvent::ChainPieceReceived { payload, peer } => {
                let info: ChainPieceInfo = decode_payload("chain_piece_info", &payload)?;
                Ok(self.fork.handle_piece_info(peer, info).await?)
            }
            ChainEvent::ChainPieceBlockRequested { payload, peer } => {
                let piece: ChainPieceInfo = decode_payload("chain_piece_block_request", &payload)?;
                Ok(self.fork.handle_piece_block_request(peer, piece).await?)
            }
            ChainEvent::ChainPieceBlockReceived { payload, peer } => {
                let msg: ChainPieceBlockMsg = decode_payload("chain_piece_blocks", &payload)?;
                Ok(self.fork.handle_piece_blocks(peer, msg).await?)
            }
        }
    }
}

#[async_trait]
impl EventHandler for MessageRouter {
    fn name(&self) -> &'static str {
        "message-router"
    }

    async fn handle(&self, event: ChainEvent) {
        let topic = event.topic();
        let peer = event.source_peer();
        if let Err(e) = self.route(event).await {
            warn!(
                ?topic,
                peer = ?peer.map(|p| p.to_string()),
                error = %e,
                "inbound message dropped"
            );
        }
    }
}
