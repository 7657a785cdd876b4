//! # Block Propagation
//!
//! A block produced on one node is broadcast as `NewBlock` and added by
//! every peer through the same `add_block` pipeline. Arrival order is not
//! guaranteed: the dispatcher runs handlers concurrently, so children may
//! land before parents and must be parked until the parent commits.
//!
//! A block announced without transaction bodies waits until the pool has
//! them, or until the fetch from its sender times out.

#[cfg(test)]
mod tests {
    use crate::harness::{next_block, shutdown_all, transfer, wait_until, within, LoopbackHub};
    use lc_03_chain::AddBlockResult;
    use ledger_node::NodeConfig;
    use shared_bus::{ChainEvent, EventFilter, EventTopic};
    use shared_types::{Block, NetworkMessage, PeerId};
    use std::time::Duration;

    const PATIENCE: Duration = Duration::from_secs(60);

    // =============================================================================
    // TEST GROUP 1: BROADCAST
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_produced_blocks_reach_every_peer() {
        let hub = LoopbackHub::new();
        let a = hub.spawn_node(1, NodeConfig::for_testing());
        let b = hub.spawn_node(2, NodeConfig::for_testing());
        let c = hub.spawn_node(3, NodeConfig::for_testing());
        for node in [&a, &b, &c] {
            node.start();
        }

        for _ in 0..3 {
            a.produce(10, 1, vec![]).await;
        }
        let top = a.top();

        assert!(wait_until(PATIENCE, || b.top().hash == top.hash && c.top().hash == top.hash).await);
        assert_eq!(b.height(), 3);
        assert_eq!(c.node.chain().top_weight(), a.node.chain().top_weight());
        shutdown_all(&[&a, &b, &c]).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_transactions_are_marked_executed_on_receivers() {
        let hub = LoopbackHub::new();
        let a = hub.spawn_node(1, NodeConfig::for_testing());
        let b = hub.spawn_node(2, NodeConfig::for_testing());
        a.start();
        b.start();

        let txs = vec![transfer(0, 5), transfer(1, 7)];
        let block = a.produce(10, 1, txs.clone()).await;

        assert!(wait_until(PATIENCE, || b.top().hash == block.hash()).await);
        for tx in &txs {
            assert!(b.pool.is_executed(&tx.hash()));
            assert!(a.pool.is_executed(&tx.hash()));
        }
        assert!(b.pool.pending().is_empty());
        shutdown_all(&[&a, &b]).await;
    }

    // =============================================================================
    // TEST GROUP 2: OUT-OF-ORDER ARRIVAL
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_children_arriving_first_cascade_once_parent_lands() {
        let hub = LoopbackHub::new();
        let a = hub.spawn_node(1, NodeConfig::for_testing());
        a.start();

        let genesis = a.top();
        let b1 = next_block(&genesis, 10, 9, vec![]);
        let b2 = next_block(&b1.header, 10, 9, vec![]);
        let b3 = next_block(&b2.header, 10, 9, vec![]);

        // The sender is not on the hub; any follow-up request to it fails fast.
        let stranger = PeerId::new([99; 32]);
        for block in [&b3, &b2] {
            a.node
                .deliver(stranger, &NetworkMessage::NewBlock(block.clone()))
                .await
                .unwrap();
        }
        assert!(wait_until(PATIENCE, || a.node.chain().future_block_count() == 2).await);
        assert_eq!(a.height(), 0);

        a.node
            .deliver(stranger, &NetworkMessage::NewBlock(b1.clone()))
            .await
            .unwrap();

        assert!(wait_until(PATIENCE, || a.top().hash == b3.hash()).await);
        assert_eq!(a.node.chain().future_block_count(), 0);
        assert!(a.node.chain().is_canonical(&b2.hash()));
        a.node.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_announcements_are_harmless() {
        let hub = LoopbackHub::new();
        let a = hub.spawn_node(1, NodeConfig::for_testing());
        let b = hub.spawn_node(2, NodeConfig::for_testing());
        a.start();
        b.start();

        let block = a.produce(10, 1, vec![]).await;
        assert!(wait_until(PATIENCE, || b.top().hash == block.hash()).await);

        for _ in 0..3 {
            b.node
                .deliver(a.id, &NetworkMessage::NewBlock(block.clone()))
                .await
                .unwrap();
        }
        assert_eq!(
            b.node.chain().add_block(Some(a.id), block.clone()).await,
            AddBlockResult::AlreadyExists
        );
        assert_eq!(b.height(), 1);
        shutdown_all(&[&a, &b]).await;
    }

    // =============================================================================
    // TEST GROUP 3: EVENTS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_block_added_events_follow_commits() {
        let hub = LoopbackHub::new();
        let a = hub.spawn_node(1, NodeConfig::for_testing());
        let b = hub.spawn_node(2, NodeConfig::for_testing());
        let mut added = b
            .node
            .bus()
            .subscribe(EventFilter::topics(vec![EventTopic::BlockAdded]));
        a.start();
        b.start();

        let first = a.produce(10, 1, vec![]).await;
        let second = a.produce(10, 1, vec![]).await;

        let mut seen = Vec::new();
        while seen.len() < 2 {
            match within("block added event", added.recv()).await {
                Some(ChainEvent::BlockAdded(block)) => seen.push(block.hash()),
                Some(_) => {}
                None => break,
            }
        }
        assert!(seen.contains(&first.hash()));
        assert!(seen.contains(&second.hash()));
        shutdown_all(&[&a, &b]).await;
    }

    // =============================================================================
    // TEST GROUP 4: BLOCKS WAITING FOR TRANSACTIONS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_compact_block_resumes_when_transactions_arrive() {
        let hub = LoopbackHub::new();
        let a = hub.spawn_node(1, NodeConfig::for_testing());
        let sender = hub.spawn_node(2, NodeConfig::for_testing());
        a.start();

        let txs = vec![transfer(0, 3), transfer(1, 4)];
        let block = next_block(&a.top(), 10, 2, txs.clone());
        let compact = Block::new(block.header.clone(), vec![]);
        a.node
            .deliver(sender.id, &NetworkMessage::NewBlock(compact))
            .await
            .unwrap();
        assert!(wait_until(PATIENCE, || a.node.chain().pending_block_count() == 1).await);
        assert_eq!(a.node.transactions_arrived().await, 0);

        for tx in &txs {
            a.pool.add(tx.clone());
        }
        assert_eq!(a.node.transactions_arrived().await, 1);
        assert_eq!(a.top().hash, block.hash());
        assert_eq!(a.node.chain().pending_block_count(), 0);
        for tx in &txs {
            assert!(a.pool.is_executed(&tx.hash()));
        }
        assert!(a.node.peer_scores().meter(&sender.id).is_none());
        a.node.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_transaction_fetch_charges_sender() {
        let hub = LoopbackHub::new();
        let a = hub.spawn_node(1, NodeConfig::for_testing());
        let sender = hub.spawn_node(2, NodeConfig::for_testing());
        a.start();

        let txs = vec![transfer(0, 3)];
        let block = next_block(&a.top(), 10, 2, txs.clone());
        a.node
            .deliver(sender.id, &NetworkMessage::NewBlock(Block::new(block.header.clone(), vec![])))
            .await
            .unwrap();
        assert!(wait_until(PATIENCE, || a.node.chain().pending_block_count() == 1).await);

        let scores = a.node.peer_scores();
        assert!(wait_until(PATIENCE, || {
            scores.meter(&sender.id).is_some_and(|m| m.timeout_count() == 1)
        })
        .await);
        assert_eq!(a.node.chain().pending_block_count(), 0);

        // bodies showing up after the timeout resume nothing
        a.pool.add(txs[0].clone());
        assert_eq!(a.node.transactions_arrived().await, 0);
        assert_eq!(a.height(), 0);
        a.node.shutdown().await;
    }
}
