//! # Fork Resolution
//!
//! Two nodes that built on different branches converge on the heavier one.
//! A fork one block deep is settled by the sync batch itself (it attaches
//! below the top and resets it); deeper forks go through chain piece
//! negotiation to find the common ancestor first.

#[cfg(test)]
mod tests {
    use crate::harness::{branch, shutdown_all, transfer, wait_until, LoopbackHub, TestNode};
    use ledger_node::NodeConfig;
    use shared_types::Block;
    use std::sync::Arc;
    use std::time::Duration;

    const PATIENCE: Duration = Duration::from_secs(120);

    /// Two unstarted nodes sharing `shared` blocks of qn 10 each.
    async fn pair_with_common_prefix(shared: usize) -> (Arc<LoopbackHub>, TestNode, TestNode) {
        let hub = LoopbackHub::new();
        let a = hub.spawn_node(1, NodeConfig::for_testing());
        let b = hub.spawn_node(2, NodeConfig::for_testing());
        let common = branch(&a.top(), &vec![10; shared], 1);
        a.import(&common).await;
        b.import(&common).await;
        (hub, a, b)
    }

    fn assert_detached(node: &TestNode, blocks: &[Block]) {
        for block in blocks {
            assert!(
                !node.node.chain().is_canonical(&block.hash()),
                "height {} still canonical",
                block.height()
            );
        }
    }

    // =============================================================================
    // TEST GROUP 1: COMPETING TOPS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_competing_blocks_settle_on_heavier() {
        let (hub, a, b) = pair_with_common_prefix(5).await;
        hub.partition(a.id, b.id);
        a.start();
        b.start();

        let tx = transfer(0, 42);
        let lighter = a.produce(10, 1, vec![tx.clone()]).await;
        let heavier = b.produce(20, 2, vec![]).await;
        assert!(a.pool.is_executed(&tx.hash()));
        hub.heal();

        assert!(wait_until(PATIENCE, || a.top().hash == heavier.hash()).await);
        assert_eq!(a.height(), 6);
        assert_eq!(b.top().hash, heavier.hash());
        assert_detached(&a, &[lighter]);

        // The detached block's transaction is pending again on its producer.
        assert!(!a.pool.is_executed(&tx.hash()));
        assert_eq!(a.pool.pending(), vec![tx]);
        shutdown_all(&[&a, &b]).await;
    }

    // =============================================================================
    // TEST GROUP 2: DEEP FORKS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_heavier_deep_fork_is_adopted() {
        // a: height 10, weight 100. b: height 12, weight 150, forked at 8.
        let (_hub, a, b) = pair_with_common_prefix(8).await;
        let a_branch = a.grow(&[10, 10], 1).await;
        b.grow(&[20, 20, 15, 15], 2).await;
        assert_eq!(a.top().total_qn, 100);
        assert_eq!(b.top().total_qn, 150);
        a.start();
        b.start();

        let target = b.top();
        assert!(wait_until(PATIENCE, || a.top().hash == target.hash).await);
        assert_eq!(a.height(), 12);
        assert_detached(&a, &a_branch);
        assert!(a.node.chain().header_by_height(8).is_some());
        assert!(wait_until(PATIENCE, || !a.node.fork_resolver().is_negotiating()).await);
        assert_eq!(b.top().hash, target.hash);
        shutdown_all(&[&a, &b]).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_lighter_side_converges_to_heavier() {
        let (_hub, a, b) = pair_with_common_prefix(8).await;
        a.grow(&[10, 10], 1).await;
        let b_branch = b.grow(&[5], 2).await;
        a.start();
        b.start();

        let target = a.top();
        assert!(wait_until(PATIENCE, || b.top().hash == target.hash).await);
        assert_detached(&b, &b_branch);
        assert_eq!(a.top().hash, target.hash);
        shutdown_all(&[&a, &b]).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_announced_fork_block_triggers_negotiation() {
        let (_hub, a, b) = pair_with_common_prefix(8).await;
        let a_branch = a.grow(&[10, 10], 1).await;
        b.grow(&[30], 2).await;
        a.start();
        b.start();

        // b's new tip reaches a with a parent a has never seen.
        let tip = b.produce(30, 2, vec![]).await;

        assert!(wait_until(PATIENCE, || a.top().hash == tip.hash()).await);
        assert_detached(&a, &a_branch);
        assert!(wait_until(PATIENCE, || !a.node.fork_resolver().is_negotiating()).await);
        shutdown_all(&[&a, &b]).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_chains_stay_put() {
        let (_hub, a, b) = pair_with_common_prefix(4).await;
        a.start();
        b.start();

        let before = a.top();
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(a.top().hash, before.hash);
        assert_eq!(b.top().hash, before.hash);
        assert_eq!(a.node.sync_loop().candidate_count(), 0);
        assert!(!a.node.fork_resolver().is_negotiating());
        shutdown_all(&[&a, &b]).await;
    }
}
