//! # Catch-Up Sync
//!
//! A node behind its neighbors learns about heavier tops from their
//! `TopWeight` advertisements and pulls the missing blocks in batches of at
//! most the peer's request allowance. Peers that leave a request unanswered
//! are marked evil and lose allowance; the next candidate is tried at once.

#[cfg(test)]
mod tests {
    use crate::harness::{branch, shutdown_all, wait_until, LoopbackHub};
    use ledger_node::NodeConfig;
    use std::time::Duration;

    const PATIENCE: Duration = Duration::from_secs(120);

    // =============================================================================
    // TEST GROUP 1: CATCHING UP
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_lagging_node_catches_up() {
        let hub = LoopbackHub::new();
        let ahead = hub.spawn_node(1, NodeConfig::for_testing());
        let behind = hub.spawn_node(2, NodeConfig::for_testing());
        ahead.grow(&[10; 12], 1).await;
        ahead.start();
        behind.start();

        let target = ahead.top();
        assert!(wait_until(PATIENCE, || behind.top().hash == target.hash).await);
        assert_eq!(behind.height(), 12);
        assert!(behind.node.sync_loop().is_initialized());
        shutdown_all(&[&ahead, &behind]).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_catch_up_spans_several_batches() {
        let hub = LoopbackHub::new();
        let ahead = hub.spawn_node(1, NodeConfig::for_testing());
        let behind = hub.spawn_node(2, NodeConfig::for_testing());
        let blocks = ahead.grow(&[10; 40], 1).await;
        ahead.start();
        behind.start();

        let target = ahead.top();
        assert!(wait_until(PATIENCE, || behind.top().hash == target.hash).await);
        for block in &blocks {
            assert!(behind.node.chain().is_canonical(&block.hash()));
        }
        let allowance = behind.node.peer_scores().request_block_count(&ahead.id);
        assert_eq!(allowance, behind.node.config().peers.max_request_blocks);
        shutdown_all(&[&ahead, &behind]).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_overlap_fetches_only_the_gap() {
        let hub = LoopbackHub::new();
        let ahead = hub.spawn_node(1, NodeConfig::for_testing());
        let behind = hub.spawn_node(2, NodeConfig::for_testing());
        let genesis = ahead.top();
        let shared = branch(&genesis, &[10; 6], 1);
        ahead.import(&shared).await;
        behind.import(&shared).await;
        ahead.grow(&[10; 5], 1).await;
        ahead.start();
        behind.start();

        let target = ahead.top();
        assert!(wait_until(PATIENCE, || behind.top().hash == target.hash).await);
        assert_eq!(behind.height(), 11);
        shutdown_all(&[&ahead, &behind]).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_light_node_syncs_but_stays_quiet() {
        let hub = LoopbackHub::new();
        let ahead = hub.spawn_node(1, NodeConfig::for_testing());
        let mut light_config = NodeConfig::for_testing();
        light_config.sync.light_mode = true;
        let light = hub.spawn_node(2, light_config);
        let observer = hub.spawn_node(3, NodeConfig::for_testing());
        ahead.grow(&[10; 3], 1).await;
        ahead.start();
        light.start();

        let target = ahead.top();
        assert!(wait_until(PATIENCE, || light.top().hash == target.hash).await);

        // Only the full node's adverts ever reach the observer.
        observer.start();
        assert!(wait_until(PATIENCE, || observer.top().hash == target.hash).await);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(observer.node.sync_loop().candidate_count(), 0);
        assert!(observer.node.peer_scores().meter(&light.id).is_none());
        shutdown_all(&[&ahead, &light, &observer]).await;
    }

    // =============================================================================
    // TEST GROUP 2: UNRESPONSIVE PEERS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_is_penalized_and_honest_peer_serves() {
        let hub = LoopbackHub::new();
        let syncer = hub.spawn_node(1, NodeConfig::for_testing());
        let silent = hub.spawn_node(2, NodeConfig::for_testing());
        let honest = hub.spawn_node(3, NodeConfig::for_testing());

        // The silent peer advertises the heavier chain but never answers.
        silent.grow(&[20; 6], 2).await;
        honest.grow(&[10; 5], 3).await;
        hub.mute(silent.id, "block_response");
        for node in [&syncer, &silent, &honest] {
            node.start();
        }

        let honest_top = honest.top();
        assert!(wait_until(PATIENCE, || syncer.top().hash == honest_top.hash).await);
        let scores = syncer.node.peer_scores();
        assert!(wait_until(PATIENCE, || {
            scores
                .meter(&silent.id)
                .is_some_and(|m| m.request_blocks() < scores.config().max_request_blocks)
        })
        .await);
        assert_eq!(
            scores.request_block_count(&honest.id),
            scores.config().max_request_blocks
        );
        assert!(hub.lost() > 0);
        shutdown_all(&[&syncer, &silent, &honest]).await;
    }
}
