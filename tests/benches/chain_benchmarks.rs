//! # Ledger Core Benchmarks
//!
//! | Path | What is measured |
//! |------|------------------|
//! | lc-03 add_block | full pipeline for one appended block, with and without transactions |
//! | lc-03 batch_add_blocks | a sync-sized batch applied to a fresh chain |
//! | lc-03 reads | canonical range and chain piece queries on a 512-block chain |

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use lc_02_block_store::InMemoryKVStore;
use ledger_node::adapters::{HashingExecutor, MemoryTxPool, OfflineNetwork, SequentialConsensus};
use ledger_node::{Collaborators, LedgerNode, NodeConfig};
use ledger_tests::harness::{branch, next_block, transfer};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn fresh_node() -> LedgerNode {
    let collaborators = Collaborators {
        executor: Arc::new(HashingExecutor),
        tx_pool: Arc::new(MemoryTxPool::new()),
        consensus: Arc::new(SequentialConsensus),
        network: Arc::new(OfflineNetwork::new()),
    };
    LedgerNode::new(NodeConfig::default(), Box::new(InMemoryKVStore::new()), collaborators)
        .expect("node builds")
}

fn runtime() -> Runtime {
    Runtime::new().expect("tokio runtime")
}

// ============================================================================
// LC-03: Add Block
// ============================================================================

fn bench_add_block(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("lc-03-add-block");
    group.measurement_time(Duration::from_secs(10));

    for tx_count in [0usize, 10, 100] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("append", tx_count), &tx_count, |b, &tx_count| {
            b.iter_batched(
                || {
                    let node = fresh_node();
                    let txs = (0..tx_count as u64).map(|n| transfer(n, n + 1)).collect();
                    let block = next_block(&node.chain().top(), 10, 1, txs);
                    (node, block)
                },
                |(node, block)| rt.block_on(async { black_box(node.chain().add_block(None, block).await) }),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_batch_add(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("lc-03-batch-add");

    for size in [16usize, 64] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("batch", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let node = fresh_node();
                    let blocks = branch(&node.chain().top(), &vec![10; size], 1);
                    (node, blocks)
                },
                |(node, blocks)| rt.block_on(async { black_box(node.chain().batch_add_blocks(None, blocks).await) }),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

// ============================================================================
// LC-03: Canonical Reads
// ============================================================================

fn bench_reads(c: &mut Criterion) {
    let rt = runtime();
    let node = fresh_node();
    let blocks = branch(&node.chain().top(), &[10; 512], 1);
    rt.block_on(async {
        node.chain().batch_add_blocks(None, blocks).await;
    });
    let chain = node.chain();
    let mut rng = rand::thread_rng();

    let mut group = c.benchmark_group("lc-03-reads");
    group.bench_function("header_by_height_random", |b| {
        b.iter(|| black_box(chain.header_by_height(rng.gen_range(0..=512))))
    });
    group.bench_function("blocks_after_height_16", |b| {
        b.iter(|| black_box(chain.blocks_after_height(rng.gen_range(0..496), 16)))
    });
    group.bench_function("chain_piece_top", |b| {
        b.iter(|| black_box(chain.chain_piece(512, 10)))
    });
    group.finish();
}

criterion_group!(benches, bench_add_block, bench_batch_add, bench_reads);
criterion_main!(benches);
