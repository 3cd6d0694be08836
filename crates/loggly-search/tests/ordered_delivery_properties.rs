//! Property tests for in-order page delivery.
//!
//! Stores run concurrently on a multi-threaded runtime in a random order; the
//! output must always be the items in index order, each exactly once.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use loggly_search::ordered_buffer::OrderedBuffer;
use proptest::prelude::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("runtime")
}

/// A shuffled permutation of `0..n` for `n` in `1..max`.
fn arb_permutation(max: u64) -> impl Strategy<Value = Vec<u64>> {
    (1..max).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_any_store_order_is_delivered_in_index_order(
        order in arb_permutation(40),
        capacity in 1usize..4,
    ) {
        let n = order.len();
        let delivered = runtime().block_on(async move {
            let (tx, mut rx) = mpsc::channel(capacity);
            let buffer = Arc::new(OrderedBuffer::new(tx, CancellationToken::new()));

            let handles: Vec<_> = order
                .into_iter()
                .map(|index| {
                    let buffer = Arc::clone(&buffer);
                    tokio::spawn(async move { buffer.store(index, index * 10).await })
                })
                .collect();
            drop(buffer);

            let mut out = Vec::new();
            while let Some(item) = rx.recv().await {
                out.push(item);
            }

            let mut emitted = 0;
            for handle in handles {
                emitted += handle.await.expect("store task");
            }
            (out, emitted)
        });

        let (out, emitted) = delivered;
        let expected: Vec<u64> = (0..n as u64).map(|i| i * 10).collect();
        prop_assert_eq!(out, expected);
        prop_assert_eq!(emitted, n);
    }

    #[test]
    fn prop_missing_index_blocks_everything_after_it(
        order in arb_permutation(20),
        gap_seed in any::<prop::sample::Index>(),
    ) {
        let gap = gap_seed.index(order.len()) as u64;
        let delivered = runtime().block_on(async move {
            let (tx, mut rx) = mpsc::channel(64);
            let buffer = OrderedBuffer::new(tx, CancellationToken::new());

            for index in order.into_iter().filter(|&i| i != gap) {
                buffer.store(index, index).await;
            }
            buffer.close();
            drop(buffer);

            let mut out = Vec::new();
            while let Some(item) = rx.recv().await {
                out.push(item);
            }
            out
        });

        let expected: Vec<u64> = (0..gap).collect();
        prop_assert_eq!(delivered, expected);
    }
}
