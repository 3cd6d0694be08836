//! In-order reassembly of concurrently fetched pages.
//!
//! Fetch tasks finish in any order. [`OrderedBuffer`] parks each completed item
//! under its index and forwards items to a single output channel strictly in
//! ascending index order, starting at 0.
//!
//! ## Emission protocol
//!
//! The state mutex is held only to insert an item and to pop the next
//! contiguous one; the channel send happens outside the lock. At most one
//! caller emits at a time (the `draining` flag), which keeps sends ordered even
//! though the lock is released between them. Every [`OrderedBuffer::store`]
//! takes part in draining: either it becomes the drainer, or the current drainer
//! is guaranteed to see the new item because clearing `draining` and checking
//! for the next index happen under the same lock acquisition.
//!
//! ## Gaps
//!
//! An index that is never stored stalls every later index. Items parked behind
//! a gap are discarded when the buffer is closed or dropped.
//!
//! Every item that is stored but never emitted, other than those dropped by
//! sealing, is counted; [`OrderedBuffer::close`] returns the total.
//!
//! ## Sealing
//!
//! [`OrderedBuffer::seal`] fixes the last deliverable index once it is known.
//! Items above it are dropped, whether already parked or stored later.
//!
//! ## Bound
//!
//! Parked items live in a `BTreeMap`. The fetch orchestrator never stores an
//! index above the query's page bound, so the map holds at most
//! `max_pages + 1` entries.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct PendingSet<T> {
    pending: BTreeMap<u64, T>,
    next: u64,
    last: Option<u64>,
    discarded: usize,
    draining: bool,
    closed: bool,
}

/// Reorders indexed items onto a single output channel.
#[derive(Debug)]
pub struct OrderedBuffer<T> {
    state: Mutex<PendingSet<T>>,
    output: mpsc::Sender<T>,
    cancel: CancellationToken,
}

impl<T> OrderedBuffer<T> {
    /// Creates a buffer emitting on `output`.
    ///
    /// Emission stops for good once `cancel` fires or the receiver is dropped.
    #[must_use]
    pub fn new(output: mpsc::Sender<T>, cancel: CancellationToken) -> Self {
        Self {
            state: Mutex::new(PendingSet {
                pending: BTreeMap::new(),
                next: 0,
                last: None,
                discarded: 0,
                draining: false,
                closed: false,
            }),
            output,
            cancel,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PendingSet<T>> {
        // No code path panics while holding the lock.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores the item for `index` and emits every item that became contiguous.
    ///
    /// Each index must be stored at most once. Returns the number of items this
    /// call emitted; zero if another caller is already emitting, in which case
    /// that caller picks the item up.
    pub async fn store(&self, index: u64, item: T) -> usize {
        {
            let mut state = self.lock();
            if state.closed || index < state.next {
                tracing::debug!(index, "ordered buffer discarding late item");
                state.discarded += 1;
                return 0;
            }
            if state.last.is_some_and(|last| index > last) {
                tracing::debug!(index, "ordered buffer discarding item past the sealed end");
                return 0;
            }
            state.pending.insert(index, item);
            if state.draining {
                return 0;
            }
            state.draining = true;
        }

        self.drain().await
    }

    async fn drain(&self) -> usize {
        let mut guard = DrainGuard { buffer: self, armed: true };
        let mut delivered = 0;

        loop {
            let item = {
                let mut state = self.lock();
                let next = state.next;
                let ready = if state.closed {
                    None
                } else {
                    state.pending.remove(&next)
                };
                if let Some(item) = ready {
                    state.next = next + 1;
                    item
                } else {
                    state.draining = false;
                    guard.armed = false;
                    return delivered;
                }
            };

            let sent = tokio::select! {
                biased;
                () = self.cancel.cancelled() => false,
                result = self.output.send(item) => result.is_ok(),
            };

            if !sent {
                let mut state = self.lock();
                state.closed = true;
                state.draining = false;
                state.discarded += 1 + state.pending.len();
                state.pending.clear();
                guard.armed = false;
                return delivered;
            }
            delivered += 1;
        }
    }

    /// Marks `last` as the final deliverable index and drops parked items above
    /// it, returning how many were dropped.
    ///
    /// Sealing twice keeps the lower bound.
    pub fn seal(&self, last: u64) -> usize {
        let mut state = self.lock();
        let last = state.last.map_or(last, |current| current.min(last));
        state.last = Some(last);
        match last.checked_add(1) {
            Some(first_dropped) => state.pending.split_off(&first_dropped).len(),
            None => 0,
        }
    }

    /// Returns the next index the buffer is waiting for.
    #[must_use]
    pub fn next_index(&self) -> u64 {
        self.lock().next
    }

    /// Returns how many items are parked waiting for a lower index.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Stops emission and discards parked items.
    ///
    /// Returns how many stored items were never emitted over the buffer's
    /// lifetime, including those lost when emission stopped mid-drain.
    pub fn close(&self) -> usize {
        let mut state = self.lock();
        state.closed = true;
        state.discarded += state.pending.len();
        state.pending.clear();
        state.discarded
    }
}

/// Clears the `draining` flag if a drain is abandoned mid-send.
struct DrainGuard<'a, T> {
    buffer: &'a OrderedBuffer<T>,
    armed: bool,
}

impl<T> Drop for DrainGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.buffer.lock().draining = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn buffer<T>(capacity: usize) -> (OrderedBuffer<T>, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(capacity);
        (OrderedBuffer::new(tx, CancellationToken::new()), rx)
    }

    #[tokio::test]
    async fn test_in_order_delivery() {
        let (buf, mut rx) = buffer(3);

        assert_eq!(buf.store(0, 10).await, 1);
        assert_eq!(buf.store(1, 20).await, 1);
        assert_eq!(buf.store(2, 30).await, 1);

        let got = vec![rx.recv().await, rx.recv().await, rx.recv().await];
        assert_eq!(got, vec![Some(10), Some(20), Some(30)]);
    }

    #[tokio::test]
    async fn test_out_of_order_delivery() {
        let (buf, mut rx) = buffer(3);

        assert_eq!(buf.store(2, "c").await, 0);
        assert_eq!(buf.store(0, "a").await, 1);
        assert_eq!(buf.pending_len(), 1);
        assert_eq!(buf.store(1, "b").await, 2);

        let got = vec![rx.recv().await, rx.recv().await, rx.recv().await];
        assert_eq!(got, vec![Some("a"), Some("b"), Some("c")]);
        assert_eq!(buf.next_index(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_stores() {
        let (buf, mut rx) = buffer(1);
        let buf = Arc::new(buf);

        let handles: Vec<_> = [1_u64, 0, 2]
            .into_iter()
            .map(|i| {
                let buf = Arc::clone(&buf);
                tokio::spawn(async move { buf.store(i, i * 50 + 50).await })
            })
            .collect();

        let mut got = Vec::new();
        for _ in 0..3 {
            got.push(rx.recv().await.unwrap());
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(got, vec![50, 100, 150]);
    }

    #[tokio::test]
    async fn test_gap_stalls_later_items_until_close() {
        let (buf, mut rx) = buffer(4);

        buf.store(1, 'b').await;
        buf.store(2, 'c').await;
        assert_eq!(buf.pending_len(), 2);
        assert!(rx.try_recv().is_err());

        assert_eq!(buf.close(), 2);
        drop(buf);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_store_after_close_is_discarded() {
        let (buf, mut rx) = buffer(4);
        buf.close();

        assert_eq!(buf.store(0, 1).await, 0);
        assert_eq!(buf.pending_len(), 0);
        drop(buf);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_blocked_emission_does_not_block_other_stores() {
        let (buf, mut rx) = buffer(1);
        let buf = Arc::new(buf);

        // Fills the channel, then blocks sending index 1.
        let drainer = {
            let buf = Arc::clone(&buf);
            tokio::spawn(async move {
                buf.store(1, 1).await;
                buf.store(0, 0).await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Returns immediately even though emission is blocked.
        assert_eq!(buf.store(2, 2).await, 0);

        let mut got = Vec::new();
        for _ in 0..3 {
            got.push(rx.recv().await.unwrap());
        }
        assert_eq!(drainer.await.unwrap(), 3);
        assert_eq!(got, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_cancellation_stops_emission() {
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let buf = OrderedBuffer::new(tx, cancel.clone());

        buf.store(0, 'a').await;
        cancel.cancel();
        assert_eq!(buf.store(1, 'b').await, 0);
        assert_eq!(buf.close(), 1);

        drop(buf);
        assert_eq!(rx.recv().await, Some('a'));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_seal_drops_items_past_the_end() {
        let (buf, mut rx) = buffer(4);

        buf.store(3, 'd').await;
        buf.store(2, 'c').await;
        assert_eq!(buf.seal(1), 2);
        assert_eq!(buf.store(4, 'e').await, 0);
        assert_eq!(buf.seal(5), 0);

        buf.store(1, 'b').await;
        buf.store(0, 'a').await;
        assert_eq!(buf.pending_len(), 0);
        drop(buf);

        assert_eq!(rx.recv().await, Some('a'));
        assert_eq!(rx.recv().await, Some('b'));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_cancel_during_blocked_send_counts_lost_items() {
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let buf = Arc::new(OrderedBuffer::new(tx, cancel.clone()));

        buf.store(0, 0).await;
        let drainer = {
            let buf = Arc::clone(&buf);
            tokio::spawn(async move { buf.store(1, 1).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(buf.store(2, 2).await, 0);
        assert_eq!(buf.store(4, 4).await, 0);

        cancel.cancel();
        assert_eq!(drainer.await.unwrap(), 0);
        assert_eq!(buf.pending_len(), 0);

        // 1 was popped mid-send, 2 and 4 were parked, 3 arrives late.
        assert_eq!(buf.store(3, 3).await, 0);
        assert_eq!(buf.close(), 4);

        assert_eq!(rx.recv().await, Some(0));
        drop(buf);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropped_receiver_closes_buffer() {
        let (buf, rx) = buffer(1);
        drop(rx);

        assert_eq!(buf.store(0, 1).await, 0);
        buf.store(2, 3).await;
        assert_eq!(buf.pending_len(), 0);
    }
}
