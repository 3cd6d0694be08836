//! Bounded concurrency for page fetches.
//!
//! Each in-flight page request holds one [`SlotPermit`]. The slot is freed when
//! the permit is released or dropped, so a task that panics or returns early
//! still gives its slot back.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Counting semaphore gating simultaneous page fetches.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyLimiter {
    /// Creates a limiter with `limit` slots. A limit of zero is raised to one.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Creates a limiter sized for a fetch: never more slots than pages that
    /// may still be fetched.
    #[must_use]
    pub fn for_budget(concurrency: usize, page_budget: u64) -> Self {
        let budget = usize::try_from(page_budget).unwrap_or(usize::MAX);
        Self::new(concurrency.min(budget))
    }

    /// Returns the configured number of slots.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the number of currently free slots.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a free slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires before a slot frees up.
    /// A token that is already cancelled wins over a free slot.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<SlotPermit> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                // The semaphore is never closed; treat closure like shutdown.
                permit
                    .map(|permit| SlotPermit { _permit: permit })
                    .map_err(|_| Error::Cancelled)
            }
        }
    }
}

/// One acquired concurrency slot.
#[derive(Debug)]
#[must_use = "dropping the permit frees the slot immediately"]
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
}

impl SlotPermit {
    /// Frees the slot.
    pub fn release(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_limit_has_floor_of_one() {
        assert_eq!(ConcurrencyLimiter::new(0).limit(), 1);
        assert_eq!(ConcurrencyLimiter::for_budget(0, 0).limit(), 1);
    }

    #[test]
    fn test_limit_is_capped_by_page_budget() {
        assert_eq!(ConcurrencyLimiter::for_budget(8, 3).limit(), 3);
        assert_eq!(ConcurrencyLimiter::for_budget(2, 100).limit(), 2);
        assert_eq!(ConcurrencyLimiter::for_budget(4, u64::MAX).limit(), 4);
    }

    #[tokio::test]
    async fn test_release_frees_slot() {
        let limiter = ConcurrencyLimiter::new(1);
        let token = CancellationToken::new();

        let permit = limiter.acquire(&token).await.unwrap();
        assert_eq!(limiter.available(), 0);
        permit.release();
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let limiter = ConcurrencyLimiter::new(1);
        let token = CancellationToken::new();
        let _held = limiter.acquire(&token).await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            let token = token.clone();
            tokio::spawn(async move { limiter.acquire(&token).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancelled_token_wins_over_free_slot() {
        let limiter = ConcurrencyLimiter::new(2);
        let token = CancellationToken::new();
        token.cancel();

        assert!(limiter.acquire(&token).await.is_err());
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_acquired_permits_never_exceed_limit() {
        let limiter = ConcurrencyLimiter::new(3);
        let token = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let limiter = limiter.clone();
                let token = token.clone();
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let permit = limiter.acquire(&token).await.unwrap();
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    permit.release();
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(limiter.available(), 3);
    }
}
