//! Deterministic simulated search endpoint.
//!
//! [`SimulatedEndpoint`] serves scripted pages from memory and lets tests
//! reproduce scheduling scenarios reliably.
//!
//! # Key Features
//!
//! - **Scripted pages**: page `i` returns `pages[i]`; indices past the script
//!   return an empty page
//! - **Latency control**: a default latency, per-page overrides, and seeded
//!   jitter, all driven by Tokio time (works with paused time)
//! - **Fault injection**: fail session creation or a chosen page index
//! - **Operation recording**: every remote call in arrival order, plus a peak
//!   in-flight gauge for concurrency checks
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//!
//! use loggly_test_utils::{SimulatedEndpoint, full_pages};
//!
//! let endpoint = SimulatedEndpoint::new(full_pages(3, 2))
//!     .with_latency(Duration::from_millis(5))
//!     .failing_at_page(2);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use loggly_search::endpoint::{EventsPage, SearchEndpoint, SessionHandle};
use loggly_search::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Session identifier issued by the simulation.
pub const SIMULATED_RSID: &str = "sim-rsid-1";

/// A remote call observed by the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    /// Search creation with the encoded query string.
    CreateSearch {
        /// The query string as received.
        query_string: String,
    },
    /// Page fetch.
    FetchPage {
        /// Requested page index.
        page: u64,
    },
}

#[derive(Debug)]
struct Jitter {
    rng: StdRng,
    min_ms: u64,
    max_ms: u64,
}

/// Scripted in-memory [`SearchEndpoint`].
#[derive(Debug)]
pub struct SimulatedEndpoint {
    pages: Vec<Vec<Value>>,
    latency: Duration,
    page_latency: HashMap<u64, Duration>,
    jitter: Option<Mutex<Jitter>>,
    fail_session: bool,
    fail_at_page: Option<u64>,
    honor_cancellation: bool,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedEndpoint {
    /// Creates an endpoint serving `pages`.
    pub fn new(pages: Vec<Vec<Value>>) -> Self {
        Self {
            pages,
            latency: Duration::ZERO,
            page_latency: HashMap::new(),
            jitter: None,
            fail_session: false,
            fail_at_page: None,
            honor_cancellation: true,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sets the latency of every call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Overrides the latency of one page.
    #[must_use]
    pub fn with_page_latency(mut self, page: u64, latency: Duration) -> Self {
        self.page_latency.insert(page, latency);
        self
    }

    /// Adds seeded random latency in `min_ms..=max_ms` to every page fetch.
    #[must_use]
    pub fn with_jitter(mut self, seed: u64, min_ms: u64, max_ms: u64) -> Self {
        self.jitter = Some(Mutex::new(Jitter {
            rng: StdRng::seed_from_u64(seed),
            min_ms,
            max_ms: max_ms.max(min_ms),
        }));
        self
    }

    /// Makes search creation fail with a 401.
    #[must_use]
    pub fn failing_session(mut self) -> Self {
        self.fail_session = true;
        self
    }

    /// Makes fetching `page` fail with a 500.
    #[must_use]
    pub fn failing_at_page(mut self, page: u64) -> Self {
        self.fail_at_page = Some(page);
        self
    }

    /// Makes calls ignore the cancellation token until their latency elapses.
    #[must_use]
    pub fn ignoring_cancellation(mut self) -> Self {
        self.honor_cancellation = false;
        self
    }

    /// Returns every recorded call in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Returns the page indices requested, in arrival order.
    pub fn fetched_pages(&self) -> Vec<u64> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                RecordedCall::FetchPage { page } => Some(*page),
                RecordedCall::CreateSearch { .. } => None,
            })
            .collect()
    }

    /// Returns the number of page fetches issued.
    pub fn fetch_count(&self) -> usize {
        self.fetched_pages().len()
    }

    /// Returns the highest number of simultaneous page fetches observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: RecordedCall) {
        lock(&self.calls).push(call);
    }

    fn total_events(&self) -> u64 {
        self.pages.iter().map(|p| p.len() as u64).sum()
    }

    fn latency_for(&self, page: u64) -> Duration {
        let base = self.page_latency.get(&page).copied().unwrap_or(self.latency);
        let extra = self.jitter.as_ref().map_or(0, |jitter| {
            let mut jitter = lock(jitter);
            let (min, max) = (jitter.min_ms, jitter.max_ms);
            jitter.rng.gen_range(min..=max)
        });
        base + Duration::from_millis(extra)
    }

    async fn wait(&self, latency: Duration, cancel: &CancellationToken) -> Result<()> {
        if self.honor_cancellation {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(Error::Cancelled),
                () = tokio::time::sleep(latency) => Ok(()),
            }
        } else {
            tokio::time::sleep(latency).await;
            Ok(())
        }
    }
}

/// Tracks one in-flight page fetch.
struct InFlight<'a> {
    endpoint: &'a SimulatedEndpoint,
}

impl<'a> InFlight<'a> {
    fn enter(endpoint: &'a SimulatedEndpoint) -> Self {
        let now = endpoint.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        endpoint.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self { endpoint }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.endpoint.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SearchEndpoint for SimulatedEndpoint {
    async fn create_search(
        &self,
        query_string: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionHandle> {
        self.record(RecordedCall::CreateSearch {
            query_string: query_string.to_string(),
        });
        self.wait(self.latency, cancel).await?;

        if self.fail_session {
            return Err(Error::Remote {
                status: 401,
                message: "simulated authentication failure".to_string(),
            });
        }
        Ok(SessionHandle::new(SIMULATED_RSID))
    }

    async fn fetch_events_page(
        &self,
        session: &SessionHandle,
        page: u64,
        cancel: &CancellationToken,
    ) -> Result<EventsPage> {
        let _in_flight = InFlight::enter(self);
        self.record(RecordedCall::FetchPage { page });

        if session.as_str() != SIMULATED_RSID {
            return Err(Error::Remote {
                status: 404,
                message: format!("unknown rsid {session}"),
            });
        }

        self.wait(self.latency_for(page), cancel).await?;

        if self.fail_at_page == Some(page) {
            return Err(Error::Remote {
                status: 500,
                message: format!("simulated failure at page {page}"),
            });
        }

        let events = usize::try_from(page)
            .ok()
            .and_then(|i| self.pages.get(i))
            .cloned()
            .unwrap_or_default();

        Ok(EventsPage {
            total_events: self.total_events(),
            page,
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::full_pages;

    #[tokio::test]
    async fn test_pages_past_script_are_empty() {
        let endpoint = SimulatedEndpoint::new(full_pages(1, 2));
        let cancel = CancellationToken::new();
        let handle = endpoint.create_search("q=x", &cancel).await.unwrap();

        assert_eq!(endpoint.fetch_events_page(&handle, 0, &cancel).await.unwrap().events.len(), 2);
        let past = endpoint.fetch_events_page(&handle, 5, &cancel).await.unwrap();
        assert!(past.events.is_empty());
        assert_eq!(past.total_events, 2);
        assert_eq!(endpoint.fetched_pages(), vec![0, 5]);
        assert_eq!(
            endpoint.calls()[0],
            RecordedCall::CreateSearch {
                query_string: "q=x".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_latency() {
        let endpoint = SimulatedEndpoint::new(full_pages(1, 2)).with_latency(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let handle = SessionHandle::new(SIMULATED_RSID);

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                cancel.cancel();
            })
        };

        let err = endpoint.fetch_events_page(&handle, 0, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        canceller.await.unwrap();
    }

    #[test]
    fn test_jitter_is_reproducible() {
        let a = SimulatedEndpoint::new(Vec::new()).with_jitter(7, 1, 50);
        let b = SimulatedEndpoint::new(Vec::new()).with_jitter(7, 1, 50);
        let first: Vec<_> = (0..5).map(|p| a.latency_for(p)).collect();
        let second: Vec<_> = (0..5).map(|p| b.latency_for(p)).collect();
        assert_eq!(first, second);
    }
}
