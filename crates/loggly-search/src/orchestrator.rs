//! Concurrent multi-page fetch.
//!
//! [`FetchOrchestrator::fetch`] creates a search session, then keeps up to
//! `concurrency` page requests in flight and hands each completed page to an
//! [`OrderedBuffer`] so callers receive pages strictly by index.
//!
//! ```text
//! Idle -> SessionPending -> Fetching -> Draining -> Done
//!               |
//!               +----------> Failed
//! ```
//!
//! Scheduling stops as soon as one of these trips: the page index passes the
//! query's bound, a short page marks the end of results, a page fetch fails, or
//! the caller cancels. Outstanding tasks are then awaited before the page stream
//! closes.
//!
//! Requests already in flight when the end is found may return pages past it;
//! those are dropped, so the stream ends with the short page.
//!
//! The first failure aborts sibling requests still in flight. Pages that had
//! already completed keep flowing to the caller unless the caller cancels.
//! A caller cancellation observed before the call concludes always ends with
//! [`Error::Cancelled`] on the error stream, even when it only interrupted
//! delivery.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::endpoint::SearchEndpoint;
use crate::error::Error;
use crate::limiter::{ConcurrencyLimiter, SlotPermit};
use crate::observability::fetch_span;
use crate::ordered_buffer::OrderedBuffer;
use crate::page::Page;
use crate::query::Query;
use crate::session::{FetchedPage, SearchSession};

/// Default number of concurrent page requests.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Pages waiting in the output channel before emission blocks.
const PAGE_CHANNEL_CAPACITY: usize = 1;

/// Lifecycle of one fetch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Nothing has happened yet.
    Idle,
    /// The search is being created.
    SessionPending,
    /// Page requests are being scheduled.
    Fetching,
    /// Scheduling stopped; waiting for in-flight requests.
    Draining,
    /// All requests settled and the page stream is closed.
    Done,
    /// The search could not be created.
    Failed,
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::SessionPending => "session_pending",
            Self::Fetching => "fetching",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Summary of a finished fetch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// Terminal state.
    pub state: FetchState,
    /// Number of page requests launched.
    pub pages_scheduled: u64,
    /// Pages that completed but never reached the caller, whether stuck behind
    /// a gap or cut off by cancellation. Pages fetched past the end of results
    /// are not counted.
    pub pages_discarded: usize,
    /// Whether an error was sent on the error stream.
    pub error_reported: bool,
}

/// Streams returned by [`FetchOrchestrator::fetch`].
///
/// Both channels close when the call concludes. Drain them concurrently: a
/// consumer that only waits on one can stall the other.
#[derive(Debug)]
pub struct FetchStreams {
    /// Pages in ascending index order.
    pub pages: mpsc::Receiver<Page>,
    /// At most one error; receiving it means the page stream is incomplete.
    pub errors: mpsc::Receiver<Error>,
    /// Resolves to the call summary once everything settled.
    pub report: JoinHandle<FetchReport>,
}

/// Everything a fetch call produced.
#[derive(Debug)]
pub struct Collected {
    /// Delivered pages in order.
    pub pages: Vec<Page>,
    /// The reported error, if any.
    pub error: Option<Error>,
    /// Call summary; `None` if the orchestrating task panicked.
    pub report: Option<FetchReport>,
}

impl FetchStreams {
    /// Drains both streams and waits for the call summary.
    pub async fn collect(self) -> Collected {
        let Self {
            mut pages,
            mut errors,
            report,
        } = self;

        let mut delivered = Vec::new();
        let mut error = None;
        let mut pages_open = true;
        let mut errors_open = true;

        while pages_open || errors_open {
            tokio::select! {
                page = pages.recv(), if pages_open => match page {
                    Some(page) => delivered.push(page),
                    None => pages_open = false,
                },
                err = errors.recv(), if errors_open => match err {
                    Some(err) => {
                        if error.is_none() {
                            error = Some(err);
                        }
                    }
                    None => errors_open = false,
                },
            }
        }

        Collected {
            pages: delivered,
            error,
            report: report.await.ok(),
        }
    }
}

/// Drives concurrent page fetches against a search endpoint.
#[derive(Clone)]
pub struct FetchOrchestrator {
    endpoint: Arc<dyn SearchEndpoint>,
}

impl fmt::Debug for FetchOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOrchestrator").finish_non_exhaustive()
    }
}

impl FetchOrchestrator {
    /// Creates an orchestrator over `endpoint`.
    #[must_use]
    pub fn new(endpoint: Arc<dyn SearchEndpoint>) -> Self {
        Self { endpoint }
    }

    /// Starts fetching `query` with up to `concurrency` requests in flight.
    ///
    /// Must be called from within a Tokio runtime. Page indices `0..=max_pages`
    /// are eligible; fetching stops at the first short page.
    #[must_use]
    pub fn fetch(&self, query: Query, concurrency: usize, cancel: CancellationToken) -> FetchStreams {
        let (page_tx, page_rx) = mpsc::channel(PAGE_CHANNEL_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(1);

        let span = fetch_span(query.filter(), query.max_pages_bound(), concurrency);
        let run = FetchRun {
            endpoint: Arc::clone(&self.endpoint),
            query,
            concurrency,
            cancel,
            errors: ErrorSink::new(error_tx),
        };
        let report = tokio::spawn(run.execute(page_tx).instrument(span));

        FetchStreams {
            pages: page_rx,
            errors: error_rx,
            report,
        }
    }
}

/// First-error-wins handle onto the error stream.
#[derive(Debug, Clone)]
struct ErrorSink {
    reported: Arc<AtomicBool>,
    tx: mpsc::Sender<Error>,
}

impl ErrorSink {
    fn new(tx: mpsc::Sender<Error>) -> Self {
        Self {
            reported: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    /// Sends `err` unless an earlier error was already sent. Returns true if
    /// this error was the one sent.
    fn report(&self, err: Error) -> bool {
        if self.reported.swap(true, Ordering::AcqRel) {
            tracing::debug!(error = %err, "suppressing secondary error");
            return false;
        }
        if self.tx.try_send(err).is_err() {
            tracing::debug!("error stream receiver dropped");
        }
        true
    }

    fn has_reported(&self) -> bool {
        self.reported.load(Ordering::Acquire)
    }
}

/// State shared between the coordinator and its page tasks.
struct Shared {
    session: SearchSession,
    buffer: OrderedBuffer<Page>,
    has_more: AtomicBool,
    errors: ErrorSink,
    abort: CancellationToken,
}

impl Shared {
    fn fail(&self, err: Error) {
        self.has_more.store(false, Ordering::Release);
        let aborting = !err.is_cancelled();
        self.errors.report(err);
        if aborting {
            self.abort.cancel();
        }
    }
}

struct FetchRun {
    endpoint: Arc<dyn SearchEndpoint>,
    query: Query,
    concurrency: usize,
    cancel: CancellationToken,
    errors: ErrorSink,
}

impl FetchRun {
    async fn execute(self, page_tx: mpsc::Sender<Page>) -> FetchReport {
        let mut state = FetchState::Idle;
        transition(&mut state, FetchState::SessionPending);

        let session = match SearchSession::create(
            Arc::clone(&self.endpoint),
            &self.query,
            &self.cancel,
        )
        .await
        {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "search session creation failed");
                self.errors.report(err);
                transition(&mut state, FetchState::Failed);
                return FetchReport {
                    state,
                    pages_scheduled: 0,
                    pages_discarded: 0,
                    error_reported: true,
                };
            }
        };

        transition(&mut state, FetchState::Fetching);

        let limiter = ConcurrencyLimiter::for_budget(self.concurrency, self.query.page_budget());
        let shared = Arc::new(Shared {
            session,
            buffer: OrderedBuffer::new(page_tx, self.cancel.clone()),
            has_more: AtomicBool::new(true),
            errors: self.errors.clone(),
            abort: self.cancel.child_token(),
        });
        let max_index = self.query.max_pages_bound();
        let next_index = AtomicU64::new(0);
        let mut tasks = JoinSet::new();
        let mut task_pages = HashMap::new();

        loop {
            let permit = match limiter.acquire(&shared.abort).await {
                Ok(permit) => permit,
                Err(_) => {
                    if self.cancel.is_cancelled() {
                        shared.errors.report(Error::Cancelled);
                    }
                    break;
                }
            };

            if !shared.has_more.load(Ordering::Acquire) {
                tracing::debug!("end of results reached, stop scheduling");
                break;
            }
            if next_index.load(Ordering::Acquire) > max_index {
                tracing::debug!(max_index, "page bound reached, stop scheduling");
                break;
            }

            let index = next_index.fetch_add(1, Ordering::AcqRel);
            tracing::debug!(page = index, "scheduling page fetch");
            let handle = tasks.spawn(fetch_page_task(Arc::clone(&shared), index, permit));
            task_pages.insert(handle.id(), index);

            while let Some(joined) = tasks.try_join_next_with_id() {
                settle(&shared, &mut task_pages, joined);
            }
        }

        transition(&mut state, FetchState::Draining);
        while let Some(joined) = tasks.join_next_with_id().await {
            settle(&shared, &mut task_pages, joined);
        }

        let pages_discarded = shared.buffer.close();
        if pages_discarded > 0 {
            tracing::debug!(pages_discarded, "discarding pages that could not be delivered");
        }
        // A cancel that only interrupted emission still truncated the stream.
        if self.cancel.is_cancelled() && !self.errors.has_reported() {
            tracing::debug!("cancelled while draining");
            self.errors.report(Error::Cancelled);
        }

        transition(&mut state, FetchState::Done);
        let pages_scheduled = next_index.load(Ordering::Acquire);
        tracing::info!(pages_scheduled, delivered = shared.buffer.next_index(), "fetch finished");

        FetchReport {
            state,
            pages_scheduled,
            pages_discarded,
            error_reported: self.errors.has_reported(),
        }
    }
}

async fn fetch_page_task(shared: Arc<Shared>, index: u64, permit: SlotPermit) {
    match shared.session.fetch_page(index, &shared.abort).await {
        Ok(FetchedPage { page, is_last }) => {
            if is_last {
                tracing::debug!(page = index, "short page, no more results");
                shared.has_more.store(false, Ordering::Release);
                let dropped = shared.buffer.seal(index);
                if dropped > 0 {
                    tracing::debug!(page = index, dropped, "dropping pages fetched past the end");
                }
            }
            shared.buffer.store(index, page).await;
        }
        Err(err) => {
            if !err.is_cancelled() {
                tracing::warn!(page = index, error = %err, "page fetch failed");
            }
            shared.fail(err);
        }
    }
    permit.release();
}

fn settle(
    shared: &Shared,
    task_pages: &mut HashMap<tokio::task::Id, u64>,
    joined: Result<(tokio::task::Id, ()), JoinError>,
) {
    match joined {
        Ok((id, ())) => {
            task_pages.remove(&id);
        }
        Err(err) => {
            let page = task_pages.remove(&err.id()).unwrap_or_default();
            tracing::error!(page, error = %err, "page fetch task did not complete");
            shared.fail(Error::PageFetch {
                page,
                message: "fetch task did not complete".to_string(),
                source: Some(Box::new(err)),
            });
        }
    }
}

fn transition(state: &mut FetchState, next: FetchState) {
    tracing::debug!(from = %state, to = %next, "fetch state transition");
    *state = next;
}
