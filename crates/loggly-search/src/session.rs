//! One server-side search and its page fetches.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::endpoint::{SearchEndpoint, SessionHandle};
use crate::error::{Error, Result};
use crate::page::Page;
use crate::query::Query;

/// A page together with the end-of-results verdict for it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// The fetched page.
    pub page: Page,
    /// True if the page was short, so no later page exists.
    pub is_last: bool,
}

/// A created search bound to its query.
///
/// The handle is only valid for the fetch call that created it.
#[derive(Clone)]
pub struct SearchSession {
    endpoint: Arc<dyn SearchEndpoint>,
    handle: SessionHandle,
    page_size: u32,
}

impl std::fmt::Debug for SearchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSession")
            .field("handle", &self.handle)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl SearchSession {
    /// Creates the search on the remote service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] for an unsendable query,
    /// [`Error::Cancelled`] if `cancel` fires, and
    /// [`Error::SessionCreation`] for any remote failure.
    pub async fn create(
        endpoint: Arc<dyn SearchEndpoint>,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        query.validate()?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let handle = endpoint
            .create_search(&query.to_query_string(), cancel)
            .await
            .map_err(Error::session_creation)?;

        tracing::info!(session = %handle, "search session created");

        Ok(Self {
            endpoint,
            handle,
            page_size: query.page_size(),
        })
    }

    /// Returns the session handle.
    #[must_use]
    pub const fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Fetches page `index`.
    ///
    /// The page is the last one if it holds fewer than `page_size` events.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires and
    /// [`Error::PageFetch`] for any remote failure.
    pub async fn fetch_page(&self, index: u64, cancel: &CancellationToken) -> Result<FetchedPage> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let body = self
            .endpoint
            .fetch_events_page(&self.handle, index, cancel)
            .await
            .map_err(|e| Error::page_fetch(index, e))?;

        if body.page != index {
            tracing::debug!(requested = index, reported = body.page, "service echoed a different page index");
        }

        let page = Page::new(index, body.total_events, body.events);
        let is_last = page.is_short(self.page_size);
        tracing::debug!(page = index, events = page.len(), is_last, "page fetched");

        Ok(FetchedPage { page, is_last })
    }
}
