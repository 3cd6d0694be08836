//! CLI command implementations.

pub mod count;
pub mod fields;
pub mod search;

use std::sync::Arc;

use anyhow::{Context, Result};
use loggly_search::endpoint::http::LogglyClient;
use loggly_search::orchestrator::{FetchOrchestrator, FetchReport};
use loggly_search::page::Page;
use loggly_search::query::Query;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use crate::{Config, RECOMMENDED_MAX_CONCURRENCY};

/// Builds an orchestrator over the HTTP client described by `config`.
///
/// # Errors
///
/// Returns an error if credentials are missing or the client cannot be built.
pub fn orchestrator(config: &Config) -> Result<FetchOrchestrator> {
    let client = LogglyClient::new(&config.client_config()?).context("Failed to create Loggly client")?;
    Ok(FetchOrchestrator::new(Arc::new(client)))
}

/// Warns on stderr when `concurrency` is likely to hit rate limits.
pub fn warn_high_concurrency(concurrency: usize) {
    if concurrency > RECOMMENDED_MAX_CONCURRENCY {
        eprintln!(
            "{} concurrency {concurrency} is above {RECOMMENDED_MAX_CONCURRENCY}; Loggly may rate-limit the account",
            "warning:".yellow().bold()
        );
    }
}

/// Runs one fetch and hands each delivered page to `on_page` in order.
///
/// Both streams are drained together. The first error, or an error returned
/// by `on_page`, cancels the remaining work and is returned once in-flight
/// requests have settled.
///
/// # Errors
///
/// Returns the fetch error or the callback error.
pub async fn for_each_page<F>(
    orchestrator: &FetchOrchestrator,
    query: Query,
    concurrency: usize,
    cancel: &CancellationToken,
    mut on_page: F,
) -> Result<FetchReport>
where
    F: FnMut(Page) -> Result<()>,
{
    let mut streams = orchestrator.fetch(query, concurrency, cancel.clone());
    let mut failure: Option<anyhow::Error> = None;
    let mut pages_open = true;
    let mut errors_open = true;

    while failure.is_none() && (pages_open || errors_open) {
        tokio::select! {
            page = streams.pages.recv(), if pages_open => match page {
                Some(page) => {
                    if let Err(err) = on_page(page) {
                        failure = Some(err);
                    }
                }
                None => pages_open = false,
            },
            err = streams.errors.recv(), if errors_open => match err {
                Some(err) => failure = Some(err.into()),
                None => errors_open = false,
            },
        }
    }

    if failure.is_some() {
        cancel.cancel();
        drop(streams.pages);
    }

    let report = streams.report.await.context("Fetch task panicked")?;
    tracing::debug!(
        state = %report.state,
        pages_scheduled = report.pages_scheduled,
        pages_discarded = report.pages_discarded,
        "fetch complete"
    );

    match failure {
        Some(err) => Err(err),
        None => Ok(report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loggly_search::endpoint::SearchEndpoint;
    use loggly_test_utils::{SimulatedEndpoint, full_pages, pages_ending_short};

    fn simulated(endpoint: SimulatedEndpoint) -> (Arc<SimulatedEndpoint>, FetchOrchestrator) {
        let endpoint = Arc::new(endpoint);
        let shared: Arc<dyn SearchEndpoint> = endpoint.clone();
        (endpoint, FetchOrchestrator::new(shared))
    }

    #[tokio::test]
    async fn test_for_each_page_visits_pages_in_order() {
        let (_, orchestrator) = simulated(SimulatedEndpoint::new(pages_ending_short(3, 2, 1)));
        let mut seen = Vec::new();

        let report = for_each_page(
            &orchestrator,
            Query::new("*").size(2).max_pages(10),
            3,
            &CancellationToken::new(),
            |page| {
                seen.push(page.index);
                Ok(())
            },
        )
        .await
        .unwrap();

        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert!(!report.error_reported);
    }

    #[tokio::test]
    async fn test_for_each_page_surfaces_fetch_error() {
        let (_, orchestrator) =
            simulated(SimulatedEndpoint::new(full_pages(5, 2)).failing_at_page(1));

        let err = for_each_page(
            &orchestrator,
            Query::new("*").size(2).max_pages(4),
            1,
            &CancellationToken::new(),
            |_| Ok(()),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("fetching page 1 failed"), "got {err}");
    }

    #[tokio::test]
    async fn test_callback_error_cancels_fetch() {
        let (endpoint, orchestrator) = simulated(SimulatedEndpoint::new(full_pages(50, 2)));
        let cancel = CancellationToken::new();

        let err = for_each_page(
            &orchestrator,
            Query::new("*").size(2).max_pages(49),
            1,
            &cancel,
            |_| anyhow::bail!("stdout closed"),
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "stdout closed");
        assert!(cancel.is_cancelled());
        assert!(endpoint.fetch_count() < 50);
    }
}
