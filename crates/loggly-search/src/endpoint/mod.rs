//! Remote search endpoint abstraction.
//!
//! This module provides:
//!
//! - [`SearchEndpoint`]: the two remote operations a search needs
//! - [`SessionHandle`]: identifier binding page requests to one search
//! - [`EventsPage`]: one page as returned by the service
//! - [`http::LogglyClient`]: the reqwest-backed implementation
//!
//! Implementations should honour the cancellation token inside the remote call.
//! If they do not, cancellation only takes effect once the call returns.

pub mod http;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Opaque identifier returned by the service after search creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Wraps a service-issued identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of an events response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsPage {
    /// Total events the service reports for the search.
    #[serde(default)]
    pub total_events: u64,
    /// Page index echoed by the service.
    #[serde(default)]
    pub page: u64,
    /// Raw event records.
    #[serde(default)]
    pub events: Vec<Value>,
}

/// The remote search service.
#[async_trait]
pub trait SearchEndpoint: Send + Sync {
    /// Creates a search from an encoded query string and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the service rejects it, the
    /// response lacks a session identifier, or `cancel` fires.
    async fn create_search(
        &self,
        query_string: &str,
        cancel: &CancellationToken,
    ) -> Result<SessionHandle>;

    /// Fetches one page of events for a previously created search.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the service rejects it, the
    /// response cannot be decoded, or `cancel` fires.
    async fn fetch_events_page(
        &self,
        session: &SessionHandle,
        page: u64,
        cancel: &CancellationToken,
    ) -> Result<EventsPage>;
}
