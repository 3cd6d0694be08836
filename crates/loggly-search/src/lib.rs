//! # loggly-search
//!
//! Concurrent, order-preserving retrieval of Loggly search results.
//!
//! Loggly searches take two steps: create a search, then page through its
//! results. This crate fetches several pages at once while still handing them to
//! the caller strictly in page order:
//!
//! - **Query**: immutable search configuration and its wire encoding
//! - **Endpoint**: the two remote operations, plus a reqwest implementation
//! - **Limiter**: bounded concurrency for page requests
//! - **Ordered buffer**: reassembles out-of-order completions
//! - **Orchestrator**: session creation, scheduling, termination, cancellation
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use loggly_search::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> loggly_search::Result<()> {
//! let client = LogglyClient::new(&ClientConfig::new("acme", "token"))?;
//! let orchestrator = FetchOrchestrator::new(Arc::new(client));
//! let query = Query::new("json.level:error").size(100).max_pages(3);
//!
//! let collected = orchestrator
//!     .fetch(query, 3, CancellationToken::new())
//!     .collect()
//!     .await;
//! if let Some(err) = collected.error {
//!     return Err(err);
//! }
//! for page in collected.pages {
//!     println!("page {} has {} events", page.index, page.len());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod analysis;
pub mod endpoint;
pub mod error;
pub mod limiter;
pub mod observability;
pub mod orchestrator;
pub mod ordered_buffer;
pub mod page;
pub mod query;
pub mod session;

pub use error::{Error, Result};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::endpoint::http::{ClientConfig, LogglyClient};
    pub use crate::endpoint::{EventsPage, SearchEndpoint, SessionHandle};
    pub use crate::error::{Error, Result};
    pub use crate::limiter::{ConcurrencyLimiter, SlotPermit};
    pub use crate::orchestrator::{
        Collected, DEFAULT_CONCURRENCY, FetchOrchestrator, FetchReport, FetchState, FetchStreams,
    };
    pub use crate::ordered_buffer::OrderedBuffer;
    pub use crate::page::Page;
    pub use crate::query::{Order, Query};
    pub use crate::session::{FetchedPage, SearchSession};
}
