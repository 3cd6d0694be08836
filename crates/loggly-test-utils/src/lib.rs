//! Shared test utilities for loggly-search.
//!
//! This crate provides:
//! - [`SimulatedEndpoint`]: scripted in-memory search endpoint with latency,
//!   fault injection and call recording
//! - [`FakeLogglyServer`]: in-process HTTP server speaking the search API
//! - Fixture builders for events and pages
//! - Assertion helpers for delivered page streams
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use loggly_test_utils::{SimulatedEndpoint, full_pages};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let endpoint = Arc::new(SimulatedEndpoint::new(full_pages(2, 10)));
//!     // ... run a fetch against the endpoint ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod fixtures;
pub mod http_server;
pub mod simulation;

pub use assertions::*;
pub use fixtures::*;
pub use http_server::*;
pub use simulation::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("loggly_search=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
