//! Logging setup and span helpers.
//!
//! Logs go to stderr so stdout stays reserved for fetched events.

use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs.
    Json,
    /// Human-readable compact logs.
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// `default_directive` is used when `RUST_LOG` is unset. Safe to call multiple
/// times; subsequent calls are no-ops.
///
/// # Example
///
/// ```rust
/// use loggly_search::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty, "warn");
/// ```
pub fn init_logging(format: LogFormat, default_directive: &str) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));

        match format {
            LogFormat::Json => {
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json().with_writer(std::io::stderr))
                    .try_init();
            }
            LogFormat::Pretty => {
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(
                        fmt::layer()
                            .with_target(false)
                            .with_writer(std::io::stderr),
                    )
                    .try_init();
            }
        }
    });
}

/// Creates the span covering one fetch call.
#[must_use]
pub fn fetch_span(filter: &str, max_pages: u64, concurrency: usize) -> Span {
    tracing::info_span!(
        "fetch",
        filter = filter,
        max_pages = max_pages,
        concurrency = concurrency,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty, "warn");
        init_logging(LogFormat::Json, "debug");
    }

    #[test]
    fn test_fetch_span_creates_span() {
        let span = fetch_span("json.level:error", 3, 2);
        let _guard = span.enter();
        tracing::info!("inside fetch span");
    }
}
