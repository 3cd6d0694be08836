//! Error types and result aliases for loggly-search.
//!
//! Remote failures are classified by where they happened: creating the search
//! session is fatal before any page is fetched, a failing page fetch is fatal to
//! the whole call, and cancellation is kept apart so callers can tell a user
//! abort from a remote failure.

/// The result type used throughout loggly-search.
pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while searching.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The search session could not be created. No pages were fetched.
    #[error("search session creation failed: {message}")]
    SessionCreation {
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// Fetching a page of events failed.
    #[error("fetching page {page} failed: {message}")]
    PageFetch {
        /// Index of the page that failed.
        page: u64,
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// The remote service answered with a non-success status.
    #[error("remote error ({status}): {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// The request could not be delivered or the response could not be read.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The remote service answered with a body we could not interpret.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// What was missing or malformed.
        message: String,
    },

    /// The query cannot be sent as configured.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Client configuration is incomplete or malformed.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },
}

impl Error {
    /// Wraps a remote failure raised while creating the search session.
    ///
    /// Cancellation passes through unchanged.
    #[must_use]
    pub fn session_creation(err: Self) -> Self {
        if err.is_cancelled() {
            return err;
        }
        Self::SessionCreation {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Wraps a remote failure raised while fetching page `page`.
    ///
    /// Cancellation passes through unchanged.
    #[must_use]
    pub fn page_fetch(page: u64, err: Self) -> Self {
        if err.is_cancelled() {
            return err;
        }
        Self::PageFetch {
            page,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Creates a new transport error with a source cause.
    #[must_use]
    pub fn transport(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns true if this error reports a caller-initiated abort.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the page index for page fetch failures.
    #[must_use]
    pub const fn failed_page(&self) -> Option<u64> {
        match self {
            Self::PageFetch { page, .. } => Some(*page),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn test_page_fetch_keeps_remote_cause() {
        let err = Error::page_fetch(
            4,
            Error::Remote {
                status: 429,
                message: "Too Many Requests".to_string(),
            },
        );

        assert_eq!(err.failed_page(), Some(4));
        assert_eq!(
            err.to_string(),
            "fetching page 4 failed: remote error (429): Too Many Requests"
        );
        let source = err.source().expect("source should be set");
        assert!(source.to_string().contains("429"));
    }

    #[test]
    fn test_cancellation_is_never_wrapped() {
        assert!(Error::session_creation(Error::Cancelled).is_cancelled());
        assert!(Error::page_fetch(1, Error::Cancelled).is_cancelled());
    }

    #[test]
    fn test_session_creation_message() {
        let err = Error::session_creation(Error::invalid_response("missing rsid.id"));
        assert!(matches!(err, Error::SessionCreation { .. }));
        assert_eq!(
            err.to_string(),
            "search session creation failed: invalid response: missing rsid.id"
        );
        assert_eq!(err.failed_page(), None);
    }
}
