//! Search query configuration.
//!
//! A [`Query`] is built once and handed to the fetch orchestrator by value; it is
//! never mutated afterwards. Time bounds are passed through untouched in
//! Loggly's relative time syntax (`-24h`, `now`, ...).

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default start of the search window.
pub const DEFAULT_FROM: &str = "-24h";
/// Default end of the search window.
pub const DEFAULT_UNTIL: &str = "now";
/// Default number of events requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Ordering of events in the result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    /// Oldest events first.
    Asc,
    /// Newest events first.
    #[default]
    Desc,
}

impl Order {
    /// Returns the wire value for this ordering.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Order {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(Error::InvalidQuery(format!(
                "unknown order '{other}', expected 'asc' or 'desc'"
            ))),
        }
    }
}

/// Configuration for one search.
///
/// # Example
///
/// ```rust
/// use loggly_search::query::Query;
///
/// let query = Query::new("json.level:error")
///     .size(50)
///     .from("-1h")
///     .max_pages(4);
///
/// assert_eq!(query.page_size(), 50);
/// assert_eq!(query.max_pages_bound(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    filter: String,
    from: String,
    until: String,
    order: Order,
    size: u32,
    max_pages: u64,
}

impl Query {
    /// Creates a query for `filter` with default window, ordering and page size.
    #[must_use]
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            from: DEFAULT_FROM.to_string(),
            until: DEFAULT_UNTIL.to_string(),
            order: Order::Desc,
            size: DEFAULT_PAGE_SIZE,
            max_pages: 0,
        }
    }

    /// Sets the number of events requested per page.
    #[must_use]
    pub const fn size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Sets the start of the search window.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    /// Sets the end of the search window.
    #[must_use]
    pub fn until(mut self, until: impl Into<String>) -> Self {
        self.until = until.into();
        self
    }

    /// Alias for [`Query::until`].
    #[must_use]
    pub fn to(self, until: impl Into<String>) -> Self {
        self.until(until)
    }

    /// Sets the event ordering.
    #[must_use]
    pub const fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Sets the highest page index that may be fetched (inclusive).
    #[must_use]
    pub const fn max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Returns the filter expression.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Returns the start of the search window.
    #[must_use]
    pub fn from_time(&self) -> &str {
        &self.from
    }

    /// Returns the end of the search window.
    #[must_use]
    pub fn until_time(&self) -> &str {
        &self.until
    }

    /// Returns the event ordering.
    #[must_use]
    pub const fn ordering(&self) -> Order {
        self.order
    }

    /// Returns the number of events requested per page.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.size
    }

    /// Returns the inclusive upper bound on the page index.
    #[must_use]
    pub const fn max_pages_bound(&self) -> u64 {
        self.max_pages
    }

    /// Returns how many pages may be fetched at most (`max_pages + 1`).
    #[must_use]
    pub const fn page_budget(&self) -> u64 {
        self.max_pages.saturating_add(1)
    }

    /// Checks that the query can be sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuery`] if the page size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::InvalidQuery("page size must be at least 1".into()));
        }
        Ok(())
    }

    /// Encodes the query for the search creation call.
    ///
    /// Keys are emitted in sorted order so the same query always encodes to the
    /// same string.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let size = self.size.to_string();
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("from", &self.from)
            .append_pair("order", self.order.as_str())
            .append_pair("q", &self.filter)
            .append_pair("size", &size)
            .append_pair("until", &self.until)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let query = Query::new("error");
        assert_eq!(query.filter(), "error");
        assert_eq!(query.from_time(), "-24h");
        assert_eq!(query.until_time(), "now");
        assert_eq!(query.ordering(), Order::Desc);
        assert_eq!(query.page_size(), 100);
        assert_eq!(query.max_pages_bound(), 0);
        assert_eq!(query.page_budget(), 1);
    }

    #[test]
    fn test_query_string_is_sorted_and_escaped() {
        let query = Query::new("json.level:error AND \"upload failed\"")
            .size(2)
            .from("-1h")
            .to("now")
            .order(Order::Asc);

        assert_eq!(
            query.to_query_string(),
            "from=-1h&order=asc&q=json.level%3Aerror+AND+%22upload+failed%22&size=2&until=now"
        );
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let err = Query::new("x").size(0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
        assert!(Query::new("x").size(1).validate().is_ok());
    }

    #[test]
    fn test_order_parsing() {
        assert_eq!("ASC".parse::<Order>().unwrap(), Order::Asc);
        assert_eq!("desc".parse::<Order>().unwrap(), Order::Desc);
        assert!("sideways".parse::<Order>().is_err());
    }

    #[test]
    fn test_page_budget_saturates() {
        assert_eq!(Query::new("x").max_pages(u64::MAX).page_budget(), u64::MAX);
    }
}
