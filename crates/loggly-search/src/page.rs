//! Fetched result pages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of search results.
///
/// `total_events` is whatever the service reported for this request. It is
/// not stable across pages and is never used to decide when to stop fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Zero-based page index.
    pub index: u64,
    /// Total event count reported alongside this page.
    pub total_events: u64,
    /// Events in service order.
    pub events: Vec<Value>,
}

impl Page {
    /// Creates a page.
    #[must_use]
    pub const fn new(index: u64, total_events: u64, events: Vec<Value>) -> Self {
        Self {
            index,
            total_events,
            events,
        }
    }

    /// Returns the number of events on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the page carries no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns true if this page holds fewer events than were requested.
    ///
    /// A short page marks the end of the result set. When the last page holds
    /// exactly `page_size` events this cannot be detected, and one further
    /// (empty) page is fetched before stopping.
    #[must_use]
    pub fn is_short(&self, page_size: u32) -> bool {
        self.events.len() < page_size as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_page_detection() {
        let full = Page::new(0, 10, vec![json!({"a": 1}), json!({"a": 2})]);
        assert!(!full.is_short(2));
        assert!(full.is_short(3));

        let empty = Page::new(1, 10, Vec::new());
        assert!(empty.is_empty());
        assert!(empty.is_short(1));
    }
}
