//! Custom assertion helpers for fetch tests.

use loggly_search::page::Page;

use crate::fixtures::event_numbers;

/// Asserts that pages carry indices `0, 1, 2, ...` with no gaps or repeats.
///
/// # Panics
///
/// Panics if any page is out of place.
pub fn assert_pages_in_order(pages: &[Page]) {
    for (position, page) in pages.iter().enumerate() {
        assert_eq!(
            page.index, position as u64,
            "page at position {position} has index {}, expected {position}",
            page.index
        );
    }
}

/// Asserts that the delivered pages are exactly indices `0..count`.
///
/// # Panics
///
/// Panics if the page count differs or the pages are out of order.
pub fn assert_delivered_prefix(pages: &[Page], count: usize) {
    assert_eq!(
        pages.len(),
        count,
        "expected {count} delivered pages, got indices {:?}",
        pages.iter().map(|p| p.index).collect::<Vec<_>>()
    );
    assert_pages_in_order(pages);
}

/// Asserts that numbered events across all pages are consecutive from zero.
///
/// # Panics
///
/// Panics if any event is missing, repeated or out of order.
pub fn assert_events_consecutive(pages: &[Page]) {
    let numbers = event_numbers(pages.iter().flat_map(|p| p.events.iter()));
    let expected: Vec<u64> = (0..numbers.len() as u64).collect();
    assert_eq!(numbers, expected, "events are not consecutive");
}
