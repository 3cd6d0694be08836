//! Fixture builders for events and pages.

use serde_json::{Value, json};

/// Builds a Loggly-shaped event whose `logmsg` is the JSON encoding of `message`.
pub fn logmsg_event(message: &Value) -> Value {
    json!({
        "id": format!("evt-{}", message.get("n").and_then(Value::as_u64).unwrap_or_default()),
        "timestamp": 1_700_000_000_000_u64,
        "logmsg": message.to_string(),
        "tags": ["test"],
    })
}

/// Builds an event with a plain-text (non-JSON) `logmsg`.
pub fn plain_event(text: &str) -> Value {
    json!({ "id": "evt-plain", "timestamp": 1_700_000_000_000_u64, "logmsg": text })
}

/// Builds `count` numbered events starting at `start`.
///
/// Each message is `{"n": k, "level": "error"|"info"}` so ordering can be
/// checked after delivery.
pub fn numbered_events(start: u64, count: u64) -> Vec<Value> {
    (start..start + count)
        .map(|n| {
            let level = if n % 3 == 0 { "error" } else { "info" };
            logmsg_event(&json!({ "n": n, "level": level }))
        })
        .collect()
}

/// Builds `pages` full pages of `page_size` numbered events each.
pub fn full_pages(pages: u64, page_size: u64) -> Vec<Vec<Value>> {
    (0..pages)
        .map(|p| numbered_events(p * page_size, page_size))
        .collect()
}

/// Builds `full` full pages followed by one short page of `short_len` events.
pub fn pages_ending_short(full: u64, page_size: u64, short_len: u64) -> Vec<Vec<Value>> {
    assert!(short_len < page_size, "short page must hold fewer than page_size events");
    let mut pages = full_pages(full, page_size);
    pages.push(numbered_events(full * page_size, short_len));
    pages
}

/// Extracts the `n` of each numbered event, in order.
pub fn event_numbers<'a>(events: impl IntoIterator<Item = &'a Value>) -> Vec<u64> {
    events
        .into_iter()
        .filter_map(|event| event.get("logmsg").and_then(Value::as_str))
        .filter_map(|msg| serde_json::from_str::<Value>(msg).ok())
        .filter_map(|msg| msg.get("n").and_then(Value::as_u64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_ending_short_shape() {
        let pages = pages_ending_short(2, 3, 1);
        let lens: Vec<_> = pages.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![3, 3, 1]);
        assert_eq!(event_numbers(pages.iter().flatten()), (0..7).collect::<Vec<_>>());
    }
}
