//! Field statistics over fetched events.
//!
//! Loggly stores the original JSON log line as a string in the event's
//! `logmsg` field. [`FieldStats`] parses those messages and counts, per dotted
//! field path, how often the field appears and which values it takes.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

/// Name of the event field holding the raw log message.
pub const LOGMSG_FIELD: &str = "logmsg";

/// Parses the `logmsg` of an event as a JSON value.
///
/// Returns `None` if the event has no string `logmsg`.
///
/// # Errors
///
/// Returns the JSON error if the message is not valid JSON.
pub fn parse_logmsg(event: &Value) -> Option<Result<Value, serde_json::Error>> {
    event
        .get(LOGMSG_FIELD)
        .and_then(Value::as_str)
        .map(serde_json::from_str)
}

/// Summary of one field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSummary {
    /// Dotted path, e.g. `http.status`.
    pub path: String,
    /// Number of messages containing the path.
    pub occurrences: usize,
    /// Number of distinct leaf values seen at the path (zero for objects).
    pub distinct_values: usize,
}

/// Occurrence and value counts keyed by field path.
#[derive(Debug, Default, Clone)]
pub struct FieldStats {
    occurrences: BTreeMap<String, usize>,
    values: BTreeMap<String, HashMap<String, usize>>,
    messages: usize,
    skipped: usize,
}

impl FieldStats {
    /// Creates empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every event of a page whose `logmsg` is a JSON object. Other
    /// events are counted as skipped.
    pub fn add_events<'a>(&mut self, events: impl IntoIterator<Item = &'a Value>) {
        for event in events {
            match parse_logmsg(event) {
                Some(Ok(Value::Object(map))) => self.add_object(&map),
                _ => self.skipped += 1,
            }
        }
    }

    /// Adds one parsed message.
    pub fn add_object(&mut self, object: &Map<String, Value>) {
        self.messages += 1;
        self.walk(object, "");
    }

    fn walk(&mut self, object: &Map<String, Value>, prefix: &str) {
        for (key, value) in object {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            *self.occurrences.entry(path.clone()).or_default() += 1;

            if let Value::Object(nested) = value {
                self.walk(nested, &path);
            } else {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                *self
                    .values
                    .entry(path)
                    .or_default()
                    .entry(rendered)
                    .or_default() += 1;
            }
        }
    }

    /// Returns the number of messages analysed.
    #[must_use]
    pub const fn messages(&self) -> usize {
        self.messages
    }

    /// Returns the number of events without a JSON object `logmsg`.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Returns field summaries, most frequent first, ties by path.
    #[must_use]
    pub fn summaries(&self) -> Vec<FieldSummary> {
        let mut out: Vec<_> = self
            .occurrences
            .iter()
            .map(|(path, &occurrences)| FieldSummary {
                path: path.clone(),
                occurrences,
                distinct_values: self.values.get(path).map_or(0, HashMap::len),
            })
            .collect();
        out.sort_by(|a, b| b.occurrences.cmp(&a.occurrences).then_with(|| a.path.cmp(&b.path)));
        out
    }

    /// Returns the values seen at `path` with their counts, most frequent first.
    #[must_use]
    pub fn top_values(&self, path: &str) -> Vec<(String, usize)> {
        let mut out: Vec<_> = self
            .values
            .get(path)
            .map(|values| values.iter().map(|(v, &n)| (v.clone(), n)).collect())
            .unwrap_or_default();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }
}
