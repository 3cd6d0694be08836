//! Fields command - summarize fields of JSON log messages.

use anyhow::Result;
use clap::Args;
use loggly_search::analysis::{FieldStats, FieldSummary};
use owo_colors::OwoColorize;
use tabled::{Table, Tabled};
use tokio_util::sync::CancellationToken;

use super::{for_each_page, orchestrator, warn_high_concurrency};
use crate::{Config, QueryArgs, join_filter};

/// Arguments for the fields command.
#[derive(Debug, Args)]
pub struct FieldsArgs {
    /// Loggly search query.
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Show the most frequent values of this field instead of the field list.
    #[arg(long, short = 'v')]
    pub values: Option<String>,

    /// Maximum number of rows to print.
    #[arg(long, short = 'n', default_value = "50")]
    pub limit: usize,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub query_opts: QueryArgs,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    path: String,
    #[tabled(rename = "Occurrences")]
    occurrences: usize,
    #[tabled(rename = "Distinct")]
    distinct: usize,
}

impl From<FieldSummary> for FieldRow {
    fn from(summary: FieldSummary) -> Self {
        Self {
            path: summary.path,
            occurrences: summary.occurrences,
            distinct: summary.distinct_values,
        }
    }
}

#[derive(Tabled)]
struct ValueRow {
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Count")]
    count: usize,
}

/// Renders the field table, or `None` if no field was seen.
#[must_use]
pub fn field_table(stats: &FieldStats, limit: usize) -> Option<String> {
    let rows: Vec<FieldRow> = stats
        .summaries()
        .into_iter()
        .take(limit)
        .map(FieldRow::from)
        .collect();
    if rows.is_empty() {
        None
    } else {
        Some(Table::new(rows).to_string())
    }
}

/// Renders the value table for `path`, or `None` if the path has no values.
#[must_use]
pub fn value_table(stats: &FieldStats, path: &str, limit: usize) -> Option<String> {
    let rows: Vec<ValueRow> = stats
        .top_values(path)
        .into_iter()
        .take(limit)
        .map(|(value, count)| ValueRow { value, count })
        .collect();
    if rows.is_empty() {
        None
    } else {
        Some(Table::new(rows).to_string())
    }
}

/// Execute the fields command.
///
/// # Errors
///
/// Returns an error if configuration is incomplete or the fetch fails.
pub async fn execute(args: FieldsArgs, config: &Config, cancel: &CancellationToken) -> Result<()> {
    warn_high_concurrency(config.concurrency);
    let orchestrator = orchestrator(config)?;
    let query = args.query_opts.to_query(&join_filter(&args.query));

    let mut stats = FieldStats::new();
    for_each_page(&orchestrator, query, config.concurrency, cancel, |page| {
        stats.add_events(&page.events);
        Ok(())
    })
    .await?;

    println!(
        "{} messages analysed, {} skipped",
        stats.messages().bold(),
        stats.skipped().dimmed()
    );
    println!();

    let table = match &args.values {
        Some(path) => value_table(&stats, path, args.limit),
        None => field_table(&stats, args.limit),
    };
    match table {
        Some(table) => println!("{table}"),
        None => println!("No fields found"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loggly_test_utils::{logmsg_event, plain_event};
    use serde_json::json;

    fn stats() -> FieldStats {
        let events = vec![
            logmsg_event(&json!({ "level": "error", "http": { "status": 500 } })),
            logmsg_event(&json!({ "level": "info" })),
            logmsg_event(&json!({ "level": "error" })),
            plain_event("boot"),
        ];
        let mut stats = FieldStats::new();
        stats.add_events(&events);
        stats
    }

    #[test]
    fn test_field_table_lists_most_frequent_first() {
        let table = field_table(&stats(), 50).unwrap();
        let level = table.find("level").unwrap();
        let http = table.find("http.status").unwrap();
        assert!(level < http);
        assert!(table.contains("Occurrences"));
    }

    #[test]
    fn test_field_table_honours_limit() {
        let table = field_table(&stats(), 1).unwrap();
        assert!(table.contains("level"));
        assert!(!table.contains("http"));
    }

    #[test]
    fn test_value_table() {
        let table = value_table(&stats(), "level", 10).unwrap();
        assert!(table.find("error").unwrap() < table.find("info").unwrap());
        assert!(value_table(&stats(), "missing", 10).is_none());
    }

    #[test]
    fn test_empty_stats_have_no_table() {
        assert!(field_table(&FieldStats::new(), 10).is_none());
    }
}
