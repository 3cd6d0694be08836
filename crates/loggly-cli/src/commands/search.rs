//! Search command - print matching events.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use loggly_search::analysis::parse_logmsg;
use owo_colors::OwoColorize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{for_each_page, orchestrator, warn_high_concurrency};
use crate::{Config, QueryArgs, join_filter};

/// Arguments for the search command.
#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Loggly search query.
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Print whole events instead of their parsed `logmsg`.
    #[arg(long, short = 'a')]
    pub all: bool,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub query_opts: QueryArgs,
}

/// How one event is printed.
#[derive(Debug, PartialEq)]
pub enum Rendered {
    /// A JSON line for stdout.
    Line(String),
    /// The event has no `logmsg`.
    MissingMessage,
    /// The `logmsg` is not valid JSON; carries the parse error.
    NotJson(String),
}

impl Rendered {
    /// Explains why an event was skipped, or `None` for a printable line.
    #[must_use]
    pub fn skip_reason(&self) -> Option<String> {
        match self {
            Self::Line(_) => None,
            Self::NotJson(err) => Some(format!("log message is not JSON: {err}")),
            Self::MissingMessage => Some("event has no log message".to_string()),
        }
    }
}

/// Renders one event as a compact JSON line.
#[must_use]
pub fn render_event(event: &Value, all: bool) -> Rendered {
    if all {
        return Rendered::Line(event.to_string());
    }
    match parse_logmsg(event) {
        Some(Ok(message)) => Rendered::Line(message.to_string()),
        Some(Err(err)) => Rendered::NotJson(err.to_string()),
        None => Rendered::MissingMessage,
    }
}

/// Execute the search command.
///
/// # Errors
///
/// Returns an error if configuration is incomplete, the fetch fails or is
/// cancelled, or stdout cannot be written.
pub async fn execute(args: SearchArgs, config: &Config, cancel: &CancellationToken) -> Result<()> {
    warn_high_concurrency(config.concurrency);
    let orchestrator = orchestrator(config)?;
    let query = args.query_opts.to_query(&join_filter(&args.query));

    let mut printed = 0_usize;
    let mut skipped = 0_usize;

    let fetched = for_each_page(&orchestrator, query, config.concurrency, cancel, |page| {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for event in &page.events {
            match render_event(event, args.all) {
                Rendered::Line(line) => {
                    writeln!(out, "{line}").context("Failed to write to stdout")?;
                    printed += 1;
                }
                unreadable => {
                    if skipped == 0 {
                        if let Some(detail) = unreadable.skip_reason() {
                            eprintln!(
                                "{} {detail}; use --all to print whole events",
                                "warning:".yellow().bold()
                            );
                        }
                    }
                    skipped += 1;
                }
            }
        }
        out.flush().context("Failed to write to stdout")
    })
    .await;

    if skipped > 0 {
        eprintln!(
            "{} skipped {skipped} events without a JSON log message",
            "warning:".yellow().bold()
        );
    }
    tracing::debug!(printed, skipped, "search finished");
    fetched?;
    Ok(())
}
