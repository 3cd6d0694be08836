//! Count command - print the number of matching events.

use anyhow::Result;
use clap::Args;
use loggly_search::query::{DEFAULT_FROM, DEFAULT_UNTIL, Query};
use tokio_util::sync::CancellationToken;

use super::{for_each_page, orchestrator};
use crate::{Config, join_filter};

/// Arguments for the count command.
#[derive(Debug, Args)]
pub struct CountArgs {
    /// Loggly search query.
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Start of the time range.
    #[arg(long, default_value = DEFAULT_FROM, allow_hyphen_values = true)]
    pub from: String,

    /// End of the time range.
    #[arg(long, default_value = DEFAULT_UNTIL, allow_hyphen_values = true)]
    pub to: String,
}

impl CountArgs {
    /// Builds the single-event, single-page query whose reported total is the
    /// count.
    #[must_use]
    pub fn to_query(&self) -> Query {
        Query::new(join_filter(&self.query))
            .size(1)
            .max_pages(0)
            .from(self.from.clone())
            .to(self.to.clone())
    }
}

/// Execute the count command.
///
/// # Errors
///
/// Returns an error if configuration is incomplete or the fetch fails.
pub async fn execute(args: CountArgs, config: &Config, cancel: &CancellationToken) -> Result<()> {
    let orchestrator = orchestrator(config)?;

    let mut total = 0;
    for_each_page(&orchestrator, args.to_query(), 1, cancel, |page| {
        total = page.total_events;
        Ok(())
    })
    .await?;

    println!("{total}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_query_fetches_one_event() {
        use clap::Parser;

        #[derive(Parser)]
        struct TestCli {
            #[command(flatten)]
            args: CountArgs,
        }

        let cli = TestCli::parse_from(["test", "--from", "-7d", "json.status:500"]);
        let query = cli.args.to_query();
        assert_eq!(query.page_size(), 1);
        assert_eq!(query.max_pages_bound(), 0);
        assert_eq!(query.from_time(), "-7d");
        assert_eq!(query.until_time(), "now");
        assert_eq!(query.filter(), "json.status:500");
    }
}
