//! # loggly-cli
//!
//! Command-line interface for searching Loggly.
//!
//! ## Commands
//!
//! - `loggly search` - Print matching events, one JSON document per line
//! - `loggly count` - Print the number of matching events
//! - `loggly fields` - Summarize the fields of matching JSON log messages
//!
//! ## Configuration
//!
//! The CLI uses environment variables or command-line flags for settings:
//!
//! - `LOGGLY_ACCOUNT` - Loggly account (subdomain)
//! - `LOGGLY_TOKEN` - API token
//! - `LOGGLY_BASE_URL` - API root override (default: `https://{account}.loggly.com/apiv2`)

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;
pub mod signals;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use loggly_search::endpoint::http::ClientConfig;
use loggly_search::observability::LogFormat;
use loggly_search::orchestrator::DEFAULT_CONCURRENCY;
use loggly_search::query::{DEFAULT_FROM, DEFAULT_PAGE_SIZE, DEFAULT_UNTIL, Order, Query};

/// Concurrency above which Loggly tends to rate-limit the account.
pub const RECOMMENDED_MAX_CONCURRENCY: usize = 3;

/// Pages fetched after the first one unless `--max-pages` says otherwise.
pub const DEFAULT_MAX_PAGES: u64 = 3;

/// Loggly CLI - search logs from the command line.
#[derive(Debug, Parser)]
#[command(name = "loggly")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Loggly account name.
    #[arg(long, env = "LOGGLY_ACCOUNT")]
    pub account: Option<String>,

    /// API token.
    #[arg(long, env = "LOGGLY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// API root override.
    #[arg(long, env = "LOGGLY_BASE_URL")]
    pub base_url: Option<String>,

    /// Number of pages fetched in parallel.
    #[arg(long, short = 'c', default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Log output format (logs go to stderr).
    #[arg(long, value_enum, default_value = "pretty")]
    pub log_format: LogFormatArg,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            account: self.account.clone(),
            token: self.token.clone(),
            base_url: self.base_url.clone(),
            concurrency: self.concurrency,
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print matching events.
    Search(commands::search::SearchArgs),
    /// Print the number of matching events.
    Count(commands::count::CountArgs),
    /// Summarize fields of matching JSON log messages.
    Fields(commands::fields::FieldsArgs),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable logs.
    #[default]
    Pretty,
    /// JSON logs.
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// Search options shared by commands that page through results.
#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Events per page.
    #[arg(long, short = 's', default_value_t = DEFAULT_PAGE_SIZE)]
    pub size: u32,

    /// Start of the time range.
    #[arg(long, default_value = DEFAULT_FROM, allow_hyphen_values = true)]
    pub from: String,

    /// End of the time range.
    #[arg(long, default_value = DEFAULT_UNTIL, allow_hyphen_values = true)]
    pub to: String,

    /// Highest page index to fetch (0 fetches only the first page).
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    pub max_pages: u64,

    /// Event ordering (`asc` or `desc`).
    #[arg(long, default_value = "desc")]
    pub order: Order,
}

impl QueryArgs {
    /// Builds the query for `filter`.
    #[must_use]
    pub fn to_query(&self, filter: &str) -> Query {
        Query::new(filter)
            .size(self.size)
            .from(self.from.clone())
            .to(self.to.clone())
            .max_pages(self.max_pages)
            .order(self.order)
    }
}

/// Joins positional query words into one Loggly filter.
#[must_use]
pub fn join_filter(words: &[String]) -> String {
    words.join(" ")
}

/// CLI configuration.
#[derive(Clone, Default)]
pub struct Config {
    /// Loggly account name.
    pub account: Option<String>,
    /// API token.
    pub token: Option<String>,
    /// API root override.
    pub base_url: Option<String>,
    /// Number of pages fetched in parallel.
    pub concurrency: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("account", &self.account)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl Config {
    /// Builds the HTTP client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the account or token is missing.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let account = self
            .account
            .as_ref()
            .context("Account is required. Set LOGGLY_ACCOUNT or use --account")?;
        let token = self
            .token
            .as_ref()
            .context("Token is required. Set LOGGLY_TOKEN or use --token")?;

        let mut client = ClientConfig::new(account.clone(), token.clone());
        if let Some(base_url) = &self.base_url {
            client = client.with_base_url(base_url.clone());
        }
        Ok(client)
    }
}
