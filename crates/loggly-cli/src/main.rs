//! Loggly CLI - search Loggly from the command line.
//!
//! The main entry point for the `loggly` CLI binary.

use anyhow::{Context, Result};
use clap::Parser;
use loggly_search::observability::init_logging;
use tokio_util::sync::CancellationToken;

use loggly_cli::signals::cancel_on_shutdown;
use loggly_cli::{Cli, Commands};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    let config = cli.config();

    // Logs go to stderr; stdout carries results only
    init_logging(cli.log_format.into(), "warn");

    // Create runtime and execute
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let cancel = CancellationToken::new();
        cancel_on_shutdown(cancel.clone()).context("Failed to install signal handlers")?;

        match cli.command {
            Commands::Search(args) => loggly_cli::commands::search::execute(args, &config, &cancel).await,
            Commands::Count(args) => loggly_cli::commands::count::execute(args, &config, &cancel).await,
            Commands::Fields(args) => loggly_cli::commands::fields::execute(args, &config, &cancel).await,
        }
    })
}
