//! Workspace automation tasks.
//!
//! Run with: `cargo xtask <command>`

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

/// Inner attributes every library crate root must declare.
const REQUIRED_CRATE_ATTRIBUTES: &[&str] = &["#![forbid(unsafe_code)]", "#![deny(missing_docs)]"];

#[derive(Parser)]
#[command(name = "xtask", about = "loggly workspace automation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format check, clippy, tests, then `lint`
    Ci,
    /// Check workspace conventions
    Lint,
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Commands::Ci => run_ci(),
        Commands::Lint => run_lint(),
    }
}

fn run_ci() -> Result<()> {
    cargo(&["fmt", "--all", "--check"])?;
    cargo(&["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])?;
    cargo(&["test", "--workspace"])?;
    run_lint()
}

fn run_lint() -> Result<()> {
    for entry in fs::read_dir("crates").context("Failed to read crates/")? {
        let dir = entry?.path();
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        anyhow::ensure!(name.starts_with("loggly-"), "crates/{name}: expected a loggly-* name");

        let manifest = fs::read_to_string(dir.join("Cargo.toml"))
            .with_context(|| format!("crates/{name}: missing Cargo.toml"))?;
        anyhow::ensure!(
            inherits_workspace_lints(&manifest),
            "crates/{name}: Cargo.toml must set `[lints] workspace = true`"
        );

        let lib = dir.join("src").join("lib.rs");
        if lib.exists() {
            let missing = missing_crate_attributes(&lib)?;
            anyhow::ensure!(missing.is_empty(), "crates/{name}: src/lib.rs lacks {}", missing.join(", "));
        }
    }
    println!("workspace conventions ok");
    Ok(())
}

/// Returns the required attributes absent from the crate root's leading
/// inner-attribute block. Comments and blank lines in that block are skipped.
fn missing_crate_attributes(lib: &Path) -> Result<Vec<&'static str>> {
    let source = fs::read_to_string(lib).with_context(|| format!("Failed to read {}", lib.display()))?;
    let declared: Vec<&str> = source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//"))
        .take_while(|line| line.starts_with("#!["))
        .collect();

    Ok(REQUIRED_CRATE_ATTRIBUTES
        .iter()
        .copied()
        .filter(|required| !declared.contains(required))
        .collect())
}

fn inherits_workspace_lints(manifest: &str) -> bool {
    let mut in_lints = false;
    for line in manifest.lines().map(str::trim) {
        if line.starts_with('[') {
            in_lints = line == "[lints]";
        } else if in_lints && line.replace(' ', "") == "workspace=true" {
            return true;
        }
    }
    false
}

fn cargo(args: &[&str]) -> Result<()> {
    println!("$ cargo {}", args.join(" "));
    let status = Command::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("Failed to run cargo {}", args.join(" ")))?;
    anyhow::ensure!(status.success(), "cargo {} failed", args.join(" "));
    Ok(())
}
