//! Command-line interface for the shadow ledger.
//!
//! - [`commands`]: Command definitions using `clap` (argument parsing)
//! - `handlers`: Logic for each command
//! - [`output`]: JSON output and human-readable summaries
//!
//! # Available Commands
//!
//! - `demo`: two owners record bills on an in-process ledger and decrypt
//!   their bills and totals
//! - `month-index`: 30-day bucket of a timestamp
//! - `cents`: decimal amount to integer cents
//!
//! ```bash
//! cargo run --bin shadow-ledger -- demo
//! cargo run --bin shadow-ledger -- --config client.json demo --storage-dir grants/
//! RUST_LOG=shadow_ledger=debug cargo run --bin shadow-ledger -- demo -o report.json
//! ```

pub mod commands;
mod handlers;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use commands::Cli;
use tracing_subscriber::EnvFilter;

use crate::config::ClientConfig;

/// Run the CLI application.
///
/// Parses arguments, loads the config (explicit `--config`, else
/// `shadow-ledger.json` in the working directory, else defaults), installs
/// the log subscriber and dispatches to the handler.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match cli.config.or_else(default_config_path) {
        Some(path) => ClientConfig::load(&path)?,
        None => ClientConfig::default(),
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    handlers::execute(cli.command, config).await
}

fn default_config_path() -> Option<PathBuf> {
    let path = PathBuf::from("shadow-ledger.json");
    path.exists().then_some(path)
}
