//! Command-line argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shadow-ledger")]
#[command(about = "Shadow Ledger - Confidential bill ledger CLI", long_about = None)]
pub struct Cli {
    /// Client config file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the two-owner scenario against the in-process coprocessor
    Demo {
        /// Directory for persisted grants (overrides config)
        #[arg(long)]
        storage_dir: Option<PathBuf>,

        /// Grant validity in days (overrides config)
        #[arg(long)]
        grant_days: Option<u64>,

        /// Output file (JSON)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Print the 30-day bucket index of a Unix timestamp
    MonthIndex {
        /// Unix timestamp in seconds
        #[arg(long)]
        timestamp: u64,
    },

    /// Convert a decimal amount to integer cents
    Cents {
        /// Amount in currency units, e.g. 12.50
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,
    },
}
