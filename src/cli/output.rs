//! Output formatting and file I/O utilities for CLI.
//!
//! Machine-readable JSON goes to stdout (or a file); the human summary goes
//! to stderr so the two can be piped separately.

use std::fs;
use std::path::Path;

use super::handlers::DemoReport;
use crate::sdk::format_cents;

/// Print JSON to stdout with pretty formatting, or write to file if path provided
pub fn output_json<T: serde::Serialize>(
    data: &T,
    path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(data)?;
    match path {
        Some(output_path) => {
            if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(output_path, json)?;
            eprintln!("✓ Report written to {}", output_path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub(crate) fn print_report(report: &DemoReport) {
    eprintln!("========================================");
    eprintln!("      Shadow Ledger Demo");
    eprintln!("========================================\n");
    eprintln!("Ledger {}\n", report.ledger);
    for owner in &report.owners {
        eprintln!("Owner {}", owner.address);
        for bill in &owner.bills {
            eprintln!(
                "  #{} {:<10} {:<10} {}",
                bill.bill.index,
                bill.bill.meta.category,
                bill.bill.meta.description,
                bill.amount.as_deref().unwrap_or("<encrypted>")
            );
        }
        for total in &owner.category_totals {
            eprintln!("  {} total: {}", total.category, format_cents(total.cents));
        }
        eprintln!(
            "  Overall total: {}\n",
            owner.total.as_deref().unwrap_or("<encrypted>")
        );
    }
    eprintln!("  ✓ {} oracle round trips", report.oracle_round_trips);
}
