//! Shadow Ledger CLI
//!
//! Usage:
//!   shadow-ledger [--config <file>] demo [--storage-dir <dir>] [--grant-days <N>] [--output <file>]
//!   shadow-ledger month-index --timestamp <SECONDS>
//!   shadow-ledger cents --amount <DECIMAL>

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    shadow_ledger::cli::run().await
}
