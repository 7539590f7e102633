//! Command handlers for the Shadow Ledger CLI.
//!
//! Each match arm implements the logic for one command.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::auth::{GrantManager, LocalSigner};
use crate::config::ClientConfig;
use crate::core::clock::{Clock, SystemClock};
use crate::engine::InMemoryCoprocessor;
use crate::ledger::{month_index, ShadowLedger, SharedLedger};
use crate::sdk::{amount_to_cents, format_cents, BillView, CategoryTotal, LedgerClient};
use crate::{Address, LedgerAddress};

use super::commands::Commands;
use super::output::{output_json, print_report};

#[derive(Serialize)]
pub(crate) struct DemoReport {
    pub ledger: LedgerAddress,
    pub owners: Vec<OwnerReport>,
    pub oracle_round_trips: usize,
}

#[derive(Serialize)]
pub(crate) struct OwnerReport {
    pub address: Address,
    pub bills: Vec<DecryptedBill>,
    pub total: Option<String>,
    pub category_totals: Vec<CategoryTotal>,
    pub month_total: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct DecryptedBill {
    #[serde(flatten)]
    pub bill: BillView,
    pub amount: Option<String>,
}

/// Execute a CLI command.
///
/// This function dispatches to the appropriate handler based on the command type.
pub async fn execute(
    command: Commands,
    mut config: ClientConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Demo {
            storage_dir,
            grant_days,
            output,
        } => {
            if storage_dir.is_some() {
                config.storage_dir = storage_dir;
            }
            if let Some(days) = grant_days {
                config.grant_duration_days = days;
            }
            config.validate()?;
            let report = run_demo(&config).await?;
            print_report(&report);
            output_json(&report, output.as_deref())?;
        }

        Commands::MonthIndex { timestamp } => {
            println!("{}", month_index(timestamp));
        }

        Commands::Cents { amount } => {
            let cents = amount_to_cents(amount)?;
            println!("{cents} ({})", format_cents(cents));
        }
    }

    Ok(())
}

async fn run_demo(config: &ClientConfig) -> Result<DemoReport, Box<dyn std::error::Error>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = Arc::new(InMemoryCoprocessor::new(clock.clone()));
    let ledger =
        ShadowLedger::new(config.ledger_address, engine.clone(), clock.clone()).shared();
    let grants = Arc::new(GrantManager::new(
        config.grant_store(),
        clock.clone(),
        config.grant_duration_days,
    )?);
    info!(ledger = %config.ledger_address, persisted = config.storage_dir.is_some(), "demo ledger ready");

    let client_for = |ledger: &SharedLedger| {
        LedgerClient::new(
            ledger.clone(),
            engine.clone(),
            engine.clone(),
            Arc::new(LocalSigner::random()),
            grants.clone(),
            config.chain_id,
        )
    };
    let alice = client_for(&ledger)?;
    let bob = client_for(&ledger)?;

    alice.bills().create_bill(100.0, "Food", "Lunch").await?;
    alice.bills().create_bill(75.0, "Food", "Dinner").await?;
    bob.bills().create_bill(200.0, "Shopping", "TV").await?;

    let now = clock.now();
    let mut owners = Vec::new();
    for client in [&alice, &bob] {
        owners.push(owner_report(client, month_index(now)).await?);
    }

    Ok(DemoReport {
        ledger: config.ledger_address,
        owners,
        oracle_round_trips: engine.decrypt_calls(),
    })
}

async fn owner_report(
    client: &LedgerClient,
    month: u64,
) -> Result<OwnerReport, Box<dyn std::error::Error>> {
    let bills = client.bills().refresh_bills()?;
    let handles: Vec<_> = bills.iter().map(|bill| bill.amount_handle).collect();
    let values = client.decryption().decrypt_bills(&handles).await?;
    let categories = client.statistics().categories()?;

    Ok(OwnerReport {
        address: client.address(),
        bills: bills
            .into_iter()
            .map(|bill| DecryptedBill {
                amount: values.get(&bill.amount_handle).copied().map(format_cents),
                bill,
            })
            .collect(),
        total: client.decryption().decrypt_total().await?.map(format_cents),
        category_totals: client
            .statistics()
            .decrypt_category_totals(&categories)
            .await?,
        month_total: client
            .decryption()
            .decrypt_month_total(month)
            .await?
            .map(format_cents),
    })
}
