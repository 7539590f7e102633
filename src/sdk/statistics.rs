//! Statistics Phase API - category breakdowns.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::LedgerClient;
use crate::{Bill, BillMeta, EncryptedHandle, LedgerError};

/// A bill as shown to its owner: public metadata plus the still-encrypted amount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillView {
    pub index: u32,
    pub amount_handle: EncryptedHandle,
    #[serde(flatten)]
    pub meta: BillMeta,
}

impl From<&Bill> for BillView {
    fn from(bill: &Bill) -> Self {
        Self {
            index: bill.index,
            amount_handle: bill.amount_handle,
            meta: bill.meta(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub cents: u64,
}

/// Categories in order of first appearance.
pub fn distinct_categories(bills: &[BillView]) -> Vec<String> {
    let mut seen = HashSet::new();
    bills
        .iter()
        .filter(|bill| seen.insert(bill.meta.category.as_str()))
        .map(|bill| bill.meta.category.clone())
        .collect()
}

pub struct StatisticsPhase<'a> {
    client: &'a LedgerClient,
}

impl<'a> StatisticsPhase<'a> {
    pub(crate) fn new(client: &'a LedgerClient) -> Self {
        Self { client }
    }

    /// Categories the current signer has used, in order of first use.
    pub fn categories(&self) -> Result<Vec<String>, LedgerError> {
        let bills = self.client.bills().refresh_bills()?;
        Ok(distinct_categories(&bills))
    }

    /// Decrypts the totals of `categories` in one batch.
    ///
    /// Categories whose total could not be resolved are left out, so the
    /// result is empty when a decryption is already in flight.
    #[instrument(level = "info", skip_all, fields(categories = categories.len()))]
    pub async fn decrypt_category_totals(
        &self,
        categories: &[String],
    ) -> Result<Vec<CategoryTotal>, LedgerError> {
        let owner = self.client.address();
        let handles: Vec<EncryptedHandle> = {
            let ledger = self.client.read_ledger()?;
            categories
                .iter()
                .map(|category| ledger.total_by_category(&owner, category))
                .collect()
        };

        let values = self.client.decryption().decrypt_bills(&handles).await?;
        Ok(categories
            .iter()
            .zip(&handles)
            .filter_map(|(category, handle)| {
                values.get(handle).map(|cents| CategoryTotal {
                    category: category.clone(),
                    cents: *cents,
                })
            })
            .collect())
    }
}
