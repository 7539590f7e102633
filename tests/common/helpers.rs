//! Helper functions for test assertions and common operations.

use shadow_ledger::*;

/// Creates a bill and returns its index, failing the test on rejection or busy
pub async fn create(client: &LedgerClient, amount: f64, category: &str, description: &str) -> u32 {
    client
        .bills()
        .create_bill(amount, category, description)
        .await
        .expect("bill creation failed")
        .expect("bill creation dropped as busy")
}

/// Decrypts a scope total, failing the test if no value came back
pub async fn decrypted_total(client: &LedgerClient, scope: &AggregateScope) -> u64 {
    client
        .decryption()
        .decrypt_scope(scope)
        .await
        .expect("decryption failed")
        .expect("no value returned")
}

/// Asserts that an error is `BillNotFound` for the given index and count
pub fn assert_bill_not_found(err: LedgerError, expected_index: u32, expected_count: u32) {
    match err {
        LedgerError::BillNotFound { index, count, .. } => {
            assert_eq!(index, expected_index, "index mismatch");
            assert_eq!(count, expected_count, "count mismatch");
        }
        other => panic!("expected BillNotFound but got {other:?}"),
    }
}
