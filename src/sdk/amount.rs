//! Decimal amount handling.
//!
//! Amounts are entered as decimal currency and stored encrypted as integer
//! cents. The upper bound keeps every value exactly representable in an IEEE
//! double so UIs can round-trip it.

use crate::constants::MAX_SAFE_CENTS;
use crate::LedgerError;

/// Converts a decimal amount to whole cents, rounding half away from zero.
///
/// # Errors
///
/// Returns `LedgerError::InvalidInput` if the amount is not finite, rounds to
/// zero or less, or exceeds `MAX_SAFE_CENTS` cents.
pub fn amount_to_cents(amount: f64) -> Result<u64, LedgerError> {
    if !amount.is_finite() {
        return Err(LedgerError::InvalidInput(format!(
            "amount {amount} is not a number"
        )));
    }
    let cents = (amount * 100.0).round();
    if cents <= 0.0 {
        return Err(LedgerError::InvalidInput(format!(
            "amount {amount} must be greater than zero"
        )));
    }
    if cents > MAX_SAFE_CENTS as f64 {
        return Err(LedgerError::InvalidInput(format!(
            "amount {amount} exceeds the maximum of {MAX_SAFE_CENTS} cents"
        )));
    }
    Ok(cents as u64)
}

/// Renders cents as a two-decimal string, e.g. `12345` as `"123.45"`.
pub fn format_cents(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rounds_to_nearest_cent() {
        assert_eq!(amount_to_cents(12.34).unwrap(), 1234);
        assert_eq!(amount_to_cents(19.999).unwrap(), 2000);
        assert_eq!(amount_to_cents(0.005).unwrap(), 1);
        assert_eq!(amount_to_cents(100.0).unwrap(), 10_000);
    }

    #[test]
    fn rejects_non_positive_and_oversized() {
        for bad in [0.0, -1.0, 0.004, f64::NAN, f64::INFINITY] {
            assert!(amount_to_cents(bad).is_err(), "{bad} accepted");
        }
        assert!(amount_to_cents(1_000_000_000.0).is_ok());
        assert!(amount_to_cents(MAX_SAFE_CENTS as f64).is_err());
    }

    #[test]
    fn formats_with_two_decimals() {
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(7), "0.07");
        assert_eq!(format_cents(17_500), "175.00");
    }

    proptest! {
        #[test]
        fn whole_cents_survive_conversion(cents in 1u64..1_000_000_000) {
            let amount = cents as f64 / 100.0;
            prop_assert_eq!(amount_to_cents(amount).unwrap(), cents);
        }
    }
}
