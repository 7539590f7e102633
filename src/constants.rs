//! Protocol constants shared by the ledger and the client.

/// Width of a month bucket. Months are fixed 30-day windows counted from the
/// Unix epoch, not calendar months.
pub const SECONDS_PER_30_DAY_MONTH: u64 = 30 * 24 * 60 * 60;

pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Default lifetime of a decryption grant.
pub const DEFAULT_GRANT_DURATION_DAYS: u64 = 365;

/// Longest lifetime the decryption oracle accepts for a grant.
pub const MAX_GRANT_DURATION_DAYS: u64 = 365;

/// Largest amount in cents accepted by the client (2^53 - 1).
pub const MAX_SAFE_CENTS: u64 = (1 << 53) - 1;

/// Byte width of an encrypted handle.
pub const HANDLE_LEN: usize = 32;

/// Byte width of an account or ledger address.
pub const ADDRESS_LEN: usize = 20;

pub(crate) const DOMAIN_INPUT_HANDLE: &str = "shadow-ledger:input-handle:v1";
pub(crate) const DOMAIN_ADD_HANDLE: &str = "shadow-ledger:add-handle:v1";
pub(crate) const DOMAIN_INPUT_PROOF: &str = "shadow-ledger:input-proof:v1";
pub(crate) const DOMAIN_USER_DECRYPT: &str = "shadow-ledger:user-decrypt:v1";
pub(crate) const DOMAIN_GRANT_KEY: &str = "shadow-ledger:grant-storage-key:v1";
pub(crate) const DOMAIN_ADDRESS: &str = "shadow-ledger:address:v1";
