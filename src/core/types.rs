//! Core ledger data types.
//!
//! Amounts never appear here in the clear: a bill carries an
//! [`EncryptedHandle`] that points at a ciphertext owned by the encryption
//! engine. Category, description and timestamp are public metadata.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::VerifyingKey;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{ADDRESS_LEN, DOMAIN_ADDRESS, HANDLE_LEN};
use crate::LedgerError;

fn encode_0x(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn decode_0x<const N: usize>(s: &str) -> Result<[u8; N], LedgerError> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    let bytes =
        hex::decode(raw).map_err(|err| LedgerError::InvalidInput(format!("invalid hex: {err}")))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        LedgerError::InvalidInput(format!("expected {N} bytes, got {}", bytes.len()))
    })
}

/// Serde adapter for byte vectors as `0x` hex strings.
pub(crate) mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_0x(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(de::Error::custom)
    }
}

macro_rules! hex_newtype_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

/// 20-byte account identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

/// Identifier of a ledger instance ("contract address").
pub type LedgerAddress = Address;

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Derives the account address controlled by an Ed25519 key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let digest = blake3::derive_key(DOMAIN_ADDRESS, key.as_bytes());
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest[..ADDRESS_LEN]);
        Address(out)
    }

    /// Derives a deterministic address from a label. Used for ledger instances
    /// and fixtures.
    pub fn from_label(label: &str) -> Self {
        let digest = blake3::derive_key(DOMAIN_ADDRESS, label.as_bytes());
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest[..ADDRESS_LEN]);
        Address(out)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_0x(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_0x(s).map(Address)
    }
}

hex_newtype_serde!(Address);

/// Opaque reference to a ciphertext held by the encryption engine.
///
/// The all-zero value is reserved: it means "no value yet" and decrypts to 0
/// without contacting the oracle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncryptedHandle(pub [u8; HANDLE_LEN]);

/// The reserved uninitialized handle.
pub const ZERO_HANDLE: EncryptedHandle = EncryptedHandle([0u8; HANDLE_LEN]);

impl EncryptedHandle {
    pub fn is_zero(&self) -> bool {
        *self == ZERO_HANDLE
    }

    pub fn as_bytes(&self) -> &[u8; HANDLE_LEN] {
        &self.0
    }

    /// First four bytes in hex, for log fields.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl Default for EncryptedHandle {
    fn default() -> Self {
        ZERO_HANDLE
    }
}

impl fmt::Display for EncryptedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_0x(&self.0))
    }
}

impl fmt::Debug for EncryptedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedHandle({})", self.short())
    }
}

impl FromStr for EncryptedHandle {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_0x(s).map(EncryptedHandle)
    }
}

hex_newtype_serde!(EncryptedHandle);

/// Client-produced ciphertext reference plus its well-formedness proof.
///
/// The proof is bound to `(ledger, owner)` by the encryption engine and is
/// checked by the handle store before the handle is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handle: EncryptedHandle,
    #[serde(with = "hex_bytes")]
    pub proof: Vec<u8>,
}

/// A single immutable bill record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub owner: Address,
    /// Position in the owner's bill list; equals the owner's bill count at creation.
    pub index: u32,
    pub amount_handle: EncryptedHandle,
    pub category: String,
    pub description: String,
    /// Block time at creation, Unix seconds.
    pub timestamp: u64,
}

impl Bill {
    pub fn meta(&self) -> BillMeta {
        BillMeta {
            category: self.category.clone(),
            description: self.description.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Public metadata of a bill.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillMeta {
    pub category: String,
    pub description: String,
    pub timestamp: u64,
}

/// The bucket a running total belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AggregateScope {
    Global(Address),
    Category(Address, String),
    /// Fixed 30-day bucket index, see [`crate::month_index`].
    Month(Address, u64),
}

impl AggregateScope {
    pub fn owner(&self) -> &Address {
        match self {
            AggregateScope::Global(owner)
            | AggregateScope::Category(owner, _)
            | AggregateScope::Month(owner, _) => owner,
        }
    }
}

/// Plaintext returned by the decryption oracle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearValue {
    Uint(u64),
    Bool(bool),
}

impl ClearValue {
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            ClearValue::Uint(value) => Some(*value),
            ClearValue::Bool(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_handle_is_reserved_default() {
        assert!(EncryptedHandle::default().is_zero());
        assert!(!EncryptedHandle([1u8; HANDLE_LEN]).is_zero());
    }

    #[test]
    fn address_parses_with_and_without_prefix() {
        let addr = Address::from_label("alice");
        let text = addr.to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(text.parse::<Address>().unwrap(), addr);
        assert_eq!(text[2..].parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn handle_rejects_wrong_length() {
        let err = "0x0102".parse::<EncryptedHandle>().unwrap_err();
        match err {
            LedgerError::InvalidInput(msg) => assert!(msg.contains("expected 32 bytes")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn handle_serializes_as_hex_string() {
        let handle = EncryptedHandle([7u8; HANDLE_LEN]);
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, format!("\"{handle}\""));
        let back: EncryptedHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handle);
    }

    #[test]
    fn scope_owner_is_shared_across_variants() {
        let owner = Address::from_label("bob");
        assert_eq!(AggregateScope::Global(owner).owner(), &owner);
        assert_eq!(AggregateScope::Category(owner, "Food".into()).owner(), &owner);
        assert_eq!(AggregateScope::Month(owner, 3).owner(), &owner);
    }
}
