//! Caller identities.
//!
//! Every actor (reputation admins, group admins, the registry owner and the
//! two components themselves) is identified by a 20-byte address written as
//! a `0x`-prefixed hex string.

use crate::utils::validate_and_strip_hex;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of an address in hex characters (excluding 0x prefix).
pub const ADDRESS_HEX_LENGTH: usize = 40;

/// A 20-byte identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The unset identity, used as "old admin" of a freshly created group.
    pub const ZERO: Address = Address([0u8; 20]);

    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Builds a deterministic address from a small integer, mostly useful for
    /// tests and fixtures.
    #[must_use]
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Address(bytes)
    }
}

/// Validates and normalizes an address.
///
/// Returns a lowercase hex string without the 0x prefix.
///
/// # Examples
///
/// ```
/// use semaphore_registry::address::normalize_address;
///
/// let normalized = normalize_address("0x742d35Cc6634C0532925a3b844Bc454e4438f44e").unwrap();
/// assert_eq!(normalized, "742d35cc6634c0532925a3b844bc454e4438f44e");
/// ```
pub fn normalize_address(address: &str) -> Result<String> {
    validate_and_strip_hex(address, ADDRESS_HEX_LENGTH).map(|s| s.to_lowercase())
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized =
            normalize_address(s).with_context(|| format!("Invalid address '{s}'"))?;
        let bytes = hex::decode(normalized).context("Failed to decode address from hex")?;
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("Address bytes length mismatch"))?;
        Ok(Address(array))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
