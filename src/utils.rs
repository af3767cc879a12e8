//! Utility functions for hex validation, field conversion and hashing.

use anyhow::Result;
use halo2_gadgets::poseidon::primitives::{
    self as poseidon, ConstantLength, P128Pow5T3 as PoseidonSpec,
};
use pasta_curves::group::ff::PrimeField;
use pasta_curves::pallas;
use sha3::{Digest, Keccak256};

fn is_valid_hex_string(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

fn strip_hex_prefix(input: &str) -> &str {
    input
        .trim()
        .strip_prefix("0x")
        .or_else(|| input.trim().strip_prefix("0X"))
        .unwrap_or_else(|| input.trim())
}

/// Validates and strips hex prefix from a string.
///
/// # Arguments
///
/// * `input` - The hex string to validate (may include "0x" or "0X" prefix)
/// * `expected_len` - Expected length of the hex string after stripping prefix
///
/// # Errors
/// Returns an error if:
/// - The hex string has incorrect length
/// - The hex string contains non-hex characters
///
/// # Examples
///
/// ```
/// use semaphore_registry::utils::validate_and_strip_hex;
///
/// let result = validate_and_strip_hex("0x1234abcd", 8).unwrap();
/// assert_eq!(result, "1234abcd");
/// ```
pub fn validate_and_strip_hex(input: &str, expected_len: usize) -> Result<String> {
    let stripped = strip_hex_prefix(input);

    if stripped.len() != expected_len {
        return Err(anyhow::anyhow!(
            "Invalid hex string: must be {} characters (got {})",
            expected_len,
            stripped.len()
        ));
    }

    if !is_valid_hex_string(stripped) {
        return Err(anyhow::anyhow!(
            "Invalid hex string: contains non-hex characters"
        ));
    }

    Ok(stripped.to_string())
}

/// Strips the prefix of a hex string of at most `max_len` digits and left-pads
/// it with zeros to exactly `max_len` digits.
///
/// Lets callers write short quantities such as `0x3e8` for a 256-bit word.
pub fn pad_hex(input: &str, max_len: usize) -> Result<String> {
    let stripped = strip_hex_prefix(input);

    if stripped.is_empty() || stripped.len() > max_len {
        return Err(anyhow::anyhow!(
            "Invalid hex string: must be 1 to {} characters (got {})",
            max_len,
            stripped.len()
        ));
    }
    if !is_valid_hex_string(stripped) {
        return Err(anyhow::anyhow!(
            "Invalid hex string: contains non-hex characters"
        ));
    }

    Ok(format!("{stripped:0>max_len$}"))
}

/// Validates that a string contains only hex digits.
#[must_use]
pub fn validate_hex_string(input: &str) -> bool {
    let stripped = strip_hex_prefix(input);

    if stripped.is_empty() {
        return false;
    }

    is_valid_hex_string(stripped)
}

/// Interprets 32 big-endian bytes as a Pallas base field element.
///
/// Returns `None` when the value is not below the field modulus; values are
/// never silently reduced.
#[inline]
#[must_use]
pub fn field_from_be_bytes(bytes: &[u8; 32]) -> Option<pallas::Base> {
    let mut repr = *bytes;
    repr.reverse();
    Option::from(pallas::Base::from_repr(repr))
}

/// Converts a field element to 32 big-endian bytes.
#[inline]
#[must_use]
pub fn field_to_be_bytes(field: pallas::Base) -> [u8; 32] {
    let mut bytes = field.to_repr();
    bytes.reverse();
    bytes
}

/// Keccak-256 of `data` shifted right by one byte.
///
/// The shift keeps the digest below 2^248, so the result always fits the
/// field. Used for signal hashes and per-group zero values.
#[must_use]
pub fn keccak_to_field_bytes(data: &[u8]) -> [u8; 32] {
    let digest = Keccak256::digest(data);
    let mut out = [0u8; 32];
    out[1..].copy_from_slice(&digest[..31]);
    out
}

/// Poseidon hash of two field elements using `P128Pow5T3` specification.
///
/// This is the fixed-arity hash used for every Merkle tree node.
///
/// # Example
///
/// ```
/// use semaphore_registry::utils::poseidon_hash;
/// use pasta_curves::pallas;
///
/// let left = pallas::Base::from(1);
/// let right = pallas::Base::from(2);
/// let hash = poseidon_hash(left, right);
/// assert_ne!(hash, poseidon_hash(right, left));
/// ```
#[inline]
#[must_use]
pub fn poseidon_hash(left: pallas::Base, right: pallas::Base) -> pallas::Base {
    let inputs = [left, right];
    poseidon::Hash::<_, PoseidonSpec, ConstantLength<2>, 3, 2>::init().hash(inputs)
}
