//! Type definitions shared by the group engine and the registry.

use crate::address::Address;
use crate::utils::{
    field_from_be_bytes, field_to_be_bytes, keccak_to_field_bytes, pad_hex, validate_hex_string,
};
use anyhow::{Context as _, Result};
use log::debug;
use pasta_curves::pallas;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const HASH_SIZE: usize = 32;

pub type GroupId = u64;
pub type ReputationId = u64;

/// A 256-bit big-endian value as supplied by callers.
///
/// Leaves, roots, nullifiers and signals travel as words. A word is not
/// necessarily a field element; [`Word::to_field`] performs the range check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Word(pub [u8; HASH_SIZE]);

impl Word {
    pub const ZERO: Word = Word([0u8; HASH_SIZE]);

    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; HASH_SIZE];
        bytes[HASH_SIZE - 8..].copy_from_slice(&value.to_be_bytes());
        Word(bytes)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Field element for this word, or `None` if it is not below the modulus.
    #[must_use]
    pub fn to_field(&self) -> Option<pallas::Base> {
        field_from_be_bytes(&self.0)
    }

    #[must_use]
    pub fn from_field(field: pallas::Base) -> Self {
        Word(field_to_be_bytes(field))
    }
}

impl From<u64> for Word {
    fn from(value: u64) -> Self {
        Word::from_u64(value)
    }
}

impl FromStr for Word {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let padded = pad_hex(s, HASH_SIZE * 2).with_context(|| format!("Invalid word '{s}'"))?;
        let bytes = hex::decode(padded).context("Failed to decode word from hex")?;
        let array: [u8; HASH_SIZE] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("Word must be {HASH_SIZE} bytes"))?;
        Ok(Word(array))
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Word {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Word {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Hash of a signal as bound into a proof: `keccak256(signal) >> 8`.
#[must_use]
pub fn hash_signal(signal: &Word) -> Word {
    Word(keccak_to_field_bytes(&signal.0))
}

/// The reserved empty-leaf value of a group: `keccak256(group_id) >> 8`.
#[must_use]
pub fn zero_value_for(group_id: GroupId) -> Word {
    Word(keccak_to_field_bytes(&Word::from_u64(group_id).0))
}

/// Who is calling and when.
///
/// Every entry point receives the authenticated caller and the host's clock
/// reading for the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub caller: Address,
    pub timestamp: u64,
}

impl Context {
    #[must_use]
    pub fn new(caller: Address, timestamp: u64) -> Self {
        Self { caller, timestamp }
    }
}

/// The public input tuple a membership proof is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInputs {
    pub merkle_tree_root: Word,
    pub nullifier_hash: Word,
    pub signal_hash: Word,
    pub external_nullifier: Word,
}

impl PublicInputs {
    pub const ARITY: usize = 4;

    /// Field representation in circuit order, or `None` if any input is out
    /// of the field range.
    #[must_use]
    pub fn to_fields(&self) -> Option<[pallas::Base; Self::ARITY]> {
        Some([
            self.merkle_tree_root.to_field()?,
            self.nullifier_hash.to_field()?,
            self.signal_hash.to_field()?,
            self.external_nullifier.to_field()?,
        ])
    }
}

/// A registered organization allowed to create groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reputation {
    pub id: ReputationId,
    pub admin: Address,
    pub name: String,
    pub content_uri: String,
    pub valid_from: u64,
    pub valid_until: u64,
}

impl Reputation {
    #[must_use]
    pub fn is_admin(&self, caller: &Address) -> bool {
        self.admin == *caller
    }

    /// Whether `timestamp` falls inside `[valid_from, valid_until]`.
    #[must_use]
    pub fn is_valid_at(&self, timestamp: u64) -> bool {
        self.valid_from <= timestamp && timestamp <= self.valid_until
    }
}

/// Observable events emitted by the group engine and the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    ReputationAdded {
        id: ReputationId,
        name: String,
    },
    ReputationRemoved {
        id: ReputationId,
        name: String,
    },
    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
    },
    SemaphoreUpdated {
        old_semaphore: Option<Address>,
        new_semaphore: Address,
    },
    RegistryUpdated {
        old_registry: Address,
        new_registry: Address,
    },
    GroupCreated {
        group_id: GroupId,
        merkle_tree_depth: u8,
        zero_value: Word,
    },
    GroupAdminUpdated {
        group_id: GroupId,
        old_admin: Address,
        new_admin: Address,
    },
    GroupMerkleTreeDurationUpdated {
        group_id: GroupId,
        old_duration: u64,
        new_duration: u64,
    },
    MemberAdded {
        group_id: GroupId,
        index: u64,
        identity_commitment: Word,
        merkle_tree_root: Word,
    },
    MembersAdded {
        group_id: GroupId,
        start_index: u64,
        identity_commitments: Vec<Word>,
        merkle_tree_root: Word,
    },
    MemberUpdated {
        group_id: GroupId,
        index: u64,
        identity_commitment: Word,
        new_identity_commitment: Word,
        merkle_tree_root: Word,
    },
    MemberRemoved {
        group_id: GroupId,
        index: u64,
        identity_commitment: Word,
        merkle_tree_root: Word,
    },
    ProofVerified {
        group_id: GroupId,
        merkle_tree_root: Word,
        nullifier_hash: Word,
        signal: Word,
        external_nullifier: Word,
    },
}

/// A signal and its membership proof, as exchanged between the prover
/// binary and the registry binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalProof {
    pub merkle_tree_root: Word,
    pub nullifier_hash: Word,
    pub signal: Word,
    pub external_nullifier: Word,
    /// Hex-encoded proof transcript.
    pub proof: String,
    /// Unix timestamp when the proof was generated.
    pub timestamp: u64,
}

impl SignalProof {
    #[must_use]
    pub fn public_inputs(&self) -> PublicInputs {
        PublicInputs {
            merkle_tree_root: self.merkle_tree_root,
            nullifier_hash: self.nullifier_hash,
            signal_hash: hash_signal(&self.signal),
            external_nullifier: self.external_nullifier,
        }
    }

    /// Checks the proof encoding and returns the decoded proof bytes.
    ///
    /// # Errors
    /// Returns an error if the proof is empty, is not valid hex, or exceeds
    /// `max_proof_size` bytes.
    pub fn decode_proof(&self, max_proof_size: usize) -> Result<Vec<u8>> {
        debug!("Decoding proof of {} hex characters", self.proof.len());

        if self.proof.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "Proof cannot be empty. The proof data is missing."
            ));
        }
        if !validate_hex_string(&self.proof) {
            return Err(anyhow::anyhow!("Proof contains non-hex characters"));
        }
        let bytes = hex::decode(self.proof.trim().trim_start_matches("0x"))
            .context("Failed to decode proof hex")?;
        if bytes.len() > max_proof_size {
            return Err(anyhow::anyhow!(
                "Proof size exceeds limit: {} bytes (max {} bytes)",
                bytes.len(),
                max_proof_size
            ));
        }
        Ok(bytes)
    }
}
