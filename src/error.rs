//! Errors raised by the group engine and the registry.
//!
//! Every error aborts the operation that raised it; no state is committed.

use crate::types::{GroupId, ReputationId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of failures.
///
/// `ProofRejection` is kept apart from `Validation` so a caller can tell a
/// stale or forged proof from a malformed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    StateConflict,
    NotFound,
    Validation,
    ProofRejection,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("caller is not the admin of reputation {0}")]
    NotReputationAdmin(ReputationId),

    #[error("caller is not the bound registry")]
    NotRegistry,

    #[error("caller is not the admin of group {0}")]
    CallerIsNotTheGroupAdmin(GroupId),

    #[error("caller is not the owner")]
    CallerIsNotOwner,

    #[error("reputation {0} already exists")]
    ReputationIdAlreadyExists(ReputationId),

    #[error("group {0} already exists")]
    GroupAlreadyExists(GroupId),

    #[error("nullifier already used in group {0}")]
    YouAreUsingTheSameNullifierTwice(GroupId),

    #[error("reputation {0} does not exist")]
    ReputationDoesNotExist(ReputationId),

    #[error("group {0} does not exist")]
    GroupDoesNotExist(GroupId),

    #[error("tree depth must be between {min} and {max}, got {depth}")]
    InvalidDepth { depth: u8, min: u8, max: u8 },

    #[error("reputation valid_from {valid_from} is after valid_until {valid_until}")]
    InvalidReputationTime { valid_from: u64, valid_until: u64 },

    #[error("leaf cannot be zero")]
    LeafCannotBeZero,

    #[error("leaf must be lower than the snark scalar field")]
    LeafGreaterThanSnarkScalarField,

    #[error("tree is full")]
    FullTree,

    #[error("wrong merkle proof")]
    WrongMerkleProof,

    #[error("leaf index {index} is out of range (number of leaves: {number_of_leaves})")]
    LeafIndexOutOfRange { index: u64, number_of_leaves: u64 },

    #[error("new leaf cannot be equal to the old one")]
    NewLeafCannotEqualOldLeaf,

    #[error("address cannot be zero")]
    InvalidAddress,

    #[error("registry is not bound to this group engine")]
    SemaphoreNotBound,

    #[error("invalid proof")]
    InvalidProof,

    #[error("merkle tree root is expired")]
    MerkleTreeRootIsExpired,

    #[error("merkle tree root is not part of the group")]
    MerkleTreeRootIsNotPartOfTheGroup,
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotReputationAdmin(_)
            | Error::NotRegistry
            | Error::CallerIsNotTheGroupAdmin(_)
            | Error::CallerIsNotOwner
            | Error::SemaphoreNotBound => ErrorKind::Authorization,
            Error::ReputationIdAlreadyExists(_)
            | Error::GroupAlreadyExists(_)
            | Error::YouAreUsingTheSameNullifierTwice(_) => ErrorKind::StateConflict,
            Error::ReputationDoesNotExist(_) | Error::GroupDoesNotExist(_) => ErrorKind::NotFound,
            Error::InvalidDepth { .. }
            | Error::InvalidReputationTime { .. }
            | Error::LeafCannotBeZero
            | Error::LeafGreaterThanSnarkScalarField
            | Error::FullTree
            | Error::WrongMerkleProof
            | Error::LeafIndexOutOfRange { .. }
            | Error::NewLeafCannotEqualOldLeaf
            | Error::InvalidAddress => ErrorKind::Validation,
            Error::InvalidProof
            | Error::MerkleTreeRootIsExpired
            | Error::MerkleTreeRootIsNotPartOfTheGroup => ErrorKind::ProofRejection,
        }
    }
}
