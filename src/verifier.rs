//! Proof verification capability.
//!
//! The group engine only needs a yes/no answer for a proof and its public
//! inputs, so the backend is a trait. [`crate::circuit::Halo2Verifier`] is the
//! real backend; [`MockVerifier`] is a transparent stand-in for tests and
//! local tooling.

use crate::types::PublicInputs;
use sha3::{Digest, Keccak256};

/// Default maximum accepted proof size in bytes.
pub const DEFAULT_MAX_PROOF_SIZE: usize = 512 * 1024;

/// Verifies membership proofs against `(root, nullifier hash, signal hash,
/// external nullifier)`.
///
/// Implementations must be pure and must return `false` for malformed,
/// truncated or oversized encodings instead of panicking.
pub trait ProofVerifier {
    fn verify_proof(&self, proof: &[u8], public_inputs: &PublicInputs) -> bool;
}

impl<V: ProofVerifier + ?Sized> ProofVerifier for &V {
    fn verify_proof(&self, proof: &[u8], public_inputs: &PublicInputs) -> bool {
        (**self).verify_proof(proof, public_inputs)
    }
}

impl<V: ProofVerifier + ?Sized> ProofVerifier for Box<V> {
    fn verify_proof(&self, proof: &[u8], public_inputs: &PublicInputs) -> bool {
        (**self).verify_proof(proof, public_inputs)
    }
}

/// A deterministic, non-private proof system.
///
/// A "proof" is `keccak256(root || nullifier_hash || signal_hash ||
/// external_nullifier)`. Anyone can forge it; it only exercises the group
/// engine's bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockVerifier;

impl MockVerifier {
    pub const PROOF_SIZE: usize = 32;

    #[must_use]
    pub fn prove(public_inputs: &PublicInputs) -> Vec<u8> {
        let mut hasher = Keccak256::new();
        hasher.update(public_inputs.merkle_tree_root.0);
        hasher.update(public_inputs.nullifier_hash.0);
        hasher.update(public_inputs.signal_hash.0);
        hasher.update(public_inputs.external_nullifier.0);
        hasher.finalize().to_vec()
    }
}

impl ProofVerifier for MockVerifier {
    fn verify_proof(&self, proof: &[u8], public_inputs: &PublicInputs) -> bool {
        proof.len() == Self::PROOF_SIZE && proof == Self::prove(public_inputs).as_slice()
    }
}
