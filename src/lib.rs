//! Reputation-gated anonymous group signaling.
//!
//! Members of a group are identity commitments stored as leaves of an
//! incremental Merkle tree. A member proves inclusion and broadcasts a signal
//! without revealing which leaf is theirs; a per-group nullifier prevents
//! double signaling. Groups are created through a registry of reputations,
//! so only a reputation's admin can open a group, and only while the
//! reputation is valid.
//!
//! # Components
//!
//! - [`IncrementalMerkleTree`]: Poseidon Merkle tree with path-verified updates
//! - [`Semaphore`]: group engine (members, root history, nullifiers, signals)
//! - [`Registry`]: reputation records and gated group creation
//! - [`ProofVerifier`]: proof backend seam, with [`Halo2Verifier`] and [`MockVerifier`]
//! - [`Deployment`]: wiring of the engine and registry
//!
//! # Example
//!
//! ```
//! use semaphore_registry::{Address, Context, Deployment, MockVerifier, Word};
//!
//! let owner = Address::from_low_u64(1);
//! let admin = Address::from_low_u64(2);
//! let mut deployment = Deployment::deploy(owner, MockVerifier, 0).unwrap();
//!
//! let ctx = Context::new(owner, 0);
//! deployment
//!     .registry
//!     .add_reputation(&ctx, 1000, admin, "YOU", "https://example.org", 0, 999)
//!     .unwrap();
//!
//! let ctx = Context::new(admin, 10);
//! deployment
//!     .registry
//!     .create_group(&ctx, &mut deployment.semaphore, 1000, 1000, 20)
//!     .unwrap();
//! deployment
//!     .semaphore
//!     .add_member(&ctx, 1000, Word::from_u64(42))
//!     .unwrap();
//! assert_eq!(deployment.semaphore.get_number_of_merkle_tree_leaves(1000), Ok(1));
//! ```

pub mod address;
pub mod circuit;
pub mod config;
pub mod deployment;
pub mod error;
pub mod merkle;
pub mod registry;
pub mod semaphore;
pub mod types;
pub mod utils;
pub mod verifier;


pub use address::Address;
pub use circuit::{Halo2Verifier, SignalCircuit, SignalProver};
pub use deployment::{DeployedContracts, Deployment, Snapshot};
pub use error::{Error, ErrorKind};
pub use merkle::{IncrementalMerkleTree, MerkleProof, RootHistory};
pub use registry::Registry;
pub use semaphore::{Group, Semaphore};
pub use types::{Context, Event, GroupId, PublicInputs, Reputation, ReputationId, SignalProof, Word};
pub use verifier::{MockVerifier, ProofVerifier};

/// Circuit parameter for the Halo2 signal circuit.
///
/// The circuit uses `2^k` rows. The signal circuit needs only a handful of
/// rows, so a small `k` keeps key generation fast.
///
/// Changing `CIRCUIT_K` changes the proving and verifying keys: prover and
/// verifier must use the same value, or verification will fail.
pub const CIRCUIT_K: u32 = 6;
