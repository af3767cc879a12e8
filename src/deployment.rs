//! Deployment wiring and persisted state.
//!
//! Components are brought up in dependency order (verifier, group engine,
//! registry) and then bound to each other. The resulting addresses are kept
//! in a per-network address book; the full component state is kept in a JSON
//! snapshot between CLI invocations.

use crate::address::Address;
use crate::error::Result;
use crate::registry::{Registry, RegistryState};
use crate::semaphore::{Semaphore, SemaphoreState};
use crate::types::Context;
use crate::verifier::ProofVerifier;
use anyhow::Context as _;
use log::info;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::path::{Path, PathBuf};

/// Address of the `nonce`-th component created by `deployer`: the last 20
/// bytes of `keccak256(deployer || nonce)`.
#[must_use]
pub fn contract_address(deployer: &Address, nonce: u64) -> Address {
    let mut hasher = Keccak256::new();
    hasher.update(deployer.0);
    hasher.update(nonce.to_be_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address(bytes)
}

/// Address book of one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedContracts {
    pub verifier: Address,
    pub semaphore: Address,
    pub registry: Address,
}

impl DeployedContracts {
    #[must_use]
    pub fn path(dir: &Path, network: &str) -> PathBuf {
        dir.join(format!("{network}.json"))
    }

    pub fn save(&self, dir: &Path, network: &str) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create deployment directory: {}", dir.display()))?;
        let path = Self::path(dir, network);
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize deployed contracts")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write deployment file: {}", path.display()))?;
        Ok(path)
    }

    pub fn load(dir: &Path, network: &str) -> anyhow::Result<Self> {
        let path = Self::path(dir, network);
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read deployment file: {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse deployment file: {}", path.display()))
    }
}

/// Persisted state of a whole deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub contracts: DeployedContracts,
    pub semaphore: SemaphoreState,
    pub registry: RegistryState,
}

impl Snapshot {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create state directory: {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize state")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write state file: {}", path.display()))
    }
}

/// A group engine and a registry bound to each other.
pub struct Deployment<V> {
    pub contracts: DeployedContracts,
    pub semaphore: Semaphore<V>,
    pub registry: Registry,
}

impl<V: ProofVerifier> Deployment<V> {
    /// Deploys as `owner` and wires both bindings.
    ///
    /// The group engine starts bound to `owner`, which then hands the binding
    /// over to the freshly created registry.
    pub fn deploy(owner: Address, verifier: V, timestamp: u64) -> Result<Self> {
        let contracts = DeployedContracts {
            verifier: contract_address(&owner, 0),
            semaphore: contract_address(&owner, 1),
            registry: contract_address(&owner, 2),
        };
        let ctx = Context::new(owner, timestamp);

        let mut semaphore = Semaphore::new(contracts.semaphore, owner, verifier);
        let mut registry = Registry::new(contracts.registry, owner);
        registry.update_semaphore(&ctx, contracts.semaphore)?;
        semaphore.update_registry(&ctx, contracts.registry)?;

        info!(
            "Deployed verifier {}, semaphore {}, registry {}",
            contracts.verifier, contracts.semaphore, contracts.registry
        );
        Ok(Self {
            contracts,
            semaphore,
            registry,
        })
    }

    pub fn from_snapshot(snapshot: Snapshot, verifier: V) -> Self {
        Self {
            contracts: snapshot.contracts,
            semaphore: Semaphore::from_state(snapshot.semaphore, verifier),
            registry: Registry::from_state(snapshot.registry),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            contracts: self.contracts,
            semaphore: self.semaphore.state().clone(),
            registry: self.registry.state().clone(),
        }
    }
}
