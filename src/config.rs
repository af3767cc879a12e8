//! TOML configuration for the registry and prover binaries.

use crate::verifier::DEFAULT_MAX_PROOF_SIZE;
use crate::CIRCUIT_K;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_NETWORK: &str = "localhost";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name of the address book written under `deployment.dir`.
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default)]
    pub semaphore: SemaphoreConfig,
    #[serde(default)]
    pub proof: ProofConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub deployment: DeploymentConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemaphoreConfig {
    /// Root expiry applied to new groups when none is given; 0 never expires.
    #[serde(default)]
    pub default_root_expiry_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofConfig {
    #[serde(default = "default_max_proof_size")]
    pub max_proof_size: usize,
    #[serde(default = "default_circuit_k")]
    pub circuit_k: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_file")]
    pub file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default = "default_deployment_dir")]
    pub dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: default_network(),
            semaphore: SemaphoreConfig::default(),
            proof: ProofConfig::default(),
            state: StateConfig::default(),
            deployment: DeploymentConfig::default(),
        }
    }
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            max_proof_size: DEFAULT_MAX_PROOF_SIZE,
            circuit_k: CIRCUIT_K,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            file: default_state_file(),
        }
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            dir: default_deployment_dir(),
        }
    }
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

fn default_max_proof_size() -> usize {
    DEFAULT_MAX_PROOF_SIZE
}

fn default_circuit_k() -> u32 {
    CIRCUIT_K
}

fn default_state_file() -> PathBuf {
    PathBuf::from("registry_state.json")
}

fn default_deployment_dir() -> PathBuf {
    PathBuf::from("deployments")
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Loads `path`, or the defaults if the file does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_from_file_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
