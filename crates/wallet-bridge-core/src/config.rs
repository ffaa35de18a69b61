//! Bridge configuration
//!
//! Defaults match a fresh install: account 0 on Ethereum mainnet under the
//! standard BIP-44 Ethereum path. Every section can be overridden from TOML.
//!
//! ```toml
//! derivation_path = "m/44'/60'/0'/0"
//! default_chain_id = 5
//!
//! [ethereum_rpc]
//! "5" = ["https://goerli.example.org", "https://goerli-backup.example.org"]
//!
//! [conflux]
//! rpc_urls = ["https://test.confluxrpc.com"]
//! chain_id = 1
//!
//! [poll]
//! interval_ms = 3000
//! timeout_secs = 600
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default BIP-44 base path for Ethereum accounts
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0";

/// Largest accepted growth of the confirmation poll interval
pub const MAX_BACKOFF_FACTOR: f64 = 10.0;

/// Top-level bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Base path; account `i` lives at `{derivation_path}/{i}`
    pub derivation_path: String,
    /// Account index activated on start
    pub default_active_index: u32,
    /// Chain id activated on start
    pub default_chain_id: u64,
    /// Number of accounts listed by `accounts()`
    pub number_of_accounts: u32,
    /// Ethereum RPC endpoints keyed by decimal chain id, in failover order
    pub ethereum_rpc: BTreeMap<String, Vec<String>>,
    /// Custom-RPC passthrough endpoint keyed by decimal chain id
    pub custom_rpc: BTreeMap<String, String>,
    pub conflux: ConfluxConfig,
    pub poll: PollSettings,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            derivation_path: DEFAULT_DERIVATION_PATH.to_string(),
            default_active_index: 0,
            default_chain_id: 1,
            number_of_accounts: 10,
            ethereum_rpc: BTreeMap::new(),
            custom_rpc: BTreeMap::new(),
            conflux: ConfluxConfig::default(),
            poll: PollSettings::default(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if !self.derivation_path.starts_with("m/") && self.derivation_path != "m" {
            return Err(Error::InvalidConfig(format!(
                "derivation_path must start with m/: {}",
                self.derivation_path
            )));
        }
        if self.number_of_accounts == 0 {
            return Err(Error::InvalidConfig(
                "number_of_accounts must be at least 1".into(),
            ));
        }
        if !(1.0..=MAX_BACKOFF_FACTOR).contains(&self.poll.backoff_factor) {
            return Err(Error::InvalidConfig(format!(
                "poll.backoff_factor must be between 1.0 and {}",
                MAX_BACKOFF_FACTOR
            )));
        }
        if self.poll.interval_ms == 0 {
            return Err(Error::InvalidConfig("poll.interval_ms must be > 0".into()));
        }
        Ok(())
    }

    /// Set the derivation base path
    pub fn with_derivation_path(mut self, path: impl Into<String>) -> Self {
        self.derivation_path = path.into();
        self
    }

    /// Set the initially active account index
    pub fn with_active_index(mut self, index: u32) -> Self {
        self.default_active_index = index;
        self
    }

    /// Set the initially active chain id
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.default_chain_id = chain_id;
        self
    }

    /// Set the number of listed accounts
    pub fn with_number_of_accounts(mut self, count: u32) -> Self {
        self.number_of_accounts = count;
        self
    }

    /// Register Ethereum RPC endpoints for a chain
    pub fn with_ethereum_rpc(mut self, chain_id: u64, urls: Vec<String>) -> Self {
        self.ethereum_rpc.insert(chain_id.to_string(), urls);
        self
    }

    /// Register a custom-RPC passthrough endpoint for a chain
    pub fn with_custom_rpc(mut self, chain_id: u64, url: impl Into<String>) -> Self {
        self.custom_rpc.insert(chain_id.to_string(), url.into());
        self
    }

    /// Set Conflux endpoints
    pub fn with_conflux_rpc(mut self, urls: Vec<String>) -> Self {
        self.conflux.rpc_urls = urls;
        self
    }

    /// Set the storage directory
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage.data_dir = Some(dir.into());
        self
    }

    /// Endpoint for custom-RPC passthrough on a chain, falling back to the
    /// first Ethereum endpoint of that chain
    pub fn custom_rpc_url(&self, chain_id: u64) -> Option<&str> {
        let key = chain_id.to_string();
        self.custom_rpc.get(&key).map(String::as_str).or_else(|| {
            self.ethereum_rpc_urls(chain_id)
                .and_then(|urls| urls.first())
                .map(String::as_str)
        })
    }

    /// Ethereum endpoints configured for a chain
    pub fn ethereum_rpc_urls(&self, chain_id: u64) -> Option<&Vec<String>> {
        self.ethereum_rpc.get(&chain_id.to_string())
    }
}

/// Conflux node settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfluxConfig {
    pub rpc_urls: Vec<String>,
    /// Chain id used when a request omits it
    pub chain_id: u64,
}

/// Confirmation polling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_ms: u64,
    pub backoff_factor: f64,
    pub max_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 3000,
            backoff_factor: 1.5,
            max_interval_ms: 15_000,
            timeout_secs: 600,
        }
    }
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms.max(self.interval_ms))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Persistence settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for persisted values; in-memory when unset
    pub data_dir: Option<PathBuf>,
    /// Passphrase sealing persisted values
    pub passphrase: Option<String>,
}

/// HTTP approval server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub cors_enabled: bool,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8732".to_string(),
            cors_enabled: true,
            request_timeout_secs: 30,
        }
    }
}
