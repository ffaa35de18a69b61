//! Key controller
//!
//! Owns the wallet seed and the single active keypair. The seed material is
//! read from the store on load and generated (then persisted) on first use, so
//! every controller built on the same store derives the same accounts.
//!
//! The active keypair always matches the controller's `(index, chain_id)`
//! pair: [`KeyController::update`] replaces it wholesale.

use crate::chain::{
    ConfluxClient, ConfluxSigner, EthereumClient, EthereumSigner, RpcClient, RpcTransport,
};
use crate::config::BridgeConfig;
use crate::keys::{HdWallet, Keypair, account_path, entropy_to_mnemonic, generate_entropy};
use crate::storage::{ENTROPY_KEY, KeyValueStore, MNEMONIC_KEY, get_or_generate};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Node connections per chain
#[derive(Clone, Default)]
pub struct ChainEndpoints {
    ethereum: HashMap<u64, Arc<dyn RpcTransport>>,
    conflux: Option<Arc<dyn RpcTransport>>,
}

impl fmt::Debug for ChainEndpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chains: Vec<_> = self.ethereum.keys().collect();
        chains.sort();
        f.debug_struct("ChainEndpoints")
            .field("ethereum", &chains)
            .field("conflux", &self.conflux.is_some())
            .finish()
    }
}

impl ChainEndpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build HTTP clients for every configured endpoint
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        let mut endpoints = Self::new();
        for (chain_id, urls) in &config.ethereum_rpc {
            let chain_id: u64 = chain_id.parse().map_err(|_| {
                Error::InvalidConfig(format!("ethereum_rpc key is not a chain id: {}", chain_id))
            })?;
            if urls.is_empty() {
                continue;
            }
            endpoints = endpoints.with_ethereum(chain_id, Arc::new(RpcClient::new(urls.clone())?));
        }
        if !config.conflux.rpc_urls.is_empty() {
            endpoints =
                endpoints.with_conflux(Arc::new(RpcClient::new(config.conflux.rpc_urls.clone())?));
        }
        Ok(endpoints)
    }

    pub fn with_ethereum(mut self, chain_id: u64, transport: Arc<dyn RpcTransport>) -> Self {
        self.ethereum.insert(chain_id, transport);
        self
    }

    pub fn with_conflux(mut self, transport: Arc<dyn RpcTransport>) -> Self {
        self.conflux = Some(transport);
        self
    }

    pub fn ethereum(&self, chain_id: u64) -> Option<Arc<dyn RpcTransport>> {
        self.ethereum.get(&chain_id).cloned()
    }

    pub fn conflux(&self) -> Option<Arc<dyn RpcTransport>> {
        self.conflux.clone()
    }
}

/// The materialized keypair and the selection it was derived for
#[derive(Debug, Clone)]
pub struct ActiveAccount {
    pub index: u32,
    pub chain_id: u64,
    pub path: String,
    keypair: Keypair,
}

impl ActiveAccount {
    /// Checksummed Ethereum address
    pub fn address(&self) -> String {
        self.keypair.eth_address()
    }

    pub fn conflux_address(&self) -> String {
        self.keypair.conflux_address()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

/// A derived account as listed to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedAccount {
    pub index: u32,
    pub path: String,
    pub address: String,
    pub conflux_address: String,
}

/// Holds the wallet seed and the active keypair
pub struct KeyController {
    config: BridgeConfig,
    store: Arc<dyn KeyValueStore>,
    endpoints: ChainEndpoints,
    entropy: Zeroizing<String>,
    mnemonic: Zeroizing<String>,
    wallet: HdWallet,
    active_index: u32,
    active_chain_id: u64,
    active: Option<ActiveAccount>,
}

impl fmt::Debug for KeyController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyController")
            .field("active_index", &self.active_index)
            .field("active_chain_id", &self.active_chain_id)
            .field("active", &self.active.as_ref().map(|a| a.address()))
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl KeyController {
    /// Load seed material from `store`, generating it on first use.
    /// No keypair is active until [`init`](Self::init) or [`update`](Self::update).
    pub async fn load(
        config: BridgeConfig,
        store: Arc<dyn KeyValueStore>,
        endpoints: ChainEndpoints,
    ) -> Result<Self> {
        config.validate()?;

        let entropy = get_or_generate(store.as_ref(), ENTROPY_KEY, || Ok(generate_entropy())).await?;
        let mnemonic =
            get_or_generate(store.as_ref(), MNEMONIC_KEY, || entropy_to_mnemonic(&entropy)).await?;
        let wallet = HdWallet::from_mnemonic(&mnemonic)?;

        Ok(Self {
            active_index: config.default_active_index,
            active_chain_id: config.default_chain_id,
            config,
            store,
            endpoints,
            entropy: Zeroizing::new(entropy),
            mnemonic: Zeroizing::new(mnemonic),
            wallet,
            active: None,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        self.store.clone()
    }

    pub fn endpoints(&self) -> &ChainEndpoints {
        &self.endpoints
    }

    /// Whether a keypair is materialized
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&ActiveAccount> {
        self.active.as_ref()
    }

    pub fn active_index(&self) -> u32 {
        self.active_index
    }

    pub fn active_chain_id(&self) -> u64 {
        self.active_chain_id
    }

    /// Activate the configured default account and chain
    pub fn init(&mut self) -> Result<&ActiveAccount> {
        self.update(self.config.default_active_index, self.config.default_chain_id)
    }

    /// Derive and activate the keypair for `(index, chain_id)`, replacing any active one
    pub fn update(&mut self, index: u32, chain_id: u64) -> Result<&ActiveAccount> {
        let path = self.path(index);
        let keypair = self.wallet.derive(&path)?;
        tracing::info!(index, chain_id, address = %keypair.eth_address(), "Activated account");

        self.active_index = index;
        self.active_chain_id = chain_id;
        Ok(self.active.insert(ActiveAccount {
            index,
            chain_id,
            path,
            keypair,
        }))
    }

    /// Drop the active keypair
    pub fn deactivate(&mut self) {
        self.active = None;
    }

    /// Derivation path of account `index`
    pub fn path(&self, index: u32) -> String {
        account_path(&self.config.derivation_path, index)
    }

    /// Accounts `0..count`; the configured account count when `count` is `None`
    pub fn accounts(&self, count: Option<u32>) -> Result<Vec<DerivedAccount>> {
        let count = count.unwrap_or(self.config.number_of_accounts);
        (0..count)
            .map(|index| {
                let path = self.path(index);
                let keypair = self.wallet.derive(&path)?;
                Ok(DerivedAccount {
                    index,
                    path,
                    address: keypair.eth_address(),
                    conflux_address: keypair.conflux_address(),
                })
            })
            .collect()
    }

    pub fn entropy(&self) -> &str {
        &self.entropy
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn hd_wallet(&self) -> &HdWallet {
        &self.wallet
    }

    fn require_active(&self) -> Result<&ActiveAccount> {
        self.active.as_ref().ok_or(Error::NoActiveAccount)
    }

    /// Ethereum signer for the active account and chain
    pub fn ethereum(&self) -> Result<EthereumSigner> {
        let active = self.require_active()?;
        Ok(EthereumSigner::new(active.keypair.clone(), active.chain_id))
    }

    /// Conflux signer for the active account
    pub fn conflux(&self) -> Result<ConfluxSigner> {
        let active = self.require_active()?;
        Ok(ConfluxSigner::new(
            active.keypair.clone(),
            self.config.conflux.chain_id,
        ))
    }

    /// Ethereum signer connected to the active chain's node
    pub fn ethereum_client(&self) -> Result<EthereumClient> {
        let signer = self.ethereum()?;
        let transport = self.endpoints.ethereum(signer.chain_id()).ok_or_else(|| {
            Error::UnsupportedChain(format!("no RPC endpoint for chain {}", signer.chain_id()))
        })?;
        Ok(EthereumClient::new(signer, transport))
    }

    /// Conflux signer connected to the Conflux node
    pub fn conflux_client(&self) -> Result<ConfluxClient> {
        let signer = self.conflux()?;
        let transport = self
            .endpoints
            .conflux()
            .ok_or_else(|| Error::UnsupportedChain("no Conflux RPC endpoint".into()))?;
        Ok(ConfluxClient::new(signer, transport))
    }
}
