//! Payment channel management
//!
//! A [`ChannelManager`] holds at most one active channel. The channel is keyed
//! by the wallet's BIP-32 node at [`CF_PATH`]: the hub receives that node's
//! xpub and signs through a key generator deriving children of it. Creating a
//! channel again replaces the previous one.

use crate::classifier::is_channel_request;
use crate::request::JsonRpcRequest;
use crate::{EngineError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use wallet_bridge_core::keys::{ExtendedKey, HdWallet};
use wallet_bridge_core::{ChainId, Keypair};

/// Derivation path of the channel node
pub const CF_PATH: &str = "m/44'/60'/0'/25446";

/// Key material handed to the channel hub
#[derive(Debug, Clone)]
pub struct ChannelCredentials {
    node: ExtendedKey,
    xpub: String,
}

impl ChannelCredentials {
    pub fn from_wallet(wallet: &HdWallet) -> Result<Self> {
        let node = wallet.extended_key(CF_PATH)?;
        let xpub = node.xpub();
        Ok(Self { node, xpub })
    }

    /// Extended public key of the channel node
    pub fn xpub(&self) -> &str {
        &self.xpub
    }

    /// Keypair at `index`, a path relative to the channel node (`"0"`, `"1/2"`)
    pub fn key_gen(&self, index: &str) -> Result<Keypair> {
        Ok(self.node.derive_relative(index)?.keypair())
    }
}

/// Provider of an open channel
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    async fn send(&self, method: &str, params: Vec<Value>) -> Result<Value>;
}

/// Opens channels against a hub
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(
        &self,
        network: &str,
        credentials: ChannelCredentials,
    ) -> Result<Arc<dyn ChannelProvider>>;
}

/// The open channel
pub struct ActiveChannel {
    pub network: String,
    pub xpub: String,
    provider: Arc<dyn ChannelProvider>,
}

impl std::fmt::Debug for ActiveChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveChannel")
            .field("network", &self.network)
            .field("xpub", &self.xpub)
            .finish_non_exhaustive()
    }
}

impl ActiveChannel {
    pub fn info(&self) -> ChannelInfo {
        ChannelInfo {
            network: self.network.clone(),
            xpub: self.xpub.clone(),
        }
    }
}

/// Public description of the open channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelInfo {
    pub network: String,
    pub xpub: String,
}

/// Owns the single active channel
pub struct ChannelManager {
    connector: Arc<dyn ChannelConnector>,
    active: RwLock<Option<Arc<ActiveChannel>>>,
    creating: tokio::sync::Mutex<()>,
}

impl ChannelManager {
    pub fn new(connector: Arc<dyn ChannelConnector>) -> Self {
        Self {
            connector,
            active: RwLock::new(None),
            creating: tokio::sync::Mutex::new(()),
        }
    }

    /// Open a channel for `chain_id`, replacing the active one.
    /// Concurrent calls run one after another.
    pub async fn create_channel(&self, wallet: &HdWallet, chain_id: u64) -> Result<ChannelInfo> {
        let _guard = self.creating.lock().await;

        let network = ChainId(chain_id).network().ok_or_else(|| {
            EngineError::Core(wallet_bridge_core::Error::UnsupportedChain(format!(
                "no channel network for chain {}",
                chain_id
            )))
        })?;
        let credentials = ChannelCredentials::from_wallet(wallet)?;
        let xpub = credentials.xpub().to_string();

        let provider = self.connector.connect(network, credentials).await?;
        let channel = Arc::new(ActiveChannel {
            network: network.to_string(),
            xpub,
            provider,
        });
        tracing::info!(network, xpub = %channel.xpub, "Channel created");

        let info = channel.info();
        *self.active.write() = Some(channel);
        Ok(info)
    }

    pub fn active(&self) -> Option<Arc<ActiveChannel>> {
        self.active.read().clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.read().is_some()
    }

    /// Forward a channel-provider request to the active channel
    pub async fn handle_request(&self, request: &JsonRpcRequest) -> Result<Value> {
        let channel = self.active().ok_or(EngineError::NoActiveChannel)?;
        if !is_channel_request(&request.method) {
            return Err(EngineError::InvalidParams(format!(
                "not a channel method: {}",
                request.method
            )));
        }
        channel
            .provider
            .send(&request.method, request.params.clone())
            .await
            .inspect_err(|e| tracing::error!(method = %request.method, error = %e, "Channel request failed"))
    }
}
