//! Remote collaborators: custom-RPC passthrough and transaction lookup

use crate::request::JsonRpcRequest;
use crate::{EngineError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use wallet_bridge_core::{BridgeConfig, RpcClient, RpcTransport};

/// Answers non-signing requests from a remote node
#[async_trait]
pub trait CustomRpcResolver: Send + Sync {
    async fn resolve(&self, chain_id: u64, request: &JsonRpcRequest) -> Result<Value>;
}

/// Finds a transaction by hash; `Value::Null` while it is unknown
#[async_trait]
pub trait TransactionLookup: Send + Sync {
    async fn transaction_by_hash(&self, hash: &str) -> Result<Value>;
}

/// Passthrough to one JSON-RPC endpoint per chain
#[derive(Clone, Default)]
pub struct HttpRpcResolver {
    endpoints: HashMap<u64, Arc<dyn RpcTransport>>,
}

impl std::fmt::Debug for HttpRpcResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut chains: Vec<_> = self.endpoints.keys().collect();
        chains.sort();
        f.debug_struct("HttpRpcResolver")
            .field("chains", &chains)
            .finish()
    }
}

impl HttpRpcResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// One HTTP client per chain with a custom-RPC URL (explicit, or the
    /// chain's first Ethereum endpoint)
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        let mut resolver = Self::new();
        let chains = config.custom_rpc.keys().chain(config.ethereum_rpc.keys());
        for key in chains {
            let chain_id: u64 = key.parse().map_err(|_| {
                EngineError::Core(wallet_bridge_core::Error::InvalidConfig(format!(
                    "custom_rpc key is not a chain id: {}",
                    key
                )))
            })?;
            if resolver.endpoints.contains_key(&chain_id) {
                continue;
            }
            if let Some(url) = config.custom_rpc_url(chain_id) {
                let client = RpcClient::new(vec![url.to_string()])?;
                resolver = resolver.with_endpoint(chain_id, Arc::new(client));
            }
        }
        Ok(resolver)
    }

    pub fn with_endpoint(mut self, chain_id: u64, transport: Arc<dyn RpcTransport>) -> Self {
        self.endpoints.insert(chain_id, transport);
        self
    }

    pub fn chains(&self) -> Vec<u64> {
        let mut chains: Vec<u64> = self.endpoints.keys().copied().collect();
        chains.sort_unstable();
        chains
    }
}

#[async_trait]
impl CustomRpcResolver for HttpRpcResolver {
    async fn resolve(&self, chain_id: u64, request: &JsonRpcRequest) -> Result<Value> {
        let transport = self.endpoints.get(&chain_id).ok_or_else(|| {
            EngineError::Remote(format!("no custom RPC endpoint for chain {}", chain_id))
        })?;
        transport
            .request_value(&request.method, Value::Array(request.params.clone()))
            .await
            .map_err(|e| EngineError::Remote(e.to_string()))
    }
}

/// `cfx_getTransactionByHash` against a Conflux node
#[derive(Clone)]
pub struct ConfluxLookup {
    transport: Arc<dyn RpcTransport>,
}

impl ConfluxLookup {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl TransactionLookup for ConfluxLookup {
    async fn transaction_by_hash(&self, hash: &str) -> Result<Value> {
        Ok(self
            .transport
            .request_value("cfx_getTransactionByHash", serde_json::json!([hash]))
            .await?)
    }
}
