//! # Chain Models
//!
//! The bridge signs for two transaction models behind one dispatch surface:
//!
//! - **Ethereum** - account-based legacy (EIP-155) transactions and EIP-191 messages
//! - **Conflux** - transactions carrying storage limit and epoch height, `0x1`-typed addresses
//!
//! Both talk to their node through the [`RpcTransport`] trait so the signers
//! can be exercised against scripted transports in tests.
//!
//! ## Example
//!
//! ```rust,ignore
//! use wallet_bridge_core::chain::{ChainKind, RpcClient};
//!
//! let kind = ChainKind::from_method("cfx_sendTransaction");
//! let rpc = RpcClient::new(vec!["https://main.confluxrpc.com".into()])?;
//! let epoch: String = wallet_bridge_core::chain::call(&rpc, "cfx_epochNumber", json!([])).await?;
//! ```

pub mod conflux;
pub mod evm;

use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt;

pub use conflux::{CfxTransactionRequest, ConfluxClient, ConfluxSigner, ConfluxTransaction};
pub use evm::{EthTransactionRequest, EthereumClient, EthereumSigner, LegacyTransaction};

// ============================================================================
// Core Types
// ============================================================================

/// Blockchain identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    pub const ETHEREUM_MAINNET: ChainId = ChainId(1);
    pub const ROPSTEN: ChainId = ChainId(3);
    pub const RINKEBY: ChainId = ChainId(4);
    pub const GOERLI: ChainId = ChainId(5);
    pub const KOVAN: ChainId = ChainId(42);
    pub const XDAI: ChainId = ChainId(100);
    pub const POLYGON: ChainId = ChainId(137);
    pub const SEPOLIA: ChainId = ChainId(11155111);

    /// Get the display name for this chain
    pub fn name(&self) -> &'static str {
        match self.0 {
            1 => "Ethereum Mainnet",
            3 => "Ethereum Ropsten",
            4 => "Ethereum Rinkeby",
            5 => "Ethereum Goerli",
            42 => "Ethereum Kovan",
            100 => "xDAI Chain",
            137 => "Polygon",
            11155111 => "Ethereum Sepolia",
            _ => "Unknown Chain",
        }
    }

    /// Lowercase network identifier used by channel providers
    pub fn network(&self) -> Option<&'static str> {
        match self.0 {
            1 => Some("mainnet"),
            3 => Some("ropsten"),
            4 => Some("rinkeby"),
            5 => Some("goerli"),
            42 => Some("kovan"),
            100 => Some("xdai"),
            137 => Some("matic"),
            11155111 => Some("sepolia"),
            _ => None,
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        ChainId(id)
    }
}

/// Transaction/signing model a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    /// Ethereum-compatible chain
    Ethereum,
    /// Conflux-compatible chain
    Conflux,
}

impl ChainKind {
    /// Select the chain model from a method's namespace
    pub fn from_method(method: &str) -> Self {
        if method.starts_with("cfx_") {
            ChainKind::Conflux
        } else {
            ChainKind::Ethereum
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainKind::Ethereum => write!(f, "Ethereum"),
            ChainKind::Conflux => write!(f, "Conflux"),
        }
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// JSON-RPC transport to a chain node
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Issue a JSON-RPC call and return the raw `result` value
    async fn request_value(&self, method: &str, params: Value) -> Result<Value>;
}

/// Issue a JSON-RPC call and deserialize its result
pub async fn call<T: DeserializeOwned>(
    transport: &dyn RpcTransport,
    method: &str,
    params: Value,
) -> Result<T> {
    let value = transport.request_value(method, params).await?;
    serde_json::from_value(value)
        .map_err(|e| Error::ChainError(format!("Failed to deserialize {} result: {}", method, e)))
}

// ============================================================================
// RPC Client (requires runtime feature)
// ============================================================================

/// HTTP RPC client with failover support
#[cfg(feature = "runtime")]
#[derive(Clone)]
pub struct RpcClient {
    urls: Vec<String>,
    client: reqwest::Client,
    current_index: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    request_id: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

#[cfg(feature = "runtime")]
impl RpcClient {
    /// Create a new RPC client with failover URLs
    pub fn new(urls: Vec<String>) -> Result<Self> {
        if urls.is_empty() {
            return Err(Error::InvalidConfig("At least one RPC URL required".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::ChainError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            urls,
            client,
            current_index: std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0)),
            request_id: std::sync::Arc::new(std::sync::atomic::AtomicU64::new(1)),
        })
    }

    /// Configured endpoints in failover order
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    fn current_url(&self) -> &str {
        let idx = self
            .current_index
            .load(std::sync::atomic::Ordering::Relaxed);
        &self.urls[idx % self.urls.len()]
    }

    fn rotate_url(&self) {
        self.current_index
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    /// Make a JSON-RPC request with automatic failover
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        call(self, method, params).await
    }

    async fn make_request(&self, url: &str, method: &str, params: Value) -> Result<Value> {
        let id = self
            .request_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let request_body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });

        let response = self
            .client
            .post(url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::ChainError(format!("RPC request failed: {}", e)))?;

        let mut response_body: Value = response
            .json()
            .await
            .map_err(|e| Error::ChainError(format!("Failed to parse RPC response: {}", e)))?;

        if let Some(error) = response_body.get("error") {
            return Err(Error::ChainError(format!("RPC error: {}", error)));
        }

        response_body
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| Error::ChainError("Missing result in RPC response".into()))
    }
}

#[cfg(feature = "runtime")]
#[async_trait]
impl RpcTransport for RpcClient {
    async fn request_value(&self, method: &str, params: Value) -> Result<Value> {
        let mut last_error = None;

        for _ in 0..self.urls.len() {
            let url = self.current_url();

            match self.make_request(url, method, params.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    tracing::warn!("RPC request {} failed on {}: {}", method, url, e);
                    last_error = Some(e);
                    self.rotate_url();
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::ChainError("All RPC endpoints failed".into())))
    }
}

#[cfg(feature = "runtime")]
impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("urls", &self.urls)
            .field(
                "current_index",
                &self
                    .current_index
                    .load(std::sync::atomic::Ordering::Relaxed),
            )
            .finish()
    }
}
