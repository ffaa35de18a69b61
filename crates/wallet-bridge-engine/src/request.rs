//! Inbound JSON-RPC payloads
//!
//! [`JsonRpcRequest`] is the payload as received: opaque apart from `id`,
//! `method` and positional `params`. [`WalletRequest`] is the typed view the
//! signer dispatches on, decoded at the boundary so malformed params surface
//! as [`EngineError::InvalidParams`] instead of failing deep in a signer.

use crate::classifier::is_channel_request;
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use wallet_bridge_core::{CfxTransactionRequest, ChainKind, EthTransactionRequest};

/// JSON-RPC request id, numeric or string
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{}", s),
        }
    }
}

impl RequestId {
    /// Digits parse as a numeric id, anything else is a string id
    pub fn parse(raw: &str) -> Self {
        raw.parse::<u64>()
            .map(RequestId::Number)
            .unwrap_or_else(|_| RequestId::String(raw.to_string()))
    }
}

impl FromStr for RequestId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        RequestId::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::String(id.to_string())
    }
}

fn default_jsonrpc() -> String {
    "2.0".to_string()
}

/// A dApp request as received from the connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub id: RequestId,
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            jsonrpc: default_jsonrpc(),
            method: method.into(),
            params,
        }
    }

    /// Decode a payload, rejecting anything without `id` and `method`
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| EngineError::InvalidParams(e.to_string()))
    }

    pub fn from_json(source: &str) -> Result<Self> {
        serde_json::from_str(source).map_err(|e| EngineError::InvalidParams(e.to_string()))
    }

    /// Positional parameter `index`
    pub fn param(&self, index: usize) -> Option<&Value> {
        self.params.get(index)
    }

    /// Chain model the method belongs to
    pub fn chain_kind(&self) -> ChainKind {
        ChainKind::from_method(&self.method)
    }
}

/// Typed view of a request, one variant per method the signer serves
#[derive(Debug, Clone, PartialEq)]
pub enum WalletRequest {
    EthSendTransaction(EthTransactionRequest),
    EthSignTransaction(EthTransactionRequest),
    /// `eth_sign [address, digest]`
    EthSign { address: String, digest: String },
    /// `personal_sign [message, address]`
    PersonalSign { message: String, address: String },
    CfxSendTransaction(CfxTransactionRequest),
    CfxSignTransaction(CfxTransactionRequest),
    CfxSign { message: String },
    CfxGetTransactionByHash { hash: String },
    /// Channel-provider passthrough
    Channel { method: String, params: Vec<Value> },
    Other { method: String, params: Vec<Value> },
}

impl WalletRequest {
    pub fn decode(request: &JsonRpcRequest) -> Result<Self> {
        let decoded = match request.method.as_str() {
            "eth_sendTransaction" => Self::EthSendTransaction(object_param(request, 0)?),
            "eth_signTransaction" => Self::EthSignTransaction(object_param(request, 0)?),
            "eth_sign" => Self::EthSign {
                address: string_param(request, 0)?,
                digest: string_param(request, 1)?,
            },
            "personal_sign" => Self::PersonalSign {
                message: string_param(request, 0)?,
                address: string_param(request, 1)?,
            },
            "cfx_sendTransaction" => Self::CfxSendTransaction(object_param(request, 0)?),
            "cfx_signTransaction" => Self::CfxSignTransaction(object_param(request, 0)?),
            "cfx_sign" => Self::CfxSign {
                message: string_param(request, 0)?,
            },
            "cfx_getTransactionByHash" => Self::CfxGetTransactionByHash {
                hash: string_param(request, 0)?,
            },
            method if is_channel_request(method) => Self::Channel {
                method: method.to_string(),
                params: request.params.clone(),
            },
            method => Self::Other {
                method: method.to_string(),
                params: request.params.clone(),
            },
        };
        Ok(decoded)
    }

    pub fn method(&self) -> &str {
        match self {
            Self::EthSendTransaction(_) => "eth_sendTransaction",
            Self::EthSignTransaction(_) => "eth_signTransaction",
            Self::EthSign { .. } => "eth_sign",
            Self::PersonalSign { .. } => "personal_sign",
            Self::CfxSendTransaction(_) => "cfx_sendTransaction",
            Self::CfxSignTransaction(_) => "cfx_signTransaction",
            Self::CfxSign { .. } => "cfx_sign",
            Self::CfxGetTransactionByHash { .. } => "cfx_getTransactionByHash",
            Self::Channel { method, .. } | Self::Other { method, .. } => method,
        }
    }

    /// Whether the request names an account that must be the active one
    pub fn is_address_checked(&self) -> bool {
        matches!(
            self,
            Self::EthSendTransaction(_)
                | Self::EthSignTransaction(_)
                | Self::EthSign { .. }
                | Self::PersonalSign { .. }
        )
    }

    /// Account named by an address-checked request; `None` when absent
    pub fn requested_address(&self) -> Option<&str> {
        match self {
            Self::EthSendTransaction(tx) | Self::EthSignTransaction(tx) => tx.from.as_deref(),
            Self::EthSign { address, .. } | Self::PersonalSign { address, .. } => Some(address),
            _ => None,
        }
    }

    pub fn chain_kind(&self) -> ChainKind {
        ChainKind::from_method(self.method())
    }
}

fn missing(request: &JsonRpcRequest, index: usize) -> EngineError {
    EngineError::InvalidParams(format!("{} expects params[{}]", request.method, index))
}

fn string_param(request: &JsonRpcRequest, index: usize) -> Result<String> {
    match request.param(index) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(EngineError::InvalidParams(format!(
            "{} params[{}] must be a string, got {}",
            request.method, index, other
        ))),
        None => Err(missing(request, index)),
    }
}

fn object_param<T: DeserializeOwned>(request: &JsonRpcRequest, index: usize) -> Result<T> {
    let value = request.param(index).ok_or_else(|| missing(request, index))?;
    if !value.is_object() {
        return Err(EngineError::InvalidParams(format!(
            "{} params[{}] must be an object",
            request.method, index
        )));
    }
    serde_json::from_value(value.clone()).map_err(|e| {
        EngineError::InvalidParams(format!("{} params[{}]: {}", request.method, index, e))
    })
}
