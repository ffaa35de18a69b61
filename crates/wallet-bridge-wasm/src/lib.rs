//! WASM bindings for the wallet bridge
//!
//! Browser-side access to the parts of the bridge that need no node or
//! runtime: request classification, approval-prompt rendering, payload
//! validation and account derivation.
//!
//! ## Features
//!
//! - `classify(method)` - Namespace, signing and channel predicates
//! - `renderRequest(payload)` - Labelled fields for the approval prompt
//! - `validateRequest(payload)` - Typed decode of a JSON-RPC payload
//! - `deriveAccounts(mnemonic, count, basePath?)` - BIP-32 accounts
//!
//! ## Usage (JavaScript/TypeScript)
//!
//! ```javascript
//! import init, { isBridgeRequest, renderRequest } from 'wallet-bridge-wasm';
//!
//! await init();
//!
//! if (isBridgeRequest(payload.method)) {
//!   const fields = renderRequest(JSON.stringify(payload));
//!   fields.forEach(({ label, value }) => console.log(label, value));
//! }
//! ```

use serde::Serialize;
use wasm_bindgen::prelude::*;
use wallet_bridge_core::config::DEFAULT_DERIVATION_PATH;
use wallet_bridge_core::keys::{HdWallet, account_path};
use wallet_bridge_core::types::{decode_hex, encode_hex, keccak256_hash};
use wallet_bridge_engine::classifier::{is_conflux_method, namespace};
use wallet_bridge_engine::{
    JsonRpcRequest, RenderField, WalletRequest, is_bridge_request, is_channel_request,
    is_signing_method, render_request,
};

mod error;
mod utils;

pub use error::{WasmError, to_js_result};

/// Initialize the WASM module with optional panic hook
#[wasm_bindgen(start)]
pub fn init() {
    utils::set_panic_hook();
    utils::console_log(&format!("wallet-bridge-wasm v{}", env!("CARGO_PKG_VERSION")));
}

/// Get the SDK version
#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// ============================================================================
// Classification
// ============================================================================

/// Predicates over one method name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub method: String,
    pub namespace: Option<String>,
    pub bridge: bool,
    pub signing: bool,
    pub conflux: bool,
    pub channel: bool,
}

pub fn classify_method(method: &str) -> Classification {
    Classification {
        method: method.to_string(),
        namespace: namespace(method).map(str::to_string),
        bridge: is_bridge_request(method),
        signing: is_signing_method(method),
        conflux: is_conflux_method(method),
        channel: is_channel_request(method),
    }
}

#[wasm_bindgen(js_name = isBridgeRequest)]
pub fn is_bridge_request_js(method: &str) -> bool {
    is_bridge_request(method)
}

#[wasm_bindgen(js_name = isSigningMethod)]
pub fn is_signing_method_js(method: &str) -> bool {
    is_signing_method(method)
}

#[wasm_bindgen]
pub fn classify(method: &str) -> Result<JsValue, JsValue> {
    to_js_result(Ok(classify_method(method)))
}

// ============================================================================
// Rendering and validation
// ============================================================================

pub fn render_payload(payload: &str) -> Result<Vec<RenderField>, WasmError> {
    let request = JsonRpcRequest::from_json(payload)?;
    Ok(render_request(&request))
}

/// Typed view of a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedRequest {
    pub method: String,
    pub chain: String,
    pub address_checked: bool,
    pub requested_address: Option<String>,
}

pub fn validate_payload(payload: &str) -> Result<ValidatedRequest, WasmError> {
    let request = JsonRpcRequest::from_json(payload)?;
    if !is_bridge_request(&request.method) && !is_channel_request(&request.method) {
        return Err(WasmError::InvalidRequest(format!(
            "method outside bridge namespaces: {}",
            request.method
        )));
    }
    let decoded = WalletRequest::decode(&request)?;
    Ok(ValidatedRequest {
        method: decoded.method().to_string(),
        chain: decoded.chain_kind().to_string(),
        address_checked: decoded.is_address_checked(),
        requested_address: decoded.requested_address().map(str::to_string),
    })
}

/// Render a JSON-RPC payload (JSON text) to `[{label, value}]`
#[wasm_bindgen(js_name = renderRequest)]
pub fn render_request_js(payload: &str) -> Result<JsValue, JsValue> {
    to_js_result(render_payload(payload))
}

/// Decode a JSON-RPC payload, failing on malformed params
#[wasm_bindgen(js_name = validateRequest)]
pub fn validate_request_js(payload: &str) -> Result<JsValue, JsValue> {
    to_js_result(validate_payload(payload))
}

// ============================================================================
// Accounts
// ============================================================================

/// One derived account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub index: u32,
    pub path: String,
    pub address: String,
    pub conflux_address: String,
}

pub fn derive_accounts_from(
    mnemonic: &str,
    count: u32,
    base_path: Option<&str>,
) -> Result<Vec<Account>, WasmError> {
    let base_path = base_path.unwrap_or(DEFAULT_DERIVATION_PATH);
    if !base_path.starts_with("m/") {
        return Err(WasmError::InvalidArgument(format!(
            "derivation path must start with m/: {}",
            base_path
        )));
    }
    let wallet = HdWallet::from_mnemonic(mnemonic)?;
    (0..count)
        .map(|index| {
            let path = account_path(base_path, index);
            let keypair = wallet.derive(&path)?;
            Ok(Account {
                index,
                path,
                address: keypair.eth_address(),
                conflux_address: keypair.conflux_address(),
            })
        })
        .collect()
}

/// Derive `count` accounts under `basePath` (default `m/44'/60'/0'/0`)
#[wasm_bindgen(js_name = deriveAccounts)]
pub fn derive_accounts_js(
    mnemonic: &str,
    count: u32,
    base_path: Option<String>,
) -> Result<JsValue, JsValue> {
    to_js_result(derive_accounts_from(mnemonic, count, base_path.as_deref()))
}

// ============================================================================
// Hex and hashing helpers
// ============================================================================

/// Utility function to convert hex string to bytes
#[wasm_bindgen(js_name = hexToBytes)]
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, JsValue> {
    decode_hex(hex).map_err(|e| JsValue::from_str(&format!("Invalid hex: {}", e)))
}

/// Utility function to convert bytes to hex string
#[wasm_bindgen(js_name = bytesToHex)]
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    encode_hex(bytes)
}

/// Keccak-256 digest
#[wasm_bindgen]
pub fn keccak256(data: &[u8]) -> Vec<u8> {
    keccak256_hash(data).to_vec()
}
