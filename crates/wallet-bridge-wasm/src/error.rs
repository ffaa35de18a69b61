//! WASM-compatible error types

use thiserror::Error;
use wasm_bindgen::prelude::*;

use crate::utils::console_error;

/// Errors surfaced to JavaScript
#[derive(Debug, Error)]
pub enum WasmError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Key derivation error: {0}")]
    Derivation(String),
}

impl From<WasmError> for JsValue {
    fn from(err: WasmError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

impl From<wallet_bridge_core::Error> for WasmError {
    fn from(err: wallet_bridge_core::Error) -> Self {
        WasmError::Derivation(err.to_string())
    }
}

impl From<wallet_bridge_engine::EngineError> for WasmError {
    fn from(err: wallet_bridge_engine::EngineError) -> Self {
        WasmError::InvalidRequest(err.to_string())
    }
}

impl From<serde_json::Error> for WasmError {
    fn from(err: serde_json::Error) -> Self {
        WasmError::Serialization(err.to_string())
    }
}

/// Convert a Result to JsValue; errors are also logged to the console
pub fn to_js_result<T: serde::Serialize>(result: Result<T, WasmError>) -> Result<JsValue, JsValue> {
    match result {
        Ok(value) => serde_wasm_bindgen::to_value(&value)
            .map_err(|e| JsValue::from_str(&e.to_string())),
        Err(err) => {
            console_error(&err.to_string());
            Err(JsValue::from(err))
        }
    }
}
