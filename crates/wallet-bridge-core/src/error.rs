//! Error types for wallet bridge key and chain operations

use thiserror::Error;

/// Result type alias for wallet bridge core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while deriving keys, signing or talking to a chain
#[derive(Debug, Error)]
pub enum Error {
    // ============ Configuration Errors ============
    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ============ Key Derivation Errors ============
    /// Mnemonic, seed or path derivation failed
    #[error("Key derivation error: {0}")]
    Derivation(String),

    /// No keypair has been materialized by the controller
    #[error("No Active Account")]
    NoActiveAccount,

    // ============ Cryptographic Errors ============
    /// Cryptographic operation failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Invalid signature
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    // ============ Storage Errors ============
    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Encryption/decryption failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    // ============ Serialization Errors ============
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ============ Chain Errors ============
    /// Unsupported chain
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    /// Chain or RPC operation failed
    #[error("Chain error: {0}")]
    ChainError(String),

    /// Timeout waiting for the chain
    #[error("Timeout waiting for {0}")]
    Timeout(String),

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Deserialization(e.to_string())
    }
}

impl From<bip32::Error> for Error {
    fn from(e: bip32::Error) -> Self {
        Error::Derivation(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}
