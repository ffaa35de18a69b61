//! # Wallet Bridge Core
//!
//! Key management and chain signing for a wallet that answers dApp JSON-RPC
//! requests on two chain models.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Key Derivation**: 16-byte entropy, BIP-39 mnemonic, BIP-32 accounts under a configurable base path
//! - **Ethereum Signer**: legacy EIP-155 transactions, raw digest and EIP-191 message signatures
//! - **Conflux Signer**: Conflux transactions (storage limit, epoch height) and message signatures
//! - **Storage**: persisted entropy and mnemonic, optionally sealed with ChaCha20-Poly1305
//! - **Key Controller**: one active keypair for the selected `(index, chain_id)`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wallet_bridge_core::{BridgeConfig, ChainEndpoints, KeyController, MemoryStore};
//!
//! let config = BridgeConfig::default();
//! let endpoints = ChainEndpoints::from_config(&config)?;
//! let mut controller = KeyController::load(config, Arc::new(MemoryStore::new()), endpoints).await?;
//!
//! let account = controller.init()?;
//! let signature = controller.ethereum()?.sign_personal_message("hello")?;
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod keys;
pub mod types;

// Runtime-dependent modules (require tokio)
#[cfg(feature = "runtime")]
pub mod controller;
#[cfg(feature = "runtime")]
pub mod storage;

pub use chain::{
    CfxTransactionRequest, ChainId, ChainKind, ConfluxClient, ConfluxSigner, ConfluxTransaction,
    EthTransactionRequest, EthereumClient, EthereumSigner, LegacyTransaction, RpcTransport,
};
pub use config::{BridgeConfig, PollSettings};
pub use error::{Error, Result};
pub use keys::{ExtendedKey, HdWallet, Keypair};
pub use types::{Signature, keccak256_hash};

#[cfg(feature = "runtime")]
pub use chain::RpcClient;
#[cfg(feature = "runtime")]
pub use controller::{ActiveAccount, ChainEndpoints, DerivedAccount, KeyController};
#[cfg(feature = "runtime")]
pub use storage::{ENTROPY_KEY, FileSystemStore, KeyValueStore, MNEMONIC_KEY, MemoryStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
