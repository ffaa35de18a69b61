//! # Wallet Bridge Engine
//!
//! Request handling for a wallet that answers dApp JSON-RPC requests on
//! Ethereum and Conflux.
//!
//! ## Features
//!
//! - **Classification**: namespace filter over method names
//! - **Routing**: forward, poll for confirmation, or queue for approval
//! - **Rendering**: labelled fields for the approval prompt
//! - **Signing**: dispatch of approved requests to the key controller
//! - **Channels**: single payment channel keyed from the wallet mnemonic
//! - **HTTP Server**: REST approval flow (feature `server`)
//!
//! ## Request Flow
//!
//! ```text
//! dApp ──► classifier ──► router ──┬──► custom RPC ──► approve / reject
//!                                  ├──► confirmation poll ──► approve / reject
//!                                  └──► queue ──► renderer ──► user
//!                                                              │
//!                                    approve / reject ◄── signer ◄┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wallet_bridge_engine::{JsonRpcRequest, RecordingConnector, WalletBridge};
//!
//! let bridge = WalletBridge::from_config(config).await?;
//! bridge.connect(Arc::new(RecordingConnector::new()));
//!
//! let action = bridge.route(JsonRpcRequest::new(1, "personal_sign", params)).await?;
//! let outcome = bridge.approve(&1.into()).await?;
//! ```

pub mod classifier;
pub mod error;
pub mod renderer;
pub mod request;

#[cfg(feature = "runtime")]
pub mod bridge;
#[cfg(feature = "runtime")]
pub mod channel;
#[cfg(feature = "runtime")]
pub mod poll;
#[cfg(feature = "runtime")]
pub mod remote;
#[cfg(feature = "runtime")]
pub mod router;
#[cfg(feature = "runtime")]
pub mod session;
#[cfg(feature = "runtime")]
pub mod signer;
#[cfg(feature = "runtime")]
pub mod transport;

#[cfg(feature = "server")]
pub mod server;

pub use classifier::{is_bridge_request, is_channel_request, is_signing_method};
pub use error::{EngineError, Result};
pub use renderer::{RenderField, render_request};
pub use request::{JsonRpcRequest, RequestId, WalletRequest};

#[cfg(feature = "runtime")]
pub use bridge::{PendingRequest, WalletBridge};
#[cfg(feature = "runtime")]
pub use channel::{
    CF_PATH, ChannelConnector, ChannelCredentials, ChannelInfo, ChannelManager, ChannelProvider,
};
#[cfg(feature = "runtime")]
pub use poll::{PollConfig, PollOutcome, poll_confirmation};
#[cfg(feature = "runtime")]
pub use remote::{ConfluxLookup, CustomRpcResolver, HttpRpcResolver, TransactionLookup};
#[cfg(feature = "runtime")]
pub use router::{RequestRouter, RouteAction};
#[cfg(feature = "runtime")]
pub use session::{PollTicket, Session, SessionEvent, SessionSnapshot, SessionState};
#[cfg(feature = "runtime")]
pub use signer::{RequestSigner, SignOutcome};
#[cfg(feature = "runtime")]
pub use transport::{
    ApprovedResponse, Connector, RecordingConnector, RejectedResponse, ResponseOutcome,
};

#[cfg(feature = "server")]
pub use server::{ApiError, ApiResponse, BridgeServer};

/// Re-export core types for convenience
pub use wallet_bridge_core::{BridgeConfig, ChainKind};
