//! Error types for the bridge engine

use thiserror::Error;

/// Rejection for methods the wallet cannot serve, and for unexpected failures
pub const UNSUPPORTED_METHOD: &str = "JSON RPC method not supported";
/// Rejection for signing requests naming another account
pub const ADDRESS_MISMATCH: &str = "Address requested does not match active account";
/// Rejection while no keypair is materialized
pub const NO_ACTIVE_ACCOUNT: &str = "No Active Account";
/// Rejection for channel requests before a channel exists
pub const NO_ACTIVE_CHANNEL: &str = "No Active Channel";
/// Rejection for requests the user declined
pub const USER_REJECTED: &str = "Failed or Rejected Request";
/// Rejection for confirmation polls that ran out of time
pub const POLL_TIMED_OUT: &str = "Transaction confirmation timed out";
/// Rejection for cancelled confirmation polls
pub const REQUEST_CANCELLED: &str = "Request cancelled";

/// Bridge engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed request parameters
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Method outside what the wallet serves
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    /// Requested account differs from the active one
    #[error("Address mismatch: requested {requested}, active {active}")]
    AddressMismatch { requested: String, active: String },

    /// No keypair is materialized
    #[error("No active account")]
    NoActiveAccount,

    /// No channel has been created
    #[error("No active channel")]
    NoActiveChannel,

    /// No transport connector attached to the session
    #[error("No transport connector attached")]
    NoConnector,

    /// Request id unknown to the session queue
    #[error("Request not found: {0}")]
    RequestNotFound(String),

    /// User declined the request
    #[error("Request rejected by user")]
    UserRejected,

    /// Connector failed to deliver an outcome
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote custom-RPC failure
    #[error("Remote error: {0}")]
    Remote(String),

    /// Confirmation poll exceeded its timeout
    #[error("Confirmation timed out after {attempts} attempts")]
    PollTimeout { attempts: u32 },

    /// Confirmation poll cancelled
    #[error("Request cancelled")]
    Cancelled,

    /// Channel provider failure; the message is passed through to the dApp
    #[error("{0}")]
    Channel(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Key controller or chain client error
    #[error(transparent)]
    Core(#[from] wallet_bridge_core::Error),
}

impl EngineError {
    /// Message sent to the dApp when this error ends a request
    pub fn rejection_message(&self) -> String {
        match self {
            EngineError::AddressMismatch { .. } => ADDRESS_MISMATCH.to_string(),
            EngineError::NoActiveAccount
            | EngineError::Core(wallet_bridge_core::Error::NoActiveAccount) => {
                NO_ACTIVE_ACCOUNT.to_string()
            }
            EngineError::NoActiveChannel => NO_ACTIVE_CHANNEL.to_string(),
            EngineError::UserRejected => USER_REJECTED.to_string(),
            EngineError::PollTimeout { .. } => POLL_TIMED_OUT.to_string(),
            EngineError::Cancelled => REQUEST_CANCELLED.to_string(),
            EngineError::Channel(message) => message.clone(),
            _ => UNSUPPORTED_METHOD.to_string(),
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::InvalidParams(_) => 400,
            EngineError::Serialization(_) => 400,
            EngineError::UnsupportedMethod(_) => 400,
            EngineError::AddressMismatch { .. } => 403,
            EngineError::RequestNotFound(_) => 404,
            EngineError::NoActiveAccount => 409,
            EngineError::NoActiveChannel => 409,
            EngineError::NoConnector => 409,
            EngineError::UserRejected => 409,
            EngineError::Cancelled => 409,
            EngineError::Transport(_) => 502,
            EngineError::Remote(_) => 502,
            EngineError::Channel(_) => 502,
            EngineError::PollTimeout { .. } => 504,
            EngineError::Core(wallet_bridge_core::Error::NoActiveAccount) => 409,
            EngineError::Core(wallet_bridge_core::Error::UnsupportedChain(_)) => 400,
            EngineError::Core(wallet_bridge_core::Error::InvalidConfig(_)) => 400,
            EngineError::Core(_) => 500,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<hex::FromHexError> for EngineError {
    fn from(err: hex::FromHexError) -> Self {
        EngineError::InvalidParams(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EngineError>;
