//! Request signing
//!
//! Runs an approved request against the key controller and answers the dApp
//! with exactly one approval or rejection. Address-checked methods compare the
//! requested account with the session's active address before the controller
//! is locked, so a mismatch never reaches a key operation.

use crate::request::{JsonRpcRequest, WalletRequest};
use crate::session::Session;
use crate::transport::{ApprovedResponse, RejectedResponse};
use crate::{EngineError, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use wallet_bridge_core::{CfxTransactionRequest, EthTransactionRequest, KeyController};

/// What the signer answered
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignOutcome {
    Approved { result: Value },
    Rejected { message: String },
}

impl SignOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, SignOutcome::Approved { .. })
    }
}

/// Executes approved requests
#[derive(Clone)]
pub struct RequestSigner {
    controller: Arc<Mutex<KeyController>>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner").finish_non_exhaustive()
    }
}

impl RequestSigner {
    pub fn new(controller: Arc<Mutex<KeyController>>) -> Self {
        Self { controller }
    }

    /// Execute `request` and deliver its outcome on the session's connector
    pub async fn sign(&self, request: &JsonRpcRequest, session: &Session) -> Result<SignOutcome> {
        let connector = session.connector().ok_or(EngineError::NoConnector)?;

        let outcome = match self.execute(request, session).await {
            Ok(result) => {
                info!(id = %request.id, method = %request.method, "Request signed");
                connector
                    .approve_request(ApprovedResponse {
                        id: request.id.clone(),
                        result: result.clone(),
                    })
                    .await?;
                SignOutcome::Approved { result }
            }
            Err(e) => {
                warn!(id = %request.id, method = %request.method, error = %e, "Request rejected");
                let message = e.rejection_message();
                connector
                    .reject_request(RejectedResponse::new(request.id.clone(), message.clone()))
                    .await?;
                SignOutcome::Rejected { message }
            }
        };
        Ok(outcome)
    }

    /// Run the key operation for `request`; the value is the result sent to the dApp
    pub async fn execute(&self, request: &JsonRpcRequest, session: &Session) -> Result<Value> {
        let decoded = WalletRequest::decode(request)?;

        if decoded.is_address_checked() {
            check_address(decoded.requested_address(), session.address().as_deref())?;
        }

        let mut controller = self.controller.lock().await;
        if !controller.is_active() {
            let index = session.active_index();
            let chain_id = session.chain_id();
            let address = controller
                .update(index, chain_id)
                .map_err(|e| {
                    warn!(error = %e, "Failed to activate account");
                    EngineError::NoActiveAccount
                })?
                .address();
            if session.address().is_none() {
                session.set_account(index, chain_id, address);
            }
        }

        debug!(method = decoded.method(), chain = %decoded.chain_kind(), "Dispatching");
        match decoded {
            WalletRequest::EthSendTransaction(tx) => {
                let hash = controller.ethereum_client()?.send_transaction(&tx).await?;
                Ok(Value::String(hash))
            }
            WalletRequest::EthSignTransaction(tx) => {
                let tx = if eth_is_complete(&tx) {
                    tx.normalized()
                } else {
                    controller.ethereum_client()?.populate(&tx).await?
                };
                Ok(Value::String(controller.ethereum()?.sign_transaction(&tx)?))
            }
            WalletRequest::EthSign { digest, .. } => {
                Ok(Value::String(controller.ethereum()?.sign_digest(&digest)?))
            }
            WalletRequest::PersonalSign { message, .. } => Ok(Value::String(
                controller.ethereum()?.sign_personal_message(&message)?,
            )),
            WalletRequest::CfxSendTransaction(tx) => {
                let hash = controller.conflux_client()?.send_transaction(&tx).await?;
                Ok(Value::String(hash))
            }
            WalletRequest::CfxSignTransaction(tx) => {
                let tx = if cfx_is_complete(&tx) {
                    tx
                } else {
                    controller.conflux_client()?.populate(&tx).await?
                };
                Ok(Value::String(controller.conflux()?.sign_transaction(&tx)?))
            }
            WalletRequest::CfxSign { message } => {
                let signed = controller.conflux()?.sign_message(&message)?;
                Ok(serde_json::to_value(signed)?)
            }
            other => Err(EngineError::UnsupportedMethod(other.method().to_string())),
        }
    }
}

/// Case-insensitive match; a missing address never matches
fn check_address(requested: Option<&str>, active: Option<&str>) -> Result<()> {
    match (requested, active) {
        (Some(requested), Some(active)) if requested.eq_ignore_ascii_case(active) => Ok(()),
        (requested, active) => Err(EngineError::AddressMismatch {
            requested: requested.unwrap_or_default().to_string(),
            active: active.unwrap_or_default().to_string(),
        }),
    }
}

fn eth_is_complete(tx: &EthTransactionRequest) -> bool {
    tx.nonce.is_some() && tx.gas_price.is_some() && tx.requested_gas().is_some()
}

fn cfx_is_complete(tx: &CfxTransactionRequest) -> bool {
    tx.nonce.is_some()
        && tx.gas_price.is_some()
        && tx.gas.is_some()
        && tx.storage_limit.is_some()
        && tx.epoch_height.is_some()
}
