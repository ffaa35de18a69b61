//! Connector seam between the engine and the dApp transport
//!
//! Every request the engine accepts ends in exactly one `approve_request` or
//! `reject_request` call on the session's connector.

use crate::Result;
use crate::request::RequestId;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// `approve_request` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovedResponse {
    pub id: RequestId,
    pub result: Value,
}

/// Error body of a rejection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorMessage {
    pub message: String,
}

/// `reject_request` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedResponse {
    pub id: RequestId,
    pub error: RpcErrorMessage,
}

impl RejectedResponse {
    pub fn new(id: RequestId, message: impl Into<String>) -> Self {
        Self {
            id,
            error: RpcErrorMessage {
                message: message.into(),
            },
        }
    }
}

/// Transport back to the dApp
#[async_trait]
pub trait Connector: Send + Sync {
    async fn approve_request(&self, response: ApprovedResponse) -> Result<()>;

    async fn reject_request(&self, response: RejectedResponse) -> Result<()>;
}

/// Outcome delivered for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseOutcome {
    Approved { id: RequestId, result: Value },
    Rejected { id: RequestId, error: RpcErrorMessage },
}

impl ResponseOutcome {
    pub fn id(&self) -> &RequestId {
        match self {
            ResponseOutcome::Approved { id, .. } | ResponseOutcome::Rejected { id, .. } => id,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ResponseOutcome::Approved { .. })
    }

    /// Rejection message, if rejected
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ResponseOutcome::Rejected { error, .. } => Some(&error.message),
            ResponseOutcome::Approved { .. } => None,
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match self {
            ResponseOutcome::Approved { result, .. } => Some(result),
            ResponseOutcome::Rejected { .. } => None,
        }
    }
}

/// Connector that keeps every outcome in memory, in delivery order
#[derive(Debug, Default)]
pub struct RecordingConnector {
    log: Mutex<Vec<ResponseOutcome>>,
    by_id: Mutex<HashMap<RequestId, ResponseOutcome>>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest outcome for `id`
    pub fn outcome(&self, id: &RequestId) -> Option<ResponseOutcome> {
        self.by_id.lock().get(id).cloned()
    }

    /// All outcomes in delivery order
    pub fn outcomes(&self) -> Vec<ResponseOutcome> {
        self.log.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    fn record(&self, outcome: ResponseOutcome) {
        self.by_id.lock().insert(outcome.id().clone(), outcome.clone());
        self.log.lock().push(outcome);
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn approve_request(&self, response: ApprovedResponse) -> Result<()> {
        tracing::debug!(id = %response.id, "Request approved");
        self.record(ResponseOutcome::Approved {
            id: response.id,
            result: response.result,
        });
        Ok(())
    }

    async fn reject_request(&self, response: RejectedResponse) -> Result<()> {
        tracing::debug!(id = %response.id, message = %response.error.message, "Request rejected");
        self.record(ResponseOutcome::Rejected {
            id: response.id,
            error: response.error,
        });
        Ok(())
    }
}
