//! Request routing
//!
//! Decides, per inbound payload, whether to drop it, forward it to the remote
//! resolver, poll for a transaction confirmation, hand it to the channel
//! manager, or queue it for user approval. Policy, in order:
//!
//! 1. no connector attached: dropped
//! 2. `chan_*`: channel manager
//! 3. outside the bridge namespaces: ignored, no outcome sent
//! 4. `cfx_getTransactionByHash`: confirmation polling
//! 5. `cfx_*`: queued
//! 6. not a signing method: forwarded to the custom-RPC resolver
//! 7. signing method: queued

use crate::channel::ChannelManager;
use crate::classifier::{
    CONFIRMATION_METHOD, is_bridge_request, is_channel_request, is_conflux_method,
    is_signing_method,
};
use crate::error::{POLL_TIMED_OUT, REQUEST_CANCELLED, UNSUPPORTED_METHOD};
use crate::poll::{PollConfig, PollOutcome, poll_confirmation};
use crate::remote::{CustomRpcResolver, TransactionLookup};
use crate::request::{JsonRpcRequest, RequestId};
use crate::session::Session;
use crate::transport::{ApprovedResponse, Connector, RejectedResponse};
use crate::{EngineError, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What the router did with a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RouteAction {
    /// No connector; nothing was sent
    Dropped,
    /// Method outside the bridge namespaces; left for another handler
    Ignored,
    /// Appended to the approval queue
    Queued { position: usize },
    /// Answered with a result
    Approved,
    /// Answered with an error
    Rejected { message: String },
    /// Confirmation poll running in the background
    Polling,
}

/// Routes inbound payloads
pub struct RequestRouter {
    resolver: Arc<dyn CustomRpcResolver>,
    lookup: Option<Arc<dyn TransactionLookup>>,
    channels: Option<Arc<ChannelManager>>,
    poll: PollConfig,
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRouter")
            .field("lookup", &self.lookup.is_some())
            .field("channels", &self.channels.is_some())
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

impl RequestRouter {
    pub fn new(resolver: Arc<dyn CustomRpcResolver>) -> Self {
        Self {
            resolver,
            lookup: None,
            channels: None,
            poll: PollConfig::default(),
        }
    }

    /// Lookup used for `cfx_getTransactionByHash` polling
    pub fn with_lookup(mut self, lookup: Arc<dyn TransactionLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn with_channels(mut self, channels: Arc<ChannelManager>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn channels(&self) -> Option<&Arc<ChannelManager>> {
        self.channels.as_ref()
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Whether `request` resolves through confirmation polling
    pub fn is_confirmation(request: &JsonRpcRequest) -> bool {
        request.method == CONFIRMATION_METHOD
    }

    /// Route one payload. Errors only when the connector fails to deliver.
    pub async fn route(&self, request: JsonRpcRequest, session: &Session) -> Result<RouteAction> {
        let Some(connector) = session.connector() else {
            warn!(id = %request.id, method = %request.method, "No connector attached, dropping request");
            return Ok(RouteAction::Dropped);
        };
        let connector = connector.as_ref();
        let method = request.method.as_str();

        if is_channel_request(method) {
            debug!(id = %request.id, method, "Routing to channel manager");
            let result = match &self.channels {
                Some(channels) => channels.handle_request(&request).await,
                None => Err(EngineError::NoActiveChannel),
            };
            return respond(connector, request.id, result).await;
        }

        if !is_bridge_request(method) {
            debug!(id = %request.id, method, "Outside bridge namespaces, ignoring");
            return Ok(RouteAction::Ignored);
        }

        if method == CONFIRMATION_METHOD {
            return self.confirm(request, session, connector).await;
        }

        if is_conflux_method(method) || is_signing_method(method) {
            debug!(id = %request.id, method, "Queued for approval");
            let position = session.enqueue(request);
            return Ok(RouteAction::Queued { position });
        }

        debug!(id = %request.id, method, "Forwarding to custom RPC");
        match self.resolver.resolve(session.chain_id(), &request).await {
            Ok(result) => approve(connector, request.id, result).await,
            Err(e) => {
                error!(id = %request.id, method, error = %e, "Custom RPC request failed");
                reject(connector, request.id, UNSUPPORTED_METHOD).await
            }
        }
    }

    /// Poll until the transaction is mined, then answer with the lookup response
    async fn confirm(
        &self,
        request: JsonRpcRequest,
        session: &Session,
        connector: &dyn Connector,
    ) -> Result<RouteAction> {
        let hash = match request.param(0) {
            Some(Value::String(hash)) => hash.clone(),
            _ => {
                warn!(id = %request.id, "Confirmation request without a hash");
                return reject(connector, request.id, UNSUPPORTED_METHOD).await;
            }
        };
        let Some(lookup) = &self.lookup else {
            warn!(id = %request.id, "No Conflux node configured for confirmation polling");
            return reject(connector, request.id, UNSUPPORTED_METHOD).await;
        };

        let ticket = session.register_poll(&request.id);
        debug!(id = %request.id, hash = %hash, "Polling for confirmation");
        let outcome = poll_confirmation(lookup.as_ref(), &hash, &self.poll, ticket.token()).await;
        session.finish_poll(&request.id, &ticket);

        match outcome {
            PollOutcome::Confirmed(result) => approve(connector, request.id, result).await,
            PollOutcome::TimedOut { attempts } => {
                warn!(id = %request.id, attempts, "Confirmation timed out");
                reject(connector, request.id, POLL_TIMED_OUT).await
            }
            PollOutcome::Cancelled => {
                info!(id = %request.id, "Confirmation poll cancelled");
                reject(connector, request.id, REQUEST_CANCELLED).await
            }
        }
    }
}

async fn respond(
    connector: &dyn Connector,
    id: RequestId,
    result: Result<Value>,
) -> Result<RouteAction> {
    match result {
        Ok(value) => approve(connector, id, value).await,
        Err(e) => reject(connector, id, &e.rejection_message()).await,
    }
}

async fn approve(connector: &dyn Connector, id: RequestId, result: Value) -> Result<RouteAction> {
    info!(id = %id, "Approving request");
    connector
        .approve_request(ApprovedResponse { id, result })
        .await?;
    Ok(RouteAction::Approved)
}

async fn reject(connector: &dyn Connector, id: RequestId, message: &str) -> Result<RouteAction> {
    connector
        .reject_request(RejectedResponse::new(id, message))
        .await?;
    Ok(RouteAction::Rejected {
        message: message.to_string(),
    })
}
