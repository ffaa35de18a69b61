//! Wallet bridge façade
//!
//! [`WalletBridge`] owns the key controller, the session and the router, and
//! exposes the full request lifecycle: route an inbound payload, render the
//! queue, approve or reject a queued request, switch accounts. Clones share
//! the same state.

use crate::channel::{ChannelInfo, ChannelManager};
use crate::error::USER_REJECTED;
use crate::poll::PollConfig;
use crate::remote::{ConfluxLookup, HttpRpcResolver};
use crate::renderer::{RenderField, render_request};
use crate::request::{JsonRpcRequest, RequestId};
use crate::router::{RequestRouter, RouteAction};
use crate::session::{Session, SessionSnapshot};
use crate::signer::{RequestSigner, SignOutcome};
use crate::transport::{Connector, RejectedResponse};
use crate::{EngineError, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use wallet_bridge_core::{
    BridgeConfig, ChainEndpoints, DerivedAccount, FileSystemStore, KeyController, KeyValueStore,
    MemoryStore,
};

/// A queued request with its rendered fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingRequest {
    pub request: JsonRpcRequest,
    pub fields: Vec<RenderField>,
}

impl PendingRequest {
    fn new(request: JsonRpcRequest) -> Self {
        let fields = render_request(&request);
        Self { request, fields }
    }
}

/// Owns the controller, session and router of one dApp connection
#[derive(Clone)]
pub struct WalletBridge {
    controller: Arc<Mutex<KeyController>>,
    session: Arc<Session>,
    router: Arc<RequestRouter>,
    signer: RequestSigner,
}

impl std::fmt::Debug for WalletBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletBridge")
            .field("session", &self.session)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl WalletBridge {
    /// Activate the controller's default account and open a session on it
    pub fn new(mut controller: KeyController, router: RequestRouter) -> Result<Self> {
        if !controller.is_active() {
            controller.init()?;
        }
        let (index, chain_id, address) = {
            let active = controller.active().ok_or(EngineError::NoActiveAccount)?;
            (active.index, active.chain_id, active.address())
        };

        let session = Session::new(chain_id, index);
        session.set_account(index, chain_id, address.clone());
        info!(index, chain_id, address = %address, "Wallet bridge ready");

        let controller = Arc::new(Mutex::new(controller));
        Ok(Self {
            signer: RequestSigner::new(controller.clone()),
            controller,
            session: Arc::new(session),
            router: Arc::new(router),
        })
    }

    /// Build everything from configuration: store, endpoints, resolver,
    /// Conflux lookup and poll timing
    pub async fn from_config(config: BridgeConfig) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = match &config.storage.data_dir {
            Some(dir) => {
                let store = FileSystemStore::new(dir)?;
                match &config.storage.passphrase {
                    Some(passphrase) => Arc::new(store.with_passphrase(passphrase)?),
                    None => Arc::new(store),
                }
            }
            None => Arc::new(MemoryStore::new()),
        };
        let endpoints = ChainEndpoints::from_config(&config)?;

        let mut router = RequestRouter::new(Arc::new(HttpRpcResolver::from_config(&config)?))
            .with_poll_config(PollConfig::from(&config.poll));
        if let Some(transport) = endpoints.conflux() {
            router = router.with_lookup(Arc::new(ConfluxLookup::new(transport)));
        }

        let controller = KeyController::load(config, store, endpoints).await?;
        Self::new(controller, router)
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn controller(&self) -> &Arc<Mutex<KeyController>> {
        &self.controller
    }

    pub fn router(&self) -> &RequestRouter {
        &self.router
    }

    /// Attach the dApp transport
    pub fn connect(&self, connector: Arc<dyn Connector>) {
        self.session.set_connector(connector);
    }

    pub fn disconnect(&self) {
        self.session.clear_connector();
    }

    // ========================================================================
    // Request lifecycle
    // ========================================================================

    /// Route a payload, waiting for any confirmation poll to finish
    pub async fn route(&self, request: JsonRpcRequest) -> Result<RouteAction> {
        self.router.route(request, &self.session).await
    }

    /// Route a payload; confirmation polls run in the background and
    /// report [`RouteAction::Polling`]
    pub async fn submit(&self, request: JsonRpcRequest) -> Result<RouteAction> {
        if RequestRouter::is_confirmation(&request) && self.session.is_connected() {
            let bridge = self.clone();
            tokio::spawn(async move {
                let id = request.id.clone();
                if let Err(e) = bridge.route(request).await {
                    warn!(id = %id, error = %e, "Confirmation poll failed to deliver");
                }
            });
            return Ok(RouteAction::Polling);
        }
        self.route(request).await
    }

    pub fn pending(&self) -> Vec<PendingRequest> {
        self.session
            .pending()
            .into_iter()
            .map(PendingRequest::new)
            .collect()
    }

    /// Rendered fields of a queued request
    pub fn render(&self, id: &RequestId) -> Result<PendingRequest> {
        self.session
            .get(id)
            .map(PendingRequest::new)
            .ok_or_else(|| EngineError::RequestNotFound(id.to_string()))
    }

    /// User approval: take the request off the queue, sign and answer.
    ///
    /// The request is claimed before signing, so concurrent approvals or a
    /// racing rejection find it gone. Signing runs in its own task and
    /// completes even if the caller stops waiting. The request goes back to
    /// its queue position only when no outcome reached the connector.
    pub async fn approve(&self, id: &RequestId) -> Result<SignOutcome> {
        let (position, request) = self
            .session
            .take(id)
            .ok_or_else(|| EngineError::RequestNotFound(id.to_string()))?;

        let signer = self.signer.clone();
        let session = self.session.clone();
        let task = tokio::spawn(async move {
            let result = signer.sign(&request, &session).await;
            if let Err(e) = &result {
                warn!(id = %request.id, error = %e, "Outcome not delivered, request requeued");
                session.restore(position, request);
            }
            result
        });
        task.await
            .map_err(|e| EngineError::Transport(format!("signing task failed: {}", e)))?
    }

    /// User rejection of a queued request
    pub async fn reject(&self, id: &RequestId) -> Result<()> {
        let connector = self.session.connector().ok_or(EngineError::NoConnector)?;
        let (position, request) = self
            .session
            .take(id)
            .ok_or_else(|| EngineError::RequestNotFound(id.to_string()))?;
        info!(id = %request.id, method = %request.method, "Request rejected by user");
        let delivered = connector
            .reject_request(RejectedResponse::new(request.id.clone(), USER_REJECTED))
            .await;
        if delivered.is_err() {
            self.session.restore(position, request);
        }
        delivered
    }

    /// Cancel a running confirmation poll
    pub fn cancel(&self, id: &RequestId) -> bool {
        self.session.cancel(id)
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Switch the active account and chain, re-deriving the keypair
    pub async fn switch_account(&self, index: u32, chain_id: u64) -> Result<SessionSnapshot> {
        let address = {
            let mut controller = self.controller.lock().await;
            controller.update(index, chain_id)?.address()
        };
        self.session.set_account(index, chain_id, address);
        Ok(self.session.snapshot())
    }

    pub async fn accounts(&self, count: Option<u32>) -> Result<Vec<DerivedAccount>> {
        Ok(self.controller.lock().await.accounts(count)?)
    }

    // ========================================================================
    // Channel
    // ========================================================================

    fn channels(&self) -> Result<&Arc<ChannelManager>> {
        self.router.channels().ok_or(EngineError::NoActiveChannel)
    }

    /// Open the payment channel for the session's chain
    pub async fn create_channel(&self) -> Result<ChannelInfo> {
        let channels = self.channels()?;
        let wallet = self.controller.lock().await.hd_wallet().clone();
        channels.create_channel(&wallet, self.session.chain_id()).await
    }

    /// Forward a request to the active channel
    pub async fn channel_request(&self, request: &JsonRpcRequest) -> Result<Value> {
        self.channels()?.handle_request(request).await
    }
}
