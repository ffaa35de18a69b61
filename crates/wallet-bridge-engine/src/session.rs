//! Session state
//!
//! One session per dApp connection: the active chain and account, the
//! connector handle, and the ordered queue of requests awaiting approval.
//! Every state mutation goes through [`Session::update`], which notifies
//! subscribers.

use crate::request::{JsonRpcRequest, RequestId};
use crate::transport::Connector;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Mutable session fields
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub chain_id: u64,
    pub active_index: u32,
    /// Checksummed address of the active account
    pub address: Option<String>,
    /// Requests awaiting approval, oldest first
    pub requests: Vec<JsonRpcRequest>,
}

/// Read-only view of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub chain_id: u64,
    pub active_index: u32,
    pub address: Option<String>,
    pub connected: bool,
    pub pending: usize,
    pub polling: Vec<RequestId>,
}

/// Events broadcast to session observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// State changed through `update`
    Updated { pending: usize },
    /// Connector attached or detached
    ConnectorChanged { connected: bool },
    /// Confirmation poll started
    PollStarted { id: RequestId },
    /// Confirmation poll ended
    PollFinished { id: RequestId },
}

/// One registered confirmation poll
#[derive(Debug, Clone)]
pub struct PollTicket {
    generation: u64,
    token: CancellationToken,
}

impl PollTicket {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// A dApp session
pub struct Session {
    state: RwLock<SessionState>,
    connector: RwLock<Option<Arc<dyn Connector>>>,
    polls: Mutex<HashMap<RequestId, PollTicket>>,
    next_poll: AtomicU64,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &*self.state.read())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(chain_id: u64, active_index: u32) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            state: RwLock::new(SessionState {
                chain_id,
                active_index,
                ..Default::default()
            }),
            connector: RwLock::new(None),
            polls: Mutex::new(HashMap::new()),
            next_poll: AtomicU64::new(0),
            events,
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Connector
    // ========================================================================

    pub fn set_connector(&self, connector: Arc<dyn Connector>) {
        *self.connector.write() = Some(connector);
        let _ = self
            .events
            .send(SessionEvent::ConnectorChanged { connected: true });
    }

    pub fn clear_connector(&self) {
        *self.connector.write() = None;
        let _ = self
            .events
            .send(SessionEvent::ConnectorChanged { connected: false });
    }

    pub fn connector(&self) -> Option<Arc<dyn Connector>> {
        self.connector.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connector.read().is_some()
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Apply `f` to the state and notify observers
    pub fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let (result, pending) = {
            let mut state = self.state.write();
            let result = f(&mut state);
            (result, state.requests.len())
        };
        let _ = self.events.send(SessionEvent::Updated { pending });
        result
    }

    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn chain_id(&self) -> u64 {
        self.state.read().chain_id
    }

    pub fn active_index(&self) -> u32 {
        self.state.read().active_index
    }

    pub fn address(&self) -> Option<String> {
        self.state.read().address.clone()
    }

    /// Record the active account
    pub fn set_account(&self, index: u32, chain_id: u64, address: impl Into<String>) {
        let address = address.into();
        self.update(|state| {
            state.active_index = index;
            state.chain_id = chain_id;
            state.address = Some(address);
        });
    }

    /// Append to the approval queue; returns the queue length
    pub fn enqueue(&self, request: JsonRpcRequest) -> usize {
        self.update(|state| {
            state.requests.push(request);
            state.requests.len()
        })
    }

    /// Take a request off the approval queue
    pub fn remove(&self, id: &RequestId) -> Option<JsonRpcRequest> {
        self.take(id).map(|(_, request)| request)
    }

    /// Take a request off the approval queue along with its position
    pub fn take(&self, id: &RequestId) -> Option<(usize, JsonRpcRequest)> {
        self.update(|state| {
            let position = state.requests.iter().position(|r| &r.id == id)?;
            Some((position, state.requests.remove(position)))
        })
    }

    /// Put a taken request back at `position`, or at the end if the queue shrank
    pub fn restore(&self, position: usize, request: JsonRpcRequest) {
        self.update(|state| {
            let position = position.min(state.requests.len());
            state.requests.insert(position, request);
        });
    }

    pub fn get(&self, id: &RequestId) -> Option<JsonRpcRequest> {
        self.state
            .read()
            .requests
            .iter()
            .find(|r| &r.id == id)
            .cloned()
    }

    pub fn pending(&self) -> Vec<JsonRpcRequest> {
        self.state.read().requests.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read();
        let mut polling: Vec<RequestId> = self.polls.lock().keys().cloned().collect();
        polling.sort();
        SessionSnapshot {
            chain_id: state.chain_id,
            active_index: state.active_index,
            address: state.address.clone(),
            connected: self.is_connected(),
            pending: state.requests.len(),
            polling,
        }
    }

    // ========================================================================
    // Confirmation polls
    // ========================================================================

    /// Register a poll for `id`, cancelling any earlier poll under the same id
    pub fn register_poll(&self, id: &RequestId) -> PollTicket {
        let ticket = PollTicket {
            generation: self.next_poll.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        };
        if let Some(previous) = self.polls.lock().insert(id.clone(), ticket.clone()) {
            previous.token.cancel();
        }
        let _ = self.events.send(SessionEvent::PollStarted { id: id.clone() });
        ticket
    }

    /// Forget the poll for `id` if `ticket` is still the registered one
    pub fn finish_poll(&self, id: &RequestId, ticket: &PollTicket) {
        let removed = {
            let mut polls = self.polls.lock();
            match polls.get(id) {
                Some(current) if current.generation == ticket.generation => {
                    polls.remove(id);
                    true
                }
                _ => false,
            }
        };
        if removed {
            let _ = self.events.send(SessionEvent::PollFinished { id: id.clone() });
        }
    }

    /// Cancel the poll for `id`; false when none is running
    pub fn cancel(&self, id: &RequestId) -> bool {
        match self.polls.lock().get(id) {
            Some(ticket) => {
                ticket.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_polling(&self, id: &RequestId) -> bool {
        self.polls.lock().contains_key(id)
    }
}
