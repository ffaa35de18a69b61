//! HTTP approval server
//!
//! Exposes a [`WalletBridge`] over REST so a UI can list, inspect, approve
//! and reject queued requests. Outcomes go to a built-in
//! [`RecordingConnector`] and can be read back per request id.
//!
//! ## Production Features
//!
//! - Graceful shutdown on SIGTERM/SIGINT
//! - Request timeout middleware
//! - CORS configuration
//! - Request tracing

use crate::{
    EngineError, JsonRpcRequest, PendingRequest, RecordingConnector, RequestId, RouteAction,
    SessionSnapshot, SignOutcome, WalletBridge,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use wallet_bridge_core::config::ServerConfig;
use wallet_bridge_core::DerivedAccount;

/// Application state shared across handlers
pub struct AppState {
    pub bridge: WalletBridge,
    /// Connector receiving every outcome
    pub responses: Arc<RecordingConnector>,
    pub started_at: Instant,
    pub config: ServerConfig,
}

/// HTTP front end of a wallet bridge
pub struct BridgeServer {
    state: Arc<AppState>,
}

impl BridgeServer {
    /// Attach a recording connector to `bridge` and serve it
    pub fn new(bridge: WalletBridge, config: ServerConfig) -> Self {
        let responses = Arc::new(RecordingConnector::new());
        bridge.connect(responses.clone());

        Self {
            state: Arc::new(AppState {
                bridge,
                responses,
                started_at: Instant::now(),
                config,
            }),
        }
    }

    pub fn bridge(&self) -> &WalletBridge {
        &self.state.bridge
    }

    pub fn responses(&self) -> &Arc<RecordingConnector> {
        &self.state.responses
    }

    /// Build the router
    pub fn router(&self) -> Router {
        let state = Arc::clone(&self.state);
        let timeout = Duration::from_secs(self.state.config.request_timeout_secs);

        let mut router = Router::new()
            .route("/health", get(health))
            // Requests
            .route("/v1/requests", post(submit_request).get(list_requests))
            .route("/v1/requests/:id", get(get_request))
            .route("/v1/requests/:id/approve", post(approve_request))
            .route("/v1/requests/:id/reject", post(reject_request))
            .route("/v1/requests/:id/cancel", post(cancel_request))
            .route("/v1/responses/:id", get(get_response))
            // Session and accounts
            .route("/v1/session", get(get_session).put(update_session))
            .route("/v1/accounts", get(list_accounts))
            // Channel
            .route("/v1/channel", post(create_channel))
            .route("/v1/channel/request", post(channel_request))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::REQUEST_TIMEOUT,
                        timeout,
                    )),
            )
            .with_state(state);

        if self.state.config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }

        router
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn serve(self, addr: impl Into<SocketAddr>) -> anyhow::Result<()> {
        let addr = addr.into();
        info!(address = %addr, "Starting wallet bridge server");

        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Wallet bridge server stopped");
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// API error response that implements IntoResponse
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse::<()>::error(&self.message));
        (self.status, body).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self {
            status: StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            message: e.to_string(),
        }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Health check body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub pending_requests: usize,
    pub timestamp: DateTime<Utc>,
}

/// `PUT /v1/session` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    pub index: u32,
    pub chain_id: u64,
}

/// `GET /v1/accounts` query
#[derive(Debug, Deserialize)]
pub struct AccountsQuery {
    #[serde(default)]
    pub count: Option<u32>,
}

/// `POST /v1/requests/:id/cancel` body
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        service: "wallet-bridge",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        pending_requests: state.bridge.session().pending().len(),
        timestamp: Utc::now(),
    })
}

/// Inbound dApp payload
async fn submit_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<Json<ApiResponse<RouteAction>>, ApiError> {
    let request = JsonRpcRequest::from_value(payload)?;
    let action = state.bridge.submit(request).await?;
    Ok(Json(ApiResponse::success(action)))
}

async fn list_requests(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<PendingRequest>>> {
    Json(ApiResponse::success(state.bridge.pending()))
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PendingRequest>>, ApiError> {
    let pending = state.bridge.render(&RequestId::parse(&id))?;
    Ok(Json(ApiResponse::success(pending)))
}

async fn approve_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SignOutcome>>, ApiError> {
    let outcome = state.bridge.approve(&RequestId::parse(&id)).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

async fn reject_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.bridge.reject(&RequestId::parse(&id)).await?;
    Ok(Json(ApiResponse::success(())))
}

async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<ApiResponse<CancelResponse>> {
    let cancelled = state.bridge.cancel(&RequestId::parse(&id));
    Json(ApiResponse::success(CancelResponse { cancelled }))
}

async fn get_response(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .responses
        .outcome(&RequestId::parse(&id))
        .ok_or_else(|| ApiError::not_found(format!("No response for request {}", id)))?;
    Ok(Json(ApiResponse::success(outcome)))
}

async fn get_session(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SessionSnapshot>> {
    Json(ApiResponse::success(state.bridge.session().snapshot()))
}

async fn update_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateSessionRequest>,
) -> Result<Json<ApiResponse<SessionSnapshot>>, ApiError> {
    let snapshot = state.bridge.switch_account(req.index, req.chain_id).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AccountsQuery>,
) -> Result<Json<ApiResponse<Vec<DerivedAccount>>>, ApiError> {
    let accounts = state.bridge.accounts(query.count).await?;
    Ok(Json(ApiResponse::success(accounts)))
}

async fn create_channel(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let info = state.bridge.create_channel().await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(info))))
}

async fn channel_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let request = JsonRpcRequest::from_value(payload)?;
    let result = state.bridge.channel_request(&request).await?;
    Ok(Json(ApiResponse::success(result)))
}
