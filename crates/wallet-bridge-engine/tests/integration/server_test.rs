//! Integration tests for the HTTP approval API

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use wallet_bridge_core::config::ServerConfig;
use wallet_bridge_engine::BridgeServer;
use wallet_bridge_engine::error::USER_REJECTED;

use crate::support::{ADDRESS_0, Fixture};

async fn server() -> BridgeServer {
    let fixture = Fixture::builder().disconnected().build().await;
    BridgeServer::new(fixture.bridge, ServerConfig::default())
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn personal_sign(id: u64) -> Value {
    json!({
        "id": id,
        "jsonrpc": "2.0",
        "method": "personal_sign",
        "params": ["0x68656c6c6f", ADDRESS_0]
    })
}

#[tokio::test]
async fn test_health() {
    let router = server().await.router();
    let (status, body) = call(&router, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["pending_requests"], 0);
}

#[tokio::test]
async fn test_submit_render_approve() {
    let server = server().await;
    let router = server.router();

    let (status, body) = call(&router, Method::POST, "/v1/requests", Some(personal_sign(1))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"action": "queued", "position": 1}));

    let (_, body) = call(&router, Method::GET, "/v1/requests", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = call(&router, Method::GET, "/v1/requests/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fields"][2], json!({"label": "Message", "value": "hello"}));

    let (status, body) = call(&router, Method::POST, "/v1/requests/1/approve", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "approved");

    let (status, body) = call(&router, Method::GET, "/v1/responses/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "approved");
    assert_eq!(body["data"]["id"], 1);
    assert!(server.responses().outcome(&1.into()).unwrap().is_approved());

    let (status, body) = call(&router, Method::GET, "/v1/requests/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_reject_with_string_id() {
    let router = server().await.router();
    let mut payload = personal_sign(0);
    payload["id"] = json!("req-a");

    call(&router, Method::POST, "/v1/requests", Some(payload)).await;
    let (status, _) = call(&router, Method::POST, "/v1/requests/req-a/reject", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&router, Method::GET, "/v1/responses/req-a", None).await;
    assert_eq!(body["data"]["status"], "rejected");
    assert_eq!(body["data"]["error"]["message"], USER_REJECTED);
}

#[tokio::test]
async fn test_foreign_method_is_ignored() {
    let router = server().await.router();
    let payload = json!({"id": 5, "method": "bzz_list", "params": []});

    let (status, body) = call(&router, Method::POST, "/v1/requests", Some(payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["action"], "ignored");
    let (status, _) = call(&router, Method::GET, "/v1/responses/5", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = call(&router, Method::GET, "/v1/requests", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_malformed_payload() {
    let router = server().await.router();
    let (status, body) = call(&router, Method::POST, "/v1/requests", Some(json!({"id": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_unknown_request_ids() {
    let router = server().await.router();

    let (status, _) = call(&router, Method::POST, "/v1/requests/42/approve", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&router, Method::GET, "/v1/responses/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = call(&router, Method::POST, "/v1/requests/42/cancel", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cancelled"], false);
}

#[tokio::test]
async fn test_session_and_accounts() {
    let router = server().await.router();

    let (_, body) = call(&router, Method::GET, "/v1/session", None).await;
    assert_eq!(body["data"]["address"], ADDRESS_0);
    assert_eq!(body["data"]["connected"], true);

    let (status, body) = call(
        &router,
        Method::PUT,
        "/v1/session",
        Some(json!({"index": 1, "chainId": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["activeIndex"], 1);
    assert_eq!(body["data"]["chainId"], 5);

    let (_, body) = call(&router, Method::GET, "/v1/accounts?count=2", None).await;
    let accounts = body["data"].as_array().unwrap();
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0]["address"], ADDRESS_0);
    assert_eq!(
        accounts[0]["confluxAddress"],
        "0x1858effd232b4033e47d90003d41ec34ecaeda94"
    );
    assert_ne!(accounts[1]["address"], ADDRESS_0);
}

#[tokio::test]
async fn test_channel_without_provider() {
    let router = server().await.router();
    let (status, body) = call(&router, Method::POST, "/v1/channel", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}
