//! Integration tests for request routing

use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wallet_bridge_engine::error::{
    NO_ACTIVE_CHANNEL, POLL_TIMED_OUT, REQUEST_CANCELLED, UNSUPPORTED_METHOD,
};
use wallet_bridge_engine::{JsonRpcRequest, PollConfig, RequestId, RouteAction};

use crate::support::{ADDRESS_0, Fixture, ScriptedLookup, ScriptedResolver};

fn personal_sign(id: u64) -> JsonRpcRequest {
    JsonRpcRequest::new(id, "personal_sign", vec![json!("0x68656c6c6f"), json!(ADDRESS_0)])
}

fn confirmation(id: &str) -> JsonRpcRequest {
    JsonRpcRequest::new(id, "cfx_getTransactionByHash", vec![json!("0xfeed")])
}

fn fast_poll() -> PollConfig {
    PollConfig::default()
        .with_interval(Duration::from_secs(1))
        .with_backoff(1.0, Duration::from_secs(1))
        .with_timeout(Duration::from_secs(5))
}

// ============================================================================
// Drop, reject, forward
// ============================================================================

#[tokio::test]
async fn test_no_connector_drops_request() {
    let fixture = Fixture::builder().disconnected().build().await;

    let action = fixture.bridge.route(personal_sign(1)).await.unwrap();

    assert_eq!(action, RouteAction::Dropped);
    assert!(fixture.bridge.pending().is_empty());
    assert!(fixture.connector.is_empty());
}

#[tokio::test]
async fn test_foreign_namespace_is_ignored() {
    let fixture = Fixture::builder()
        .resolver(ScriptedResolver::answering(json!("0x1")))
        .build()
        .await;

    let action = fixture
        .bridge
        .route(JsonRpcRequest::new(9, "bzz_retrieve", vec![]))
        .await
        .unwrap();

    assert_eq!(action, RouteAction::Ignored);
    assert!(fixture.resolver.calls().is_empty());
    assert!(fixture.connector.is_empty());
    assert!(fixture.bridge.pending().is_empty());
}

#[tokio::test]
async fn test_read_only_method_is_forwarded() {
    let fixture = Fixture::builder()
        .resolver(ScriptedResolver::answering(json!("0x10d4f")))
        .build()
        .await;

    let action = fixture
        .bridge
        .route(JsonRpcRequest::new(3, "eth_blockNumber", vec![]))
        .await
        .unwrap();

    assert_eq!(action, RouteAction::Approved);
    assert_eq!(fixture.resolver.calls(), vec![(1, "eth_blockNumber".to_string())]);
    let outcome = fixture.connector.outcome(&3.into()).unwrap();
    assert_eq!(outcome.result(), Some(&json!("0x10d4f")));
    assert!(fixture.bridge.pending().is_empty());
}

#[tokio::test]
async fn test_forwarding_follows_active_chain() {
    let fixture = Fixture::builder()
        .resolver(ScriptedResolver::answering(json!("0x2a")))
        .build()
        .await;
    fixture.bridge.switch_account(0, 42).await.unwrap();

    fixture
        .bridge
        .route(JsonRpcRequest::new(4, "net_version", vec![]))
        .await
        .unwrap();

    assert_eq!(fixture.resolver.calls(), vec![(42, "net_version".to_string())]);
}

#[tokio::test]
async fn test_forwarding_failure_is_unsupported() {
    let fixture = Fixture::new().await;

    let action = fixture
        .bridge
        .route(JsonRpcRequest::new(5, "eth_getBalance", vec![json!(ADDRESS_0)]))
        .await
        .unwrap();

    assert_eq!(
        action,
        RouteAction::Rejected {
            message: UNSUPPORTED_METHOD.into()
        }
    );
}

// ============================================================================
// Queue
// ============================================================================

#[tokio::test]
async fn test_signing_and_conflux_methods_are_queued() {
    let fixture = Fixture::new().await;

    let first = fixture.bridge.route(personal_sign(1)).await.unwrap();
    let second = fixture
        .bridge
        .route(JsonRpcRequest::new(2, "cfx_sign", vec![json!("0x68656c6c6f")]))
        .await
        .unwrap();
    let third = fixture
        .bridge
        .route(JsonRpcRequest::new(3, "eth_signTypedData_v4", vec![]))
        .await
        .unwrap();

    assert_eq!(first, RouteAction::Queued { position: 1 });
    assert_eq!(second, RouteAction::Queued { position: 2 });
    assert_eq!(third, RouteAction::Queued { position: 3 });
    assert!(fixture.connector.is_empty());

    let ids: Vec<RequestId> = fixture
        .bridge
        .pending()
        .into_iter()
        .map(|p| p.request.id)
        .collect();
    assert_eq!(ids, vec![1.into(), 2.into(), 3.into()]);
}

#[tokio::test]
async fn test_channel_request_without_channel() {
    let fixture = Fixture::new().await;

    let action = fixture
        .bridge
        .route(JsonRpcRequest::new(6, "chan_getBalance", vec![]))
        .await
        .unwrap();

    assert_eq!(
        action,
        RouteAction::Rejected {
            message: NO_ACTIVE_CHANNEL.into()
        }
    );
}

// ============================================================================
// Confirmation polling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_confirmation_answers_with_first_mined_response() {
    let mined = json!({"hash": "0xfeed", "blockHash": "0xb10c", "status": "0x0"});
    let lookup = Arc::new(ScriptedLookup::new(vec![
        Ok(Value::Null),
        Ok(json!({"hash": "0xfeed", "blockHash": null})),
        Ok(mined.clone()),
    ]));
    let fixture = Fixture::builder()
        .lookup(lookup.clone())
        .poll(fast_poll())
        .build()
        .await;

    let action = fixture.bridge.route(confirmation("tx-1")).await.unwrap();

    assert_eq!(action, RouteAction::Approved);
    assert_eq!(lookup.calls(), 3);
    let outcome = fixture.connector.outcome(&"tx-1".into()).unwrap();
    assert_eq!(outcome.id(), &RequestId::from("tx-1"));
    assert_eq!(outcome.result(), Some(&mined));
    assert!(!fixture.bridge.session().is_polling(&"tx-1".into()));
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_times_out() {
    let lookup = Arc::new(ScriptedLookup::new(vec![Ok(Value::Null)]));
    let fixture = Fixture::builder()
        .lookup(lookup.clone())
        .poll(fast_poll())
        .build()
        .await;

    let action = fixture.bridge.route(confirmation("tx-2")).await.unwrap();

    assert_eq!(
        action,
        RouteAction::Rejected {
            message: POLL_TIMED_OUT.into()
        }
    );
    assert!(lookup.calls() > 1);
}

#[tokio::test(start_paused = true)]
async fn test_lookup_errors_are_retried() {
    let lookup = Arc::new(ScriptedLookup::new(vec![
        Err(wallet_bridge_engine::EngineError::Remote("node down".into())),
        Ok(json!({"blockHash": "0xb10c"})),
    ]));
    let fixture = Fixture::builder()
        .lookup(lookup.clone())
        .poll(fast_poll())
        .build()
        .await;

    let action = fixture.bridge.route(confirmation("tx-3")).await.unwrap();

    assert_eq!(action, RouteAction::Approved);
    assert_eq!(lookup.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_submitted_confirmation_can_be_cancelled() {
    let lookup = Arc::new(ScriptedLookup::new(vec![Ok(Value::Null)]));
    let fixture = Fixture::builder()
        .lookup(lookup)
        .poll(fast_poll().with_timeout(Duration::from_secs(600)))
        .build()
        .await;
    let id = RequestId::from("tx-4");

    let action = fixture.bridge.submit(confirmation("tx-4")).await.unwrap();
    assert_eq!(action, RouteAction::Polling);

    while !fixture.bridge.session().is_polling(&id) {
        tokio::task::yield_now().await;
    }
    assert!(fixture.bridge.cancel(&id));

    while fixture.connector.outcome(&id).is_none() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let outcome = fixture.connector.outcome(&id).unwrap();
    assert_eq!(outcome.error_message(), Some(REQUEST_CANCELLED));
    assert!(!fixture.bridge.cancel(&id));
}

#[tokio::test(start_paused = true)]
async fn test_resubmitted_confirmation_stays_cancellable() {
    let lookup = Arc::new(ScriptedLookup::new(vec![Ok(Value::Null)]));
    let fixture = Fixture::builder()
        .lookup(lookup)
        .poll(fast_poll().with_timeout(Duration::from_secs(600)))
        .build()
        .await;
    let id = RequestId::from("tx-6");

    fixture.bridge.submit(confirmation("tx-6")).await.unwrap();
    fixture.bridge.submit(confirmation("tx-6")).await.unwrap();

    // the earlier poll is superseded and answers first
    while fixture.connector.is_empty() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(
        fixture.connector.outcomes()[0].error_message(),
        Some(REQUEST_CANCELLED)
    );
    assert!(fixture.bridge.session().is_polling(&id));
    assert!(fixture.bridge.cancel(&id));

    while fixture.connector.len() < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let outcomes = fixture.connector.outcomes();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[1].error_message(), Some(REQUEST_CANCELLED));
    assert!(!fixture.bridge.session().is_polling(&id));
}

#[tokio::test]
async fn test_confirmation_without_lookup_is_unsupported() {
    let fixture = Fixture::new().await;

    let action = fixture.bridge.route(confirmation("tx-5")).await.unwrap();

    assert_eq!(
        action,
        RouteAction::Rejected {
            message: UNSUPPORTED_METHOD.into()
        }
    );
}
