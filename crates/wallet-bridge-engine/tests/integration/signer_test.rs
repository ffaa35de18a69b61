//! Integration tests for signing approved requests
//!
//! Each test queues a request through the bridge, approves it, and checks the
//! single outcome delivered to the connector along with the node traffic.

use serde_json::{Value, json};
use wallet_bridge_core::chain::conflux::{ConfluxTransaction, recover_conflux_signer};
use wallet_bridge_core::chain::evm::{LegacyTransaction, eip191_hash, recover_transaction_signer};
use wallet_bridge_core::keys::recover_address;
use wallet_bridge_core::types::{Signature, decode_hex, keccak256_hash};
use wallet_bridge_engine::error::{ADDRESS_MISMATCH, UNSUPPORTED_METHOD};
use wallet_bridge_engine::{JsonRpcRequest, RequestId, SignOutcome};

use crate::support::{ADDRESS_0, Fixture, ScriptedNode};

const CONFLUX_0: &str = "0x1858effd232b4033e47d90003d41ec34ecaeda94";
const OTHER: &str = "0x3535353535353535353535353535353535353535";

async fn approve(fixture: &Fixture, request: JsonRpcRequest) -> SignOutcome {
    let id = request.id.clone();
    fixture.bridge.route(request).await.unwrap();
    let outcome = fixture.bridge.approve(&id).await.unwrap();

    assert_eq!(fixture.connector.len(), 1, "exactly one outcome per request");
    assert_eq!(
        fixture.connector.outcome(&id).unwrap().is_approved(),
        outcome.is_approved()
    );
    assert!(fixture.bridge.pending().is_empty());
    outcome
}

fn approved(outcome: SignOutcome) -> Value {
    match outcome {
        SignOutcome::Approved { result } => result,
        SignOutcome::Rejected { message } => panic!("rejected: {}", message),
    }
}

fn rejection(outcome: SignOutcome) -> String {
    match outcome {
        SignOutcome::Rejected { message } => message,
        SignOutcome::Approved { result } => panic!("approved: {}", result),
    }
}

fn signature_of(result: &Value) -> Signature {
    let bytes = decode_hex(result.as_str().unwrap()).unwrap();
    Signature::from_joined(&bytes).unwrap()
}

fn full_eth_tx(from: &str) -> Value {
    json!({
        "from": from,
        "to": OTHER,
        "gas": "0x5208",
        "gasPrice": "0x4a817c800",
        "nonce": "0x9",
        "value": "0xde0b6b3a7640000",
        "data": "0x"
    })
}

// ============================================================================
// Address checks
// ============================================================================

#[tokio::test]
async fn test_personal_sign_active_account() {
    let fixture = Fixture::new().await;
    let request = JsonRpcRequest::new(
        1,
        "personal_sign",
        vec![json!("0x68656c6c6f"), json!(ADDRESS_0)],
    );

    let result = approved(approve(&fixture, request).await);

    let recovered = recover_address(&eip191_hash(b"hello"), &signature_of(&result)).unwrap();
    assert_eq!(recovered.to_checksum(None), ADDRESS_0);
}

#[tokio::test]
async fn test_personal_sign_other_account_is_rejected() {
    let fixture = Fixture::new().await;
    let request = JsonRpcRequest::new(1, "personal_sign", vec![json!("0x68656c6c6f"), json!(OTHER)]);

    assert_eq!(rejection(approve(&fixture, request).await), ADDRESS_MISMATCH);
    let outcome = fixture.connector.outcome(&1.into()).unwrap();
    assert_eq!(outcome.error_message(), Some(ADDRESS_MISMATCH));
}

#[tokio::test]
async fn test_from_matches_in_any_case() {
    let fixture = Fixture::new().await;
    let request = JsonRpcRequest::new(
        2,
        "eth_signTransaction",
        vec![full_eth_tx(&ADDRESS_0.to_lowercase())],
    );

    assert!(approve(&fixture, request).await.is_approved());
}

#[tokio::test]
async fn test_missing_from_is_a_mismatch() {
    let fixture = Fixture::new().await;
    let mut tx = full_eth_tx(ADDRESS_0);
    tx.as_object_mut().unwrap().remove("from");
    let request = JsonRpcRequest::new(3, "eth_signTransaction", vec![tx]);

    assert_eq!(rejection(approve(&fixture, request).await), ADDRESS_MISMATCH);
}

#[tokio::test]
async fn test_mismatch_never_touches_keys_or_node() {
    let fixture = Fixture::builder()
        .eth_node(ScriptedNode::new().respond("eth_sendRawTransaction", json!("0xhash")))
        .build()
        .await;
    fixture.bridge.controller().lock().await.deactivate();

    let request = JsonRpcRequest::new(4, "eth_sendTransaction", vec![full_eth_tx(OTHER)]);
    assert_eq!(rejection(approve(&fixture, request).await), ADDRESS_MISMATCH);

    assert!(!fixture.bridge.controller().lock().await.is_active());
    assert!(fixture.eth_node.calls().is_empty());
}

#[tokio::test]
async fn test_inactive_controller_is_reactivated_for_session_account() {
    let fixture = Fixture::new().await;
    fixture.bridge.controller().lock().await.deactivate();

    let request = JsonRpcRequest::new(5, "personal_sign", vec![json!("hi"), json!(ADDRESS_0)]);
    assert!(approve(&fixture, request).await.is_approved());

    let controller = fixture.bridge.controller().lock().await;
    assert!(controller.is_active());
    assert_eq!(controller.active().unwrap().address(), ADDRESS_0);
}

// ============================================================================
// Ethereum
// ============================================================================

#[tokio::test]
async fn test_eth_send_transaction_populates_and_submits() {
    let fixture = Fixture::builder()
        .eth_node(
            ScriptedNode::new()
                .respond("eth_getTransactionCount", json!("0x3"))
                .respond("eth_gasPrice", json!("0x3b9aca00"))
                .respond("eth_estimateGas", json!("0x5208"))
                .respond("eth_sendRawTransaction", json!("0xabc123")),
        )
        .build()
        .await;
    let request = JsonRpcRequest::new(
        6,
        "eth_sendTransaction",
        vec![json!({"from": ADDRESS_0, "to": OTHER, "value": "0x1"})],
    );

    let result = approved(approve(&fixture, request).await);
    assert_eq!(result, json!("0xabc123"));

    let sent = fixture.eth_node.params_of("eth_sendRawTransaction");
    assert_eq!(sent.len(), 1);
    let raw = decode_hex(sent[0][0].as_str().unwrap()).unwrap();
    let (tx, _) = LegacyTransaction::decode_signed(&raw).unwrap();
    assert_eq!(tx.nonce, 3);
    assert_eq!(tx.gas_limit, 21000);
    assert_eq!(tx.gas_price, 1_000_000_000);
    assert_eq!(tx.chain_id, 1);
    assert_eq!(recover_transaction_signer(&raw).unwrap().to_checksum(None), ADDRESS_0);
}

#[tokio::test]
async fn test_eth_send_transaction_node_error_is_rejected() {
    let fixture = Fixture::builder()
        .eth_node(ScriptedNode::new().fail("eth_getTransactionCount", "connection reset"))
        .build()
        .await;
    let request = JsonRpcRequest::new(7, "eth_sendTransaction", vec![json!({"from": ADDRESS_0})]);

    assert_eq!(rejection(approve(&fixture, request).await), UNSUPPORTED_METHOD);
}

#[tokio::test]
async fn test_eth_sign_transaction_complete_request_is_offline() {
    let fixture = Fixture::new().await;
    let request = JsonRpcRequest::new(8, "eth_signTransaction", vec![full_eth_tx(ADDRESS_0)]);

    let result = approved(approve(&fixture, request).await);
    assert!(fixture.eth_node.calls().is_empty());

    let raw = decode_hex(result.as_str().unwrap()).unwrap();
    let (tx, _) = LegacyTransaction::decode_signed(&raw).unwrap();
    assert_eq!(tx.nonce, 9);
    assert_eq!(tx.gas_limit, 21000);
    assert_eq!(tx.gas_price, 20_000_000_000);
    assert!(tx.data.is_empty());
    assert_eq!(recover_transaction_signer(&raw).unwrap().to_checksum(None), ADDRESS_0);
}

#[tokio::test]
async fn test_eth_sign_transaction_fills_missing_nonce() {
    let fixture = Fixture::builder()
        .eth_node(ScriptedNode::new().respond("eth_getTransactionCount", json!("0x7")))
        .build()
        .await;
    let mut tx = full_eth_tx(ADDRESS_0);
    tx.as_object_mut().unwrap().remove("nonce");
    let request = JsonRpcRequest::new(9, "eth_signTransaction", vec![tx]);

    let result = approved(approve(&fixture, request).await);

    let raw = decode_hex(result.as_str().unwrap()).unwrap();
    let (tx, _) = LegacyTransaction::decode_signed(&raw).unwrap();
    assert_eq!(tx.nonce, 7);
    assert_eq!(fixture.eth_node.calls().len(), 1);
}

#[tokio::test]
async fn test_eth_sign_digest() {
    let fixture = Fixture::new().await;
    let digest = format!("0x{}", "ab".repeat(32));
    let request = JsonRpcRequest::new(10, "eth_sign", vec![json!(ADDRESS_0), json!(digest)]);

    let result = approved(approve(&fixture, request).await);

    let recovered = recover_address(&[0xab; 32], &signature_of(&result)).unwrap();
    assert_eq!(recovered.to_checksum(None), ADDRESS_0);
}

#[tokio::test]
async fn test_typed_data_is_unsupported() {
    let fixture = Fixture::new().await;
    let request = JsonRpcRequest::new(
        11,
        "eth_signTypedData_v4",
        vec![json!(ADDRESS_0), json!("{}")],
    );

    assert_eq!(rejection(approve(&fixture, request).await), UNSUPPORTED_METHOD);
}

// ============================================================================
// Conflux
// ============================================================================

#[tokio::test]
async fn test_cfx_send_transaction_populates_and_submits() {
    let fixture = Fixture::builder()
        .cfx_node(
            ScriptedNode::new()
                .respond("cfx_getNextNonce", json!("0x1"))
                .respond("cfx_gasPrice", json!("0x1"))
                .respond(
                    "cfx_estimateGasAndCollateral",
                    json!({"gasUsed": "0x5208", "storageCollateralized": "0x40"}),
                )
                .respond("cfx_epochNumber", json!("0x10"))
                .respond("cfx_sendRawTransaction", json!("0xcf00")),
        )
        .build()
        .await;
    let request = JsonRpcRequest::new(
        12,
        "cfx_sendTransaction",
        vec![json!({"to": "0x1b716c51381e76900ebaa7999a488511a4e1fd0a", "value": "0x10", "data": "0x"})],
    );

    let result = approved(approve(&fixture, request).await);
    assert_eq!(result, json!("0xcf00"));

    let estimate = &fixture.cfx_node.params_of("cfx_estimateGasAndCollateral")[0][0];
    assert_eq!(estimate["from"], json!(CONFLUX_0));
    assert_eq!(estimate["chainId"], json!("0x0"));
    assert!(estimate.get("data").is_none());

    let sent = fixture.cfx_node.params_of("cfx_sendRawTransaction");
    let raw = decode_hex(sent[0][0].as_str().unwrap()).unwrap();
    let (tx, _) = ConfluxTransaction::decode_signed(&raw).unwrap();
    assert_eq!(tx.nonce, 1);
    assert_eq!(tx.gas, 21000);
    assert_eq!(tx.storage_limit, 64);
    assert_eq!(tx.epoch_height, 16);
    assert_eq!(tx.chain_id, 0);
    assert_eq!(recover_conflux_signer(&raw).unwrap(), CONFLUX_0);
    assert!(fixture.eth_node.calls().is_empty());
}

#[tokio::test]
async fn test_cfx_sign_transaction_complete_request_is_offline() {
    let fixture = Fixture::new().await;
    let request = JsonRpcRequest::new(
        13,
        "cfx_signTransaction",
        vec![json!({
            "to": "0x1b716c51381e76900ebaa7999a488511a4e1fd0a",
            "nonce": "0x2",
            "gasPrice": "0x1",
            "gas": "0x5208",
            "storageLimit": "0x0",
            "epochHeight": "0x64",
            "chainId": "0x405"
        })],
    );

    let result = approved(approve(&fixture, request).await);
    assert!(fixture.cfx_node.calls().is_empty());

    let raw = decode_hex(result.as_str().unwrap()).unwrap();
    let (tx, _) = ConfluxTransaction::decode_signed(&raw).unwrap();
    assert_eq!(tx.nonce, 2);
    assert_eq!(tx.epoch_height, 100);
    assert_eq!(tx.chain_id, 1029);
    assert_eq!(recover_conflux_signer(&raw).unwrap(), CONFLUX_0);
}

#[tokio::test]
async fn test_cfx_sign_message() {
    let fixture = Fixture::new().await;
    let request = JsonRpcRequest::new(14, "cfx_sign", vec![json!("0x68656c6c6f")]);

    let result = approved(approve(&fixture, request).await);

    assert_eq!(result["from"], json!(CONFLUX_0));
    let mut bytes = decode_hex(result["signature"].as_str().unwrap()).unwrap();
    assert!(bytes[64] <= 1);
    bytes[64] += 27;
    let signature = Signature::from_joined(&bytes).unwrap();
    let recovered = recover_address(&keccak256_hash(b"hello"), &signature).unwrap();
    assert_eq!(recovered.to_checksum(None), ADDRESS_0);
}

#[tokio::test]
async fn test_approving_unknown_request() {
    let fixture = Fixture::new().await;
    let result = fixture.bridge.approve(&RequestId::from("missing")).await;
    assert!(result.is_err());
    assert!(fixture.connector.is_empty());
}
