//! Integration tests for the chain clients against a scripted node

use serde_json::json;
use std::sync::Arc;
use wallet_bridge_core::chain::conflux::{CfxTransactionRequest, ConfluxTransaction};
use wallet_bridge_core::chain::evm::{EthTransactionRequest, LegacyTransaction};
use wallet_bridge_core::keys::HdWallet;
use wallet_bridge_core::types::decode_hex;
use wallet_bridge_core::{ConfluxClient, ConfluxSigner, EthereumClient, EthereumSigner};

use crate::support::{ABANDON, ScriptedTransport};

fn keypair() -> wallet_bridge_core::Keypair {
    HdWallet::from_mnemonic(ABANDON)
        .unwrap()
        .keypair_at("m/44'/60'/0'/0", 0)
        .unwrap()
}

// ============================================================================
// Ethereum
// ============================================================================

#[tokio::test]
async fn test_ethereum_populates_missing_fields() {
    let node = Arc::new(
        ScriptedTransport::new()
            .respond("eth_getTransactionCount", json!("0x7"))
            .respond("eth_gasPrice", json!("0x3b9aca00"))
            .respond("eth_estimateGas", json!("0x5208")),
    );
    let client = EthereumClient::new(EthereumSigner::new(keypair(), 1), node.clone());

    let request = EthTransactionRequest {
        from: Some("0x9858effd232b4033e47d90003d41ec34ecaeda94".into()),
        to: Some("0x3535353535353535353535353535353535353535".into()),
        value: Some("0x1".into()),
        ..Default::default()
    };
    let populated = client.populate(&request).await.unwrap();

    assert_eq!(populated.from, None);
    assert_eq!(populated.nonce.as_deref(), Some("0x7"));
    assert_eq!(populated.gas_price.as_deref(), Some("0x3b9aca00"));
    assert_eq!(populated.gas_limit.as_deref(), Some("0x5208"));

    let count_params = node.params_of("eth_getTransactionCount");
    assert_eq!(count_params[0][1], json!("pending"));
}

#[tokio::test]
async fn test_ethereum_keeps_supplied_fields() {
    let node = Arc::new(ScriptedTransport::new().respond("eth_sendRawTransaction", json!("0xhash")));
    let client = EthereumClient::new(EthereumSigner::new(keypair(), 1), node.clone());

    let request = EthTransactionRequest {
        to: Some("0x3535353535353535353535353535353535353535".into()),
        gas: Some("0x5208".into()),
        gas_price: Some("0x1".into()),
        nonce: Some("0x0".into()),
        ..Default::default()
    };
    let hash = client.send_transaction(&request).await.unwrap();
    assert_eq!(hash, "0xhash");

    // only the submission reached the node
    let calls = node.calls();
    assert_eq!(calls.len(), 1);
    let raw = calls[0].1[0].as_str().unwrap().to_string();
    let (tx, _) = LegacyTransaction::decode_signed(&decode_hex(&raw).unwrap()).unwrap();
    assert_eq!(tx.gas_limit, 21000);
}

#[tokio::test]
async fn test_ethereum_node_error_propagates() {
    let node = Arc::new(ScriptedTransport::new().fail("eth_getTransactionCount", "boom"));
    let client = EthereumClient::new(EthereumSigner::new(keypair(), 1), node);
    let result = client.send_transaction(&EthTransactionRequest::default()).await;
    assert!(result.unwrap_err().to_string().contains("boom"));
}

// ============================================================================
// Conflux
// ============================================================================

#[tokio::test]
async fn test_conflux_send_omits_empty_data_and_defaults_chain_id() {
    let node = Arc::new(
        ScriptedTransport::new()
            .respond("cfx_getNextNonce", json!("0x0"))
            .respond("cfx_gasPrice", json!("0x1"))
            .respond(
                "cfx_estimateGasAndCollateral",
                json!({"gasUsed": "0x5208", "storageCollateralized": "0x0"}),
            )
            .respond("cfx_epochNumber", json!("0x10"))
            .respond("cfx_sendRawTransaction", json!("0xcfxhash")),
    );
    let signer = ConfluxSigner::new(keypair(), 0);
    let client = ConfluxClient::new(signer.clone(), node.clone());

    let request = CfxTransactionRequest {
        to: Some("0x1b716c51381e76900ebaa7999a488511a4e1fd0a".into()),
        value: Some("0x0".into()),
        data: Some(String::new()),
        ..Default::default()
    };
    let hash = client.send_transaction(&request).await.unwrap();
    assert_eq!(hash, "0xcfxhash");

    let estimate = &node.params_of("cfx_estimateGasAndCollateral")[0][0];
    assert!(estimate.get("data").is_none());
    assert_eq!(estimate["chainId"], json!("0x0"));
    assert_eq!(estimate["from"], json!(signer.address()));

    let raw = node.params_of("cfx_sendRawTransaction")[0][0]
        .as_str()
        .unwrap()
        .to_string();
    let (tx, _) = ConfluxTransaction::decode_signed(&decode_hex(&raw).unwrap()).unwrap();
    assert_eq!(tx.chain_id, 0);
    assert_eq!(tx.epoch_height, 16);
    assert!(tx.data.is_empty());
}

#[tokio::test]
async fn test_conflux_transaction_lookup() {
    let node = Arc::new(
        ScriptedTransport::new()
            .respond("cfx_getTransactionByHash", json!(null))
            .respond("cfx_getTransactionByHash", json!({"blockHash": "0xabc"})),
    );
    let client = ConfluxClient::new(ConfluxSigner::new(keypair(), 0), node);

    assert!(client.get_transaction_by_hash("0x1").await.unwrap().is_null());
    let found = client.get_transaction_by_hash("0x1").await.unwrap();
    assert_eq!(found["blockHash"], json!("0xabc"));
}
