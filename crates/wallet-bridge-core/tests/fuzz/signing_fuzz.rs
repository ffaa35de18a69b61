//! Fuzz tests for the signers
//!
//! Every signature the wallet produces must recover to the signing account.

use alloy_primitives::U256;
use proptest::prelude::*;
use wallet_bridge_core::chain::conflux::{ConfluxTransaction, recover_conflux_signer};
use wallet_bridge_core::chain::evm::{eip191_hash, recover_transaction_signer};
use wallet_bridge_core::keys::recover_address;
use wallet_bridge_core::types::{decode_hex, format_quantity};
use wallet_bridge_core::{
    CfxTransactionRequest, ConfluxSigner, EthTransactionRequest, EthereumSigner, Keypair,
    Signature,
};

// ============================================================================
// Strategies
// ============================================================================

fn keypair_strategy() -> impl Strategy<Value = Keypair> {
    prop::array::uniform32(1u8..=255).prop_filter_map("valid scalar", |bytes| {
        Keypair::from_bytes(&bytes).ok()
    })
}

fn address_strategy() -> impl Strategy<Value = String> {
    prop::array::uniform20(any::<u8>()).prop_map(|bytes| format!("0x{}", hex::encode(bytes)))
}

// ============================================================================
// Ethereum
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn eth_transaction_recovers_signer(
        keypair in keypair_strategy(),
        to in address_strategy(),
        nonce in any::<u32>(),
        value in any::<u64>(),
        chain_id in prop_oneof![Just(0u64), Just(1u64), 2u64..100_000],
    ) {
        let signer = EthereumSigner::new(keypair.clone(), chain_id);
        let request = EthTransactionRequest {
            to: Some(to),
            nonce: Some(format_quantity(U256::from(nonce))),
            gas_price: Some("0x1".into()),
            gas_limit: Some("0x5208".into()),
            value: Some(format_quantity(U256::from(value))),
            ..Default::default()
        };
        let raw = signer.sign_transaction(&request).unwrap();
        let recovered = recover_transaction_signer(&decode_hex(&raw).unwrap()).unwrap();
        prop_assert_eq!(recovered, keypair.address());
    }

    #[test]
    fn personal_message_recovers_signer(keypair in keypair_strategy(), message in "\\PC{0,64}") {
        let signer = EthereumSigner::new(keypair.clone(), 1);
        let signature = signer.sign_personal_message(&message).unwrap();
        let signature = Signature::from_joined(&decode_hex(&signature).unwrap()).unwrap();

        let bytes = wallet_bridge_core::types::message_bytes(&message);
        let recovered = recover_address(&eip191_hash(&bytes), &signature).unwrap();
        prop_assert_eq!(recovered, keypair.address());
    }

    #[test]
    fn digest_of_wrong_length_rejected(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        prop_assume!(bytes.len() != 32);
        let signer = EthereumSigner::new(Keypair::random(), 1);
        let digest = format!("0x{}", hex::encode(&bytes));
        prop_assert!(signer.sign_digest(&digest).is_err());
    }
}

// ============================================================================
// Conflux
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn cfx_transaction_recovers_signer(
        keypair in keypair_strategy(),
        to in address_strategy(),
        epoch in any::<u32>(),
        storage in any::<u16>(),
        value in any::<u64>(),
    ) {
        let signer = ConfluxSigner::new(keypair.clone(), 1029);
        let request = CfxTransactionRequest {
            to: Some(to),
            nonce: Some("0x1".into()),
            gas_price: Some("0x1".into()),
            gas: Some("0x5208".into()),
            value: Some(format_quantity(U256::from(value))),
            storage_limit: Some(format_quantity(U256::from(storage))),
            epoch_height: Some(format_quantity(U256::from(epoch))),
            ..Default::default()
        };
        let raw = decode_hex(&signer.sign_transaction(&request).unwrap()).unwrap();

        prop_assert_eq!(recover_conflux_signer(&raw).unwrap(), keypair.conflux_address());
        let (tx, _) = ConfluxTransaction::decode_signed(&raw).unwrap();
        prop_assert_eq!(tx.chain_id, 1029);
        prop_assert_eq!(tx.epoch_height, epoch as u64);
        prop_assert_eq!(tx.value, U256::from(value));
    }

    #[test]
    fn conflux_address_has_type_nibble(keypair in keypair_strategy()) {
        let conflux = keypair.conflux_address();
        let eth = keypair.eth_address().to_lowercase();
        prop_assert!(conflux.starts_with("0x1"));
        prop_assert_eq!(&conflux[3..], &eth[3..]);
    }
}
