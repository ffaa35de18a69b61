//! Property-based tests for classification and rendering
//!
//! Classification and rendering run on untrusted dApp input, so both must be
//! total: any method name and any params produce an answer, never a panic.

use proptest::prelude::*;
use serde_json::{Value, json};
use wallet_bridge_engine::classifier::{NAMESPACE_PREFIXES, namespace};
use wallet_bridge_engine::{
    JsonRpcRequest, RequestId, is_bridge_request, is_signing_method, render_request,
};

fn method() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("eth_sendTransaction".to_string()),
        Just("eth_signTransaction".to_string()),
        Just("eth_sign".to_string()),
        Just("personal_sign".to_string()),
        Just("cfx_sendTransaction".to_string()),
        Just("cfx_sign".to_string()),
        "[a-z]{1,8}_[a-zA-Z]{0,12}",
        ".*",
    ]
}

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        "0x[0-9a-f]{0,80}".prop_map(Value::from),
        ".{0,40}".prop_map(Value::from),
    ]
}

fn json_value() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::hash_map(
                prop_oneof![
                    Just("from".to_string()),
                    Just("to".to_string()),
                    Just("gas".to_string()),
                    Just("gasPrice".to_string()),
                    Just("nonce".to_string()),
                    Just("value".to_string()),
                    Just("data".to_string()),
                    "[a-z]{1,6}",
                ],
                inner,
                0..6
            )
            .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_classification_matches_prefixes(method in method()) {
        let expected = NAMESPACE_PREFIXES.iter().any(|p| method.starts_with(p));
        prop_assert_eq!(is_bridge_request(&method), expected);
        prop_assert_eq!(namespace(&method).is_some(), expected);
        if is_signing_method(&method) {
            prop_assert!(is_bridge_request(&method));
        }
    }

    #[test]
    fn prop_render_is_total_and_stable(
        method in method(),
        params in prop::collection::vec(json_value(), 0..3),
    ) {
        let request = JsonRpcRequest::new(1, method.clone(), params);
        let first = render_request(&request);
        let second = render_request(&request);

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first[0].label.as_str(), "Method");
        prop_assert_eq!(first[0].value.as_str(), method.as_str());
        prop_assert!(first.len() >= 2);
    }

    #[test]
    fn prop_transaction_quantities_render_decimal(gas in any::<u64>(), nonce in any::<u32>()) {
        let request = JsonRpcRequest::new(
            1,
            "eth_sendTransaction",
            vec![json!({"gas": format!("{:#x}", gas), "nonce": format!("{:#x}", nonce)})],
        );
        let fields = render_request(&request);
        let gas_field = fields.iter().find(|f| f.label == "Gas Limit").unwrap();
        let nonce_field = fields.iter().find(|f| f.label == "Nonce").unwrap();
        prop_assert_eq!(gas_field.value.clone(), gas.to_string());
        prop_assert_eq!(nonce_field.value.clone(), nonce.to_string());
    }

    #[test]
    fn prop_numeric_ids_survive_path_round_trip(id in any::<u64>()) {
        let original = RequestId::from(id);
        prop_assert_eq!(RequestId::parse(&original.to_string()), original);
    }

    #[test]
    fn prop_string_ids_survive_path_round_trip(id in "[a-z][a-z0-9-]{0,16}") {
        let original = RequestId::from(id.as_str());
        prop_assert_eq!(RequestId::parse(&original.to_string()), original);
    }
}
