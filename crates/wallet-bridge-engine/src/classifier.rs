//! Request classification
//!
//! Pure predicates over method names. The router and the wasm bindings both
//! build on these, so they never touch session or key state.

/// Namespaces this bridge answers for
pub const NAMESPACE_PREFIXES: [&str; 6] = ["eth_", "net_", "shh_", "personal_", "wallet_", "cfx_"];

/// Methods that need a local private-key operation
pub const SIGNING_METHODS: [&str; 9] = [
    "eth_sendTransaction",
    "eth_signTransaction",
    "eth_sign",
    "eth_signTypedData",
    "eth_signTypedData_v1",
    "eth_signTypedData_v2",
    "eth_signTypedData_v3",
    "eth_signTypedData_v4",
    "personal_sign",
];

/// Prefix of channel-provider methods
pub const CHANNEL_PREFIX: &str = "chan_";

/// Method resolved by confirmation polling instead of approval
pub const CONFIRMATION_METHOD: &str = "cfx_getTransactionByHash";

/// Whether the method belongs to one of this bridge's namespaces
pub fn is_bridge_request(method: &str) -> bool {
    namespace(method).is_some()
}

/// Namespace prefix of `method`, if it is one of ours
pub fn namespace(method: &str) -> Option<&'static str> {
    NAMESPACE_PREFIXES
        .iter()
        .copied()
        .find(|prefix| method.starts_with(prefix))
}

pub fn is_signing_method(method: &str) -> bool {
    SIGNING_METHODS.contains(&method)
}

/// `cfx_` followed by at least one character
pub fn is_conflux_method(method: &str) -> bool {
    method.strip_prefix("cfx_").is_some_and(|rest| !rest.is_empty())
}

pub fn is_channel_request(method: &str) -> bool {
    method.starts_with(CHANNEL_PREFIX)
}
