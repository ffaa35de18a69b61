//! Core types shared by the signers and the request engine
//!
//! Recoverable ECDSA signatures plus the hex and quantity helpers used when
//! moving values between JSON-RPC strings and RLP fields.

use crate::{Error, Result};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ECDSA signature (r, s, v)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// R component (32 bytes)
    pub r: [u8; 32],
    /// S component (32 bytes)
    pub s: [u8; 32],
    /// Recovery ID (0 or 1)
    pub recovery_id: u8,
}

impl Signature {
    /// Create a new signature
    pub fn new(r: [u8; 32], s: [u8; 32], recovery_id: u8) -> Self {
        Self { r, s, recovery_id }
    }

    /// Convert to bytes (r || s)
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        bytes
    }

    /// Get v value for legacy Ethereum signatures
    pub fn v(&self) -> u8 {
        self.recovery_id + 27
    }

    /// Joined 65-byte form (r || s || v) with v in {27, 28}
    pub fn to_joined(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&self.to_bytes());
        bytes[64] = self.v();
        bytes
    }

    /// Parse a joined signature; v may be 0/1 or 27/28
    pub fn from_joined(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 65 {
            return Err(Error::InvalidSignature(format!(
                "expected 65 bytes, got {}",
                bytes.len()
            )));
        }
        let recovery_id = match bytes[64] {
            v @ (0 | 1) => v,
            v @ (27 | 28) => v - 27,
            v => return Err(Error::InvalidSignature(format!("invalid v value {}", v))),
        };
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, recovery_id })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_joined()))
    }
}

/// Keccak-256 hash
pub fn keccak256_hash(data: &[u8]) -> [u8; 32] {
    use tiny_keccak::{Hasher, Keccak};
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    hash
}

/// True for `0x`-prefixed strings made only of hex digits
pub fn is_hex_string(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .is_some_and(|digits| digits.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Decode a hex string with or without `0x` prefix
pub fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    Ok(hex::decode(digits)?)
}

/// Encode bytes as `0x`-prefixed lowercase hex
pub fn encode_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Bytes to sign for a message string: hex strings are taken as raw bytes,
/// anything else as UTF-8 text.
pub fn message_bytes(message: &str) -> Vec<u8> {
    if is_hex_string(message)
        && let Ok(bytes) = decode_hex(message)
    {
        return bytes;
    }
    message.as_bytes().to_vec()
}

/// Parse a JSON-RPC quantity: `0x` hex, or a decimal string
pub fn parse_quantity(value: &str) -> Result<U256> {
    let value = value.trim();
    if let Some(digits) = value.strip_prefix("0x") {
        if digits.is_empty() {
            return Ok(U256::ZERO);
        }
        return U256::from_str_radix(digits, 16)
            .map_err(|e| Error::Deserialization(format!("invalid hex quantity {}: {}", value, e)));
    }
    U256::from_str_radix(value, 10)
        .map_err(|e| Error::Deserialization(format!("invalid quantity {}: {}", value, e)))
}

/// Parse a quantity that must fit in a u64
pub fn parse_quantity_u64(value: &str) -> Result<u64> {
    let quantity = parse_quantity(value)?;
    u64::try_from(quantity)
        .map_err(|_| Error::Deserialization(format!("quantity {} exceeds u64", value)))
}

/// Parse a quantity that must fit in a u128
pub fn parse_quantity_u128(value: &str) -> Result<u128> {
    let quantity = parse_quantity(value)?;
    u128::try_from(quantity)
        .map_err(|_| Error::Deserialization(format!("quantity {} exceeds u128", value)))
}

/// Format a quantity as minimal `0x` hex (`0x0` for zero)
pub fn format_quantity(value: U256) -> String {
    format!("{:#x}", value)
}

/// Serde adapter for optional quantities sent either as JSON strings or numbers
pub mod opt_quantity {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use serde_json::Value;

    pub fn serialize<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_str(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(D::Error::custom(format!("invalid quantity: {}", other))),
        }
    }
}
