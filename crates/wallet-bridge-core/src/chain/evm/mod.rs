//! # Ethereum Signer
//!
//! Legacy (EIP-155) transaction encoding, digest and EIP-191 message signing,
//! and a client that fills missing transaction fields from the node before
//! submitting.
//!
//! ## Example
//!
//! ```rust,ignore
//! use wallet_bridge_core::chain::evm::{EthereumSigner, EthTransactionRequest};
//!
//! let signer = EthereumSigner::new(keypair, 1);
//! let raw = signer.sign_transaction(&request)?;
//! ```

use super::RpcTransport;
use crate::keys::{Keypair, recover_address};
use crate::types::{
    Signature, decode_hex, encode_hex, format_quantity, keccak256_hash, message_bytes,
    opt_quantity, parse_quantity, parse_quantity_u64, parse_quantity_u128,
};
use crate::{Error, Result};
use alloy_primitives::{Address, Bytes, U256};
use alloy_rlp::Encodable;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

// ============================================================================
// Transaction Request
// ============================================================================

/// `eth_sendTransaction` / `eth_signTransaction` parameter object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthTransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, with = "opt_quantity", skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(default, with = "opt_quantity", skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<String>,
    #[serde(default, with = "opt_quantity", skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, with = "opt_quantity", skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, with = "opt_quantity", skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, with = "opt_quantity", skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
}

impl EthTransactionRequest {
    /// Strip `from` and move `gas` into `gasLimit`
    pub fn normalized(&self) -> Self {
        let mut tx = self.clone();
        tx.from = None;
        if let Some(gas) = tx.gas.take() {
            tx.gas_limit = Some(gas);
        }
        tx
    }

    /// Gas limit as requested (`gas` first, then `gasLimit`)
    pub fn requested_gas(&self) -> Option<&str> {
        self.gas.as_deref().or(self.gas_limit.as_deref())
    }
}

// ============================================================================
// Legacy Transaction Type
// ============================================================================

/// Legacy transaction, signed with EIP-155 replay protection when `chain_id` is non-zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub chain_id: u64,
}

impl LegacyTransaction {
    /// Build from a populated request; `default_chain_id` applies when the request has none
    pub fn from_request(request: &EthTransactionRequest, default_chain_id: u64) -> Result<Self> {
        let request = request.normalized();
        let nonce = request
            .nonce
            .as_deref()
            .ok_or_else(|| missing_field("nonce"))
            .and_then(parse_quantity_u64)?;
        let gas_price = request
            .gas_price
            .as_deref()
            .ok_or_else(|| missing_field("gasPrice"))
            .and_then(parse_quantity_u128)?;
        let gas_limit = request
            .gas_limit
            .as_deref()
            .ok_or_else(|| missing_field("gasLimit"))
            .and_then(parse_quantity_u64)?;
        let chain_id = match request.chain_id.as_deref() {
            Some(id) => parse_quantity_u64(id)?,
            None => default_chain_id,
        };

        Ok(Self {
            nonce,
            gas_price,
            gas_limit,
            to: parse_optional_address(request.to.as_deref())?,
            value: match request.value.as_deref() {
                Some(v) => parse_quantity(v)?,
                None => U256::ZERO,
            },
            data: parse_data(request.data.as_deref())?,
            chain_id,
        })
    }

    /// Back to a JSON-RPC request (without `from`)
    pub fn to_request(&self) -> EthTransactionRequest {
        EthTransactionRequest {
            from: None,
            to: self.to.map(|a| a.to_checksum(None)),
            gas: None,
            gas_limit: Some(format_quantity(U256::from(self.gas_limit))),
            gas_price: Some(format_quantity(U256::from(self.gas_price))),
            nonce: Some(format_quantity(U256::from(self.nonce))),
            value: Some(format_quantity(self.value)),
            data: Some(encode_hex(&self.data)),
            chain_id: Some(format_quantity(U256::from(self.chain_id))),
        }
    }

    /// Get the signing hash (EIP-155 when `chain_id` is non-zero)
    pub fn signing_hash(&self) -> [u8; 32] {
        // EIP-155 signing: rlp([nonce, gasprice, gas, to, value, data, chainId, 0, 0])
        let mut stream = alloy_rlp::BytesMut::new();
        let replay_protected = self.chain_id != 0;

        let trailer_length = if replay_protected {
            self.chain_id.length() + 0u8.length() + 0u8.length()
        } else {
            0
        };
        alloy_rlp::Header {
            list: true,
            payload_length: self.rlp_payload_length() + trailer_length,
        }
        .encode(&mut stream);

        self.encode_fields(&mut stream);
        if replay_protected {
            self.chain_id.encode(&mut stream);
            0u8.encode(&mut stream);
            0u8.encode(&mut stream);
        }

        keccak256_hash(&stream)
    }

    /// v value carried in the signed encoding
    fn v(&self, signature: &Signature) -> u64 {
        if self.chain_id == 0 {
            signature.recovery_id as u64 + 27
        } else {
            signature.recovery_id as u64 + 35 + self.chain_id * 2
        }
    }

    /// Encode the transaction with signature
    pub fn encode_signed(&self, signature: &Signature) -> Vec<u8> {
        let v = self.v(signature);
        let r = U256::from_be_slice(&signature.r);
        let s = U256::from_be_slice(&signature.s);

        let mut stream = alloy_rlp::BytesMut::new();

        alloy_rlp::Header {
            list: true,
            payload_length: self.rlp_payload_length() + v.length() + r.length() + s.length(),
        }
        .encode(&mut stream);

        self.encode_fields(&mut stream);
        v.encode(&mut stream);
        r.encode(&mut stream);
        s.encode(&mut stream);

        stream.to_vec()
    }

    /// Decode a signed legacy transaction into its fields and signature
    pub fn decode_signed(raw: &[u8]) -> Result<(Self, Signature)> {
        let decoded: Vec<alloy_rlp::Bytes> = alloy_rlp::Decodable::decode(&mut &raw[..])
            .map_err(|e| Error::ChainError(format!("Failed to decode transaction: {}", e)))?;

        if decoded.len() != 9 {
            return Err(Error::ChainError(
                "Invalid legacy transaction format".into(),
            ));
        }

        let v = decode_u64_from_bytes(&decoded[6])?;
        let (chain_id, recovery_id) = match v {
            27 | 28 => (0, (v - 27) as u8),
            v if v >= 35 => ((v - 35) / 2, ((v - 35) % 2) as u8),
            v => return Err(Error::InvalidSignature(format!("invalid v value {}", v))),
        };

        let tx = LegacyTransaction {
            nonce: decode_u64_from_bytes(&decoded[0])?,
            gas_price: decode_u128_from_bytes(&decoded[1])?,
            gas_limit: decode_u64_from_bytes(&decoded[2])?,
            to: match decoded[3].len() {
                0 => None,
                20 => Some(Address::from_slice(&decoded[3])),
                n => return Err(Error::ChainError(format!("Invalid recipient length {}", n))),
            },
            value: U256::from_be_slice(&decoded[4]),
            data: Bytes::from(decoded[5].to_vec()),
            chain_id,
        };
        let signature = Signature::new(
            left_pad_32(&decoded[7])?,
            left_pad_32(&decoded[8])?,
            recovery_id,
        );

        Ok((tx, signature))
    }

    /// Transaction hash of a signed encoding
    pub fn hash(raw: &[u8]) -> String {
        encode_hex(keccak256_hash(raw))
    }

    fn encode_fields(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        encode_to(self.to.as_ref(), out);
        self.value.encode(out);
        self.data.encode(out);
    }

    fn rlp_payload_length(&self) -> usize {
        self.nonce.length()
            + self.gas_price.length()
            + self.gas_limit.length()
            + to_length(self.to.as_ref())
            + self.value.length()
            + self.data.length()
    }
}

/// Recover the address that signed a raw legacy transaction
pub fn recover_transaction_signer(raw: &[u8]) -> Result<Address> {
    let (tx, signature) = LegacyTransaction::decode_signed(raw)?;
    recover_address(&tx.signing_hash(), &signature)
}

/// EIP-191 personal message hash
pub fn eip191_hash(message: &[u8]) -> [u8; 32] {
    let mut prefixed = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    prefixed.extend_from_slice(message);
    keccak256_hash(&prefixed)
}

// ============================================================================
// Signer
// ============================================================================

/// Ethereum signing capability for one keypair on one chain
#[derive(Debug, Clone)]
pub struct EthereumSigner {
    keypair: Keypair,
    chain_id: u64,
}

impl EthereumSigner {
    /// Create a signer for `chain_id`
    pub fn new(keypair: Keypair, chain_id: u64) -> Self {
        Self { keypair, chain_id }
    }

    /// Checksummed account address
    pub fn address(&self) -> String {
        self.keypair.eth_address()
    }

    /// Chain id used when a request carries none
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Underlying keypair
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Sign a legacy transaction and return its signed encoding
    pub fn sign_legacy(&self, tx: &LegacyTransaction) -> Result<Vec<u8>> {
        let signature = self.keypair.sign_prehash(&tx.signing_hash())?;
        Ok(tx.encode_signed(&signature))
    }

    /// Sign a fully populated request; returns the `0x` serialized transaction
    pub fn sign_transaction(&self, request: &EthTransactionRequest) -> Result<String> {
        let tx = LegacyTransaction::from_request(request, self.chain_id)?;
        Ok(encode_hex(self.sign_legacy(&tx)?))
    }

    /// Sign a raw 32-byte digest; returns the joined 65-byte signature
    pub fn sign_digest(&self, digest: &str) -> Result<String> {
        let bytes = decode_hex(digest)?;
        let digest: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            Error::Crypto(format!("Digest must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(self.keypair.sign_prehash(&digest)?.to_string())
    }

    /// EIP-191 message signature; hex strings are signed as bytes
    pub fn sign_personal_message(&self, message: &str) -> Result<String> {
        let hash = eip191_hash(&message_bytes(message));
        Ok(self.keypair.sign_prehash(&hash)?.to_string())
    }
}

// ============================================================================
// Client
// ============================================================================

/// Signer paired with a node connection
#[derive(Clone)]
pub struct EthereumClient {
    signer: EthereumSigner,
    transport: Arc<dyn RpcTransport>,
}

impl std::fmt::Debug for EthereumClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthereumClient")
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl EthereumClient {
    pub fn new(signer: EthereumSigner, transport: Arc<dyn RpcTransport>) -> Self {
        Self { signer, transport }
    }

    pub fn signer(&self) -> &EthereumSigner {
        &self.signer
    }

    /// Fill `nonce`, `gasPrice` and `gasLimit` from the node when missing
    pub async fn populate(&self, request: &EthTransactionRequest) -> Result<EthTransactionRequest> {
        let mut tx = request.normalized();
        let address = self.signer.address();

        if tx.nonce.is_none() {
            let nonce: String = super::call(
                self.transport.as_ref(),
                "eth_getTransactionCount",
                serde_json::json!([address, "pending"]),
            )
            .await?;
            tx.nonce = Some(nonce);
        }

        if tx.gas_price.is_none() {
            let price: String =
                super::call(self.transport.as_ref(), "eth_gasPrice", serde_json::json!([])).await?;
            tx.gas_price = Some(price);
        }

        if tx.gas_limit.is_none() {
            let mut estimate = serde_json::to_value(&tx)?;
            if let Some(obj) = estimate.as_object_mut() {
                obj.insert("from".into(), serde_json::Value::String(address.clone()));
            }
            let gas: String = super::call(
                self.transport.as_ref(),
                "eth_estimateGas",
                serde_json::json!([estimate]),
            )
            .await?;
            tx.gas_limit = Some(gas);
        }

        Ok(tx)
    }

    /// Populate, sign and submit; returns the transaction hash
    pub async fn send_transaction(&self, request: &EthTransactionRequest) -> Result<String> {
        let populated = self.populate(request).await?;
        let raw = self.signer.sign_transaction(&populated)?;
        let hash: String = super::call(
            self.transport.as_ref(),
            "eth_sendRawTransaction",
            serde_json::json!([raw]),
        )
        .await?;
        tracing::info!(hash = %hash, from = %self.signer.address(), "Submitted Ethereum transaction");
        Ok(hash)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn missing_field(field: &str) -> Error {
    Error::Deserialization(format!("Transaction is missing {}", field))
}

pub(crate) fn parse_optional_address(to: Option<&str>) -> Result<Option<Address>> {
    match to {
        None | Some("") | Some("0x") => Ok(None),
        Some(to) => Address::from_str(to)
            .map(Some)
            .map_err(|e| Error::Deserialization(format!("Invalid address {}: {}", to, e))),
    }
}

pub(crate) fn parse_data(data: Option<&str>) -> Result<Bytes> {
    match data {
        None | Some("") => Ok(Bytes::new()),
        Some(data) => Ok(Bytes::from(decode_hex(data)?)),
    }
}

pub(crate) fn encode_to(to: Option<&Address>, out: &mut dyn alloy_rlp::BufMut) {
    match to {
        Some(address) => address.encode(out),
        None => (&[] as &[u8]).encode(out),
    }
}

pub(crate) fn to_length(to: Option<&Address>) -> usize {
    match to {
        Some(address) => address.length(),
        None => 1,
    }
}

pub(crate) fn left_pad_32(bytes: &[u8]) -> Result<[u8; 32]> {
    if bytes.len() > 32 {
        return Err(Error::InvalidSignature("Signature component too large".into()));
    }
    let mut buf = [0u8; 32];
    buf[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(buf)
}

pub(crate) fn decode_u64_from_bytes(bytes: &[u8]) -> Result<u64> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes.len() > 8 {
        return Err(Error::ChainError("Value too large for u64".into()));
    }
    let mut buf = [0u8; 8];
    buf[8 - bytes.len()..].copy_from_slice(bytes);
    Ok(u64::from_be_bytes(buf))
}

pub(crate) fn decode_u128_from_bytes(bytes: &[u8]) -> Result<u128> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes.len() > 16 {
        return Err(Error::ChainError("Value too large for u128".into()));
    }
    let mut buf = [0u8; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(u128::from_be_bytes(buf))
}
