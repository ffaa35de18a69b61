//! # Conflux Signer
//!
//! Conflux transactions extend the account model with a storage limit and an
//! epoch height. The signed form nests the unsigned field list:
//! `rlp([[nonce, gasPrice, gas, to, value, storageLimit, epochHeight, chainId, data], v, r, s])`
//! with `v` being the bare recovery id.

use super::RpcTransport;
use super::evm::{
    decode_u64_from_bytes, decode_u128_from_bytes, encode_to, left_pad_32, parse_data,
    parse_optional_address, to_length,
};
use crate::keys::{Keypair, recover_address};
use crate::types::{
    Signature, encode_hex, format_quantity, keccak256_hash, message_bytes, opt_quantity,
    parse_quantity, parse_quantity_u64, parse_quantity_u128,
};
use crate::{Error, Result};
use alloy_primitives::{Address, Bytes, U256};
use alloy_rlp::{Decodable, Encodable, Header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// `cfx_sendTransaction` / `cfx_signTransaction` parameter object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfxTransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, with = "opt_quantity", skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, with = "opt_quantity", skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, with = "opt_quantity", skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(default, with = "opt_quantity", skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, with = "opt_quantity", skip_serializing_if = "Option::is_none")]
    pub storage_limit: Option<String>,
    #[serde(default, with = "opt_quantity", skip_serializing_if = "Option::is_none")]
    pub epoch_height: Option<String>,
    #[serde(default, with = "opt_quantity", skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl CfxTransactionRequest {
    /// Request as submitted: `from` set to the signing account, `chainId`
    /// defaulted when absent, empty `data` dropped.
    pub fn prepared_for_send(&self, from: &str, default_chain_id: u64) -> Self {
        let mut tx = self.clone();
        tx.from = Some(from.to_string());
        if tx.chain_id.is_none() {
            tx.chain_id = Some(format_quantity(U256::from(default_chain_id)));
        }
        if tx.data.as_deref().is_some_and(|d| d.is_empty() || d == "0x") {
            tx.data = None;
        }
        tx
    }
}

/// Unsigned Conflux transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfluxTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub storage_limit: u64,
    pub epoch_height: u64,
    pub chain_id: u64,
    pub data: Bytes,
}

impl ConfluxTransaction {
    /// Build from a populated request
    pub fn from_request(request: &CfxTransactionRequest, default_chain_id: u64) -> Result<Self> {
        let required = |field: Option<&String>, name: &str| -> Result<String> {
            field
                .cloned()
                .ok_or_else(|| Error::Deserialization(format!("Transaction is missing {}", name)))
        };

        Ok(Self {
            nonce: parse_quantity_u64(&required(request.nonce.as_ref(), "nonce")?)?,
            gas_price: parse_quantity_u128(&required(request.gas_price.as_ref(), "gasPrice")?)?,
            gas: parse_quantity_u64(&required(request.gas.as_ref(), "gas")?)?,
            to: parse_optional_address(request.to.as_deref())?,
            value: match request.value.as_deref() {
                Some(v) => parse_quantity(v)?,
                None => U256::ZERO,
            },
            storage_limit: parse_quantity_u64(&required(
                request.storage_limit.as_ref(),
                "storageLimit",
            )?)?,
            epoch_height: parse_quantity_u64(&required(
                request.epoch_height.as_ref(),
                "epochHeight",
            )?)?,
            chain_id: match request.chain_id.as_deref() {
                Some(id) => parse_quantity_u64(id)?,
                None => default_chain_id,
            },
            data: parse_data(request.data.as_deref())?,
        })
    }

    /// Keccak-256 of the unsigned field list
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut stream = alloy_rlp::BytesMut::new();
        self.encode_unsigned(&mut stream);
        keccak256_hash(&stream)
    }

    fn encode_unsigned(&self, out: &mut dyn alloy_rlp::BufMut) {
        Header {
            list: true,
            payload_length: self.rlp_payload_length(),
        }
        .encode(out);
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas.encode(out);
        encode_to(self.to.as_ref(), out);
        self.value.encode(out);
        self.storage_limit.encode(out);
        self.epoch_height.encode(out);
        self.chain_id.encode(out);
        self.data.encode(out);
    }

    fn rlp_payload_length(&self) -> usize {
        self.nonce.length()
            + self.gas_price.length()
            + self.gas.length()
            + to_length(self.to.as_ref())
            + self.value.length()
            + self.storage_limit.length()
            + self.epoch_height.length()
            + self.chain_id.length()
            + self.data.length()
    }

    fn unsigned_length(&self) -> usize {
        let payload = self.rlp_payload_length();
        Header {
            list: true,
            payload_length: payload,
        }
        .length()
            + payload
    }

    /// Encode with signature; `v` is the recovery id
    pub fn encode_signed(&self, signature: &Signature) -> Vec<u8> {
        let v = signature.recovery_id;
        let r = U256::from_be_slice(&signature.r);
        let s = U256::from_be_slice(&signature.s);

        let mut stream = alloy_rlp::BytesMut::new();
        Header {
            list: true,
            payload_length: self.unsigned_length() + v.length() + r.length() + s.length(),
        }
        .encode(&mut stream);
        self.encode_unsigned(&mut stream);
        v.encode(&mut stream);
        r.encode(&mut stream);
        s.encode(&mut stream);

        stream.to_vec()
    }

    /// Decode a signed Conflux transaction
    pub fn decode_signed(raw: &[u8]) -> Result<(Self, Signature)> {
        let decode_err = |e: alloy_rlp::Error| {
            Error::ChainError(format!("Failed to decode Conflux transaction: {}", e))
        };
        let buf = &mut &raw[..];

        let outer = Header::decode(buf).map_err(decode_err)?;
        let inner = Header::decode(buf).map_err(decode_err)?;
        if !outer.list || !inner.list {
            return Err(Error::ChainError("Invalid Conflux transaction format".into()));
        }

        let mut fields = Vec::with_capacity(9);
        for _ in 0..9 {
            fields.push(alloy_rlp::Bytes::decode(buf).map_err(decode_err)?);
        }
        let v = alloy_rlp::Bytes::decode(buf).map_err(decode_err)?;
        let r = alloy_rlp::Bytes::decode(buf).map_err(decode_err)?;
        let s = alloy_rlp::Bytes::decode(buf).map_err(decode_err)?;
        if !buf.is_empty() {
            return Err(Error::ChainError("Trailing bytes after Conflux transaction".into()));
        }

        let recovery_id = decode_u64_from_bytes(&v)?;
        if recovery_id > 1 {
            return Err(Error::InvalidSignature(format!(
                "invalid recovery id {}",
                recovery_id
            )));
        }

        let tx = ConfluxTransaction {
            nonce: decode_u64_from_bytes(&fields[0])?,
            gas_price: decode_u128_from_bytes(&fields[1])?,
            gas: decode_u64_from_bytes(&fields[2])?,
            to: match fields[3].len() {
                0 => None,
                20 => Some(Address::from_slice(&fields[3])),
                n => return Err(Error::ChainError(format!("Invalid recipient length {}", n))),
            },
            value: U256::from_be_slice(&fields[4]),
            storage_limit: decode_u64_from_bytes(&fields[5])?,
            epoch_height: decode_u64_from_bytes(&fields[6])?,
            chain_id: decode_u64_from_bytes(&fields[7])?,
            data: Bytes::from(fields[8].to_vec()),
        };

        Ok((
            tx,
            Signature::new(left_pad_32(&r)?, left_pad_32(&s)?, recovery_id as u8),
        ))
    }
}

/// Result of `cfx_sign`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfxSignedMessage {
    pub from: String,
    pub signature: String,
}

/// Conflux signing capability for one keypair
#[derive(Debug, Clone)]
pub struct ConfluxSigner {
    keypair: Keypair,
    chain_id: u64,
}

impl ConfluxSigner {
    pub fn new(keypair: Keypair, chain_id: u64) -> Self {
        Self { keypair, chain_id }
    }

    /// Conflux account address (`0x1...`)
    pub fn address(&self) -> String {
        self.keypair.conflux_address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign a populated request; returns the `0x` serialized transaction
    pub fn sign_transaction(&self, request: &CfxTransactionRequest) -> Result<String> {
        let tx = ConfluxTransaction::from_request(request, self.chain_id)?;
        let signature = self.keypair.sign_prehash(&tx.signing_hash())?;
        Ok(encode_hex(tx.encode_signed(&signature)))
    }

    /// Sign the Keccak-256 of a message; hex strings are taken as bytes
    pub fn sign_message(&self, message: &str) -> Result<CfxSignedMessage> {
        let digest = keccak256_hash(&message_bytes(message));
        let signature = self.keypair.sign_prehash(&digest)?;
        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(signature.recovery_id);
        Ok(CfxSignedMessage {
            from: self.address(),
            signature: encode_hex(bytes),
        })
    }
}

/// Recover the Conflux address that signed a raw transaction
pub fn recover_conflux_signer(raw: &[u8]) -> Result<String> {
    let (tx, signature) = ConfluxTransaction::decode_signed(raw)?;
    let address = recover_address(&tx.signing_hash(), &signature)?;
    let mut bytes = address.0.0;
    bytes[0] = (bytes[0] & 0x0f) | 0x10;
    Ok(encode_hex(bytes))
}

/// Gas and storage estimate returned by `cfx_estimateGasAndCollateral`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GasAndCollateral {
    gas_used: String,
    storage_collateralized: String,
}

/// Conflux signer paired with a node connection
#[derive(Clone)]
pub struct ConfluxClient {
    signer: ConfluxSigner,
    transport: Arc<dyn RpcTransport>,
}

impl std::fmt::Debug for ConfluxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfluxClient")
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl ConfluxClient {
    pub fn new(signer: ConfluxSigner, transport: Arc<dyn RpcTransport>) -> Self {
        Self { signer, transport }
    }

    pub fn signer(&self) -> &ConfluxSigner {
        &self.signer
    }

    /// Prepare the request and fill every missing field from the node
    pub async fn populate(&self, request: &CfxTransactionRequest) -> Result<CfxTransactionRequest> {
        let from = self.signer.address();
        let mut tx = request.prepared_for_send(&from, self.signer.chain_id());
        let transport = self.transport.as_ref();

        if tx.nonce.is_none() {
            let nonce: String =
                super::call(transport, "cfx_getNextNonce", serde_json::json!([from])).await?;
            tx.nonce = Some(nonce);
        }

        if tx.gas_price.is_none() {
            let price: String =
                super::call(transport, "cfx_gasPrice", serde_json::json!([])).await?;
            tx.gas_price = Some(price);
        }

        if tx.gas.is_none() || tx.storage_limit.is_none() {
            let estimate: GasAndCollateral = super::call(
                transport,
                "cfx_estimateGasAndCollateral",
                serde_json::json!([tx]),
            )
            .await?;
            tx.gas.get_or_insert(estimate.gas_used);
            tx.storage_limit.get_or_insert(estimate.storage_collateralized);
        }

        if tx.epoch_height.is_none() {
            let epoch: String =
                super::call(transport, "cfx_epochNumber", serde_json::json!([])).await?;
            tx.epoch_height = Some(epoch);
        }

        Ok(tx)
    }

    /// Populate, sign and submit; returns the transaction hash
    pub async fn send_transaction(&self, request: &CfxTransactionRequest) -> Result<String> {
        let populated = self.populate(request).await?;
        let raw = self.signer.sign_transaction(&populated)?;
        let hash: String = super::call(
            self.transport.as_ref(),
            "cfx_sendRawTransaction",
            serde_json::json!([raw]),
        )
        .await?;
        tracing::info!(hash = %hash, from = %self.signer.address(), "Submitted Conflux transaction");
        Ok(hash)
    }

    /// `cfx_getTransactionByHash`; `Value::Null` while unknown to the node
    pub async fn get_transaction_by_hash(&self, hash: &str) -> Result<Value> {
        self.transport
            .request_value("cfx_getTransactionByHash", serde_json::json!([hash]))
            .await
    }
}
