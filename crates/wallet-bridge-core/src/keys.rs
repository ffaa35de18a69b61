//! # Key Derivation
//!
//! Entropy, BIP-39 mnemonics and BIP-32 derivation of secp256k1 keypairs.
//!
//! A wallet is fully determined by 16 bytes of entropy: the entropy maps to a
//! 12-word English mnemonic, the mnemonic to a seed, and the seed plus a
//! derivation path to a keypair. Account `i` lives at `{base_path}/{i}`.

use crate::types::{Signature, keccak256_hash};
use crate::{Error, Result};
use alloy_primitives::Address;
use bip32::{ChildNumber, DerivationPath, Prefix, XPrv};
use bip39::{Language, Mnemonic, Seed};
use k256::ecdsa::{RecoveryId, SigningKey, VerifyingKey};
use rand::RngCore;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Entropy length in bytes (12-word mnemonic)
pub const ENTROPY_LEN: usize = 16;

/// Generate fresh wallet entropy, hex encoded with `0x` prefix
pub fn generate_entropy() -> String {
    let mut bytes = [0u8; ENTROPY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let encoded = format!("0x{}", hex::encode(bytes));
    zeroize::Zeroize::zeroize(&mut bytes);
    encoded
}

/// Convert hex entropy into an English BIP-39 mnemonic phrase
pub fn entropy_to_mnemonic(entropy: &str) -> Result<String> {
    let bytes = Zeroizing::new(crate::types::decode_hex(entropy)?);
    let mnemonic = Mnemonic::from_entropy(&bytes, Language::English)
        .map_err(|e| Error::Derivation(format!("Invalid entropy: {}", e)))?;
    Ok(mnemonic.phrase().to_string())
}

/// Join a base derivation path and an account index
pub fn account_path(base_path: &str, index: u32) -> String {
    format!("{}/{}", base_path.trim_end_matches('/'), index)
}

// ============================================================================
// Keypair
// ============================================================================

/// A secp256k1 keypair usable for both Ethereum and Conflux signing
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair {{ address: {} }}", self.eth_address())
    }
}

impl Keypair {
    /// Create a keypair from raw 32-byte private key bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let signing_key = SigningKey::from_bytes(bytes.into())
            .map_err(|_| Error::Crypto("Invalid private key".into()))?;
        Ok(Self { signing_key })
    }

    /// Create a keypair from a hex private key
    pub fn from_hex(private_key: &str) -> Result<Self> {
        let bytes = Zeroizing::new(crate::types::decode_hex(private_key)?);
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::Crypto(format!("Invalid private key length: {}", bytes.len())))?;
        Self::from_bytes(&array)
    }

    /// Generate a random keypair
    pub fn random() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    /// Raw private key bytes
    pub fn private_key_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes().into())
    }

    /// Private key as `0x` hex
    pub fn private_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("0x{}", hex::encode(*self.private_key_bytes())))
    }

    /// Public key as uncompressed bytes (65 bytes: 0x04 || x || y)
    pub fn public_key_uncompressed(&self) -> [u8; 65] {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        let mut result = [0u8; 65];
        result.copy_from_slice(point.as_bytes());
        result
    }

    /// Raw 20-byte account address
    pub fn address(&self) -> Address {
        address_from_verifying_key(self.signing_key.verifying_key())
    }

    /// EIP-55 checksummed Ethereum address
    pub fn eth_address(&self) -> String {
        self.address().to_checksum(None)
    }

    /// Conflux user address: the account address with its type nibble set to `1`
    pub fn conflux_address(&self) -> String {
        let mut bytes: [u8; 20] = self.address().0.0;
        bytes[0] = (bytes[0] & 0x0f) | 0x10;
        format!("0x{}", hex::encode(bytes))
    }

    /// Sign a 32-byte digest with a recoverable signature
    pub fn sign_prehash(&self, digest: &[u8; 32]) -> Result<Signature> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| Error::Crypto(format!("Signing failed: {}", e)))?;

        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(Signature::new(r, s, recovery_id.to_byte()))
    }
}

fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256_hash(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Recover the signing address of a 32-byte digest
pub fn recover_address(digest: &[u8; 32], signature: &Signature) -> Result<Address> {
    let sig = k256::ecdsa::Signature::from_slice(&signature.to_bytes())
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;
    let recovery_id = RecoveryId::from_byte(signature.recovery_id)
        .ok_or_else(|| Error::InvalidSignature(format!("bad recovery id {}", signature.recovery_id)))?;
    let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;
    Ok(address_from_verifying_key(&key))
}

// ============================================================================
// HD Wallet
// ============================================================================

/// BIP-32 wallet rooted at a BIP-39 seed
#[derive(Clone)]
pub struct HdWallet {
    seed: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for HdWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdWallet").finish_non_exhaustive()
    }
}

impl HdWallet {
    /// Build a wallet from a mnemonic phrase (empty passphrase)
    pub fn from_mnemonic(phrase: &str) -> Result<Self> {
        let mnemonic = Mnemonic::from_phrase(phrase.trim(), Language::English)
            .map_err(|e| Error::Derivation(format!("Invalid mnemonic phrase: {}", e)))?;
        let seed = Seed::new(&mnemonic, "");
        Ok(Self {
            seed: Zeroizing::new(seed.as_bytes().to_vec()),
        })
    }

    /// Extended private key at a derivation path
    pub fn extended_key(&self, path: &str) -> Result<ExtendedKey> {
        let path = DerivationPath::from_str(path)
            .map_err(|e| Error::Derivation(format!("Invalid derivation path {}: {}", path, e)))?;
        let xprv = XPrv::derive_from_path(self.seed.as_slice(), &path)?;
        Ok(ExtendedKey { xprv })
    }

    /// Keypair at a full derivation path
    pub fn derive(&self, path: &str) -> Result<Keypair> {
        Ok(self.extended_key(path)?.keypair())
    }

    /// Keypair for account `index` under `base_path`
    pub fn keypair_at(&self, base_path: &str, index: u32) -> Result<Keypair> {
        self.derive(&account_path(base_path, index))
    }
}

/// A BIP-32 node holding its private key
#[derive(Clone)]
pub struct ExtendedKey {
    xprv: XPrv,
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("xpub", &self.xpub())
            .finish()
    }
}

impl ExtendedKey {
    /// Serialized extended public key (`xpub...`) of this node
    pub fn xpub(&self) -> String {
        self.xprv.public_key().to_string(Prefix::XPUB)
    }

    /// Keypair of this node
    pub fn keypair(&self) -> Keypair {
        Keypair {
            signing_key: self.xprv.private_key().clone(),
        }
    }

    /// Derive a descendant along a relative path such as `"0"` or `"1/2"`
    pub fn derive_relative(&self, path: &str) -> Result<ExtendedKey> {
        let mut xprv = self.xprv.clone();
        for segment in path.trim_start_matches("m/").split('/').filter(|s| !s.is_empty()) {
            let (index, hardened) = match segment.strip_suffix('\'') {
                Some(index) => (index, true),
                None => (segment, false),
            };
            let index: u32 = index
                .parse()
                .map_err(|_| Error::Derivation(format!("Invalid path segment: {}", segment)))?;
            xprv = xprv.derive_child(ChildNumber::new(index, hardened)?)?;
        }
        Ok(ExtendedKey { xprv })
    }
}
