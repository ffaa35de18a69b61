//! Persisted Local State
//!
//! The bridge keeps a handful of string values (wallet entropy and mnemonic)
//! in a key/value store. Two backends are provided:
//!
//! - **MemoryStore**: process-local, for tests and ephemeral sessions
//! - **FileSystemStore**: one file per key, optionally sealed with ChaCha20-Poly1305
//!
//! ## Example
//!
//! ```rust,ignore
//! use wallet_bridge_core::storage::{FileSystemStore, KeyValueStore};
//!
//! let store = FileSystemStore::new("/var/lib/wallet-bridge")?.with_passphrase("hunter2")?;
//! store.set("MNEMONIC", &phrase).await?;
//! let phrase = store.get("MNEMONIC").await?;
//! ```

use crate::{Error, Result};
use async_trait::async_trait;
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

/// Storage key holding the wallet entropy
pub const ENTROPY_KEY: &str = "ENTROPY";

/// Storage key holding the wallet mnemonic
pub const MNEMONIC_KEY: &str = "MNEMONIC";

const VALUE_EXTENSION: &str = "value";
const SALT_FILE: &str = "store.salt";

/// Trait for key/value storage backends
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value; `None` when the key was never written
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value
    async fn remove(&self, key: &str) -> Result<()>;

    /// List stored keys
    async fn keys(&self) -> Result<Vec<String>>;
}

/// A value sealed with ChaCha20-Poly1305
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedValue {
    /// Encrypted value, hex encoded
    pub ciphertext: String,
    /// Nonce used for encryption (12 bytes)
    pub nonce: [u8; 12],
    /// Format version
    pub version: u32,
}

impl SealedValue {
    /// Current version of the sealed format
    pub const CURRENT_VERSION: u32 = 1;

    /// Encrypt a value with a random nonce
    pub fn seal(value: &str, encryption_key: &[u8; 32]) -> Result<Self> {
        let cipher = ChaCha20Poly1305::new(encryption_key.into());
        let nonce_bytes: [u8; 12] = rand::random();

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), value.as_bytes())
            .map_err(|e| Error::Encryption(e.to_string()))?;

        Ok(Self {
            ciphertext: hex::encode(ciphertext),
            nonce: nonce_bytes,
            version: Self::CURRENT_VERSION,
        })
    }

    /// Decrypt the value
    pub fn open(&self, encryption_key: &[u8; 32]) -> Result<String> {
        let cipher = ChaCha20Poly1305::new(encryption_key.into());
        let ciphertext = hex::decode(&self.ciphertext)?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&self.nonce), ciphertext.as_ref())
            .map_err(|_| {
                Error::Encryption("Decryption failed - invalid key or corrupted data".into())
            })?;

        String::from_utf8(plaintext).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.values.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// File system store, one file per key
pub struct FileSystemStore {
    base_path: PathBuf,
    encryption_key: Option<Zeroizing<[u8; 32]>>,
}

impl std::fmt::Debug for FileSystemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemStore")
            .field("base_path", &self.base_path)
            .field("encrypted", &self.encryption_key.is_some())
            .finish()
    }
}

impl FileSystemStore {
    /// Create a new file system store, creating the directory if needed
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();

        if !base_path.exists() {
            std::fs::create_dir_all(&base_path)?;
        }

        Ok(Self {
            base_path,
            encryption_key: None,
        })
    }

    /// Seal values with a raw 32-byte key
    pub fn with_encryption_key(mut self, key: [u8; 32]) -> Self {
        self.encryption_key = Some(Zeroizing::new(key));
        self
    }

    /// Seal values with a key derived from `passphrase` and the store's salt.
    /// The salt is created on first use and kept next to the values.
    pub fn with_passphrase(self, passphrase: &str) -> Result<Self> {
        let salt_path = self.base_path.join(SALT_FILE);
        let salt: [u8; 32] = if salt_path.exists() {
            let encoded = std::fs::read_to_string(&salt_path)?;
            hex::decode(encoded.trim())?
                .try_into()
                .map_err(|_| Error::Storage("Corrupted store salt".into()))?
        } else {
            let salt: [u8; 32] = rand::random();
            std::fs::write(&salt_path, hex::encode(salt))?;
            restrict_permissions(&salt_path)?;
            salt
        };

        let key = derive_key_from_password(passphrase, &salt)?;
        Ok(self.with_encryption_key(key))
    }

    /// Whether values are sealed
    pub fn is_encrypted(&self) -> bool {
        self.encryption_key.is_some()
    }

    fn value_path(&self, key: &str) -> PathBuf {
        // Sanitize key to prevent path traversal
        let safe_key = key.replace(['/', '\\', '.', '~'], "_");
        self.base_path
            .join(format!("{}.{}", safe_key, VALUE_EXTENSION))
    }
}

fn restrict_permissions(path: &std::path::Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[async_trait]
impl KeyValueStore for FileSystemStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.value_path(key);

        if !path.exists() {
            return Ok(None);
        }

        let data = tokio::fs::read(&path).await?;
        let value = match &self.encryption_key {
            Some(encryption_key) => {
                let sealed: SealedValue = serde_json::from_slice(&data)
                    .map_err(|e| Error::Deserialization(e.to_string()))?;
                sealed.open(encryption_key)?
            }
            None => String::from_utf8(data).map_err(|e| Error::Deserialization(e.to_string()))?,
        };

        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.value_path(key);
        let data = match &self.encryption_key {
            Some(encryption_key) => serde_json::to_vec_pretty(&SealedValue::seal(value, encryption_key)?)?,
            None => value.as_bytes().to_vec(),
        };

        tokio::fs::write(&path, data).await?;
        restrict_permissions(&path)?;
        tracing::debug!(key, path = %path.display(), "Stored value");

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.value_path(key);

        if path.exists() {
            // Overwrite with zeros before deleting
            let size = tokio::fs::metadata(&path).await?.len() as usize;
            tokio::fs::write(&path, vec![0u8; size]).await?;
            tokio::fs::remove_file(&path).await?;
        }

        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some(VALUE_EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                keys.push(stem.to_string());
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Read a value, generating and persisting it on first access
pub async fn get_or_generate<F>(store: &dyn KeyValueStore, key: &str, generate: F) -> Result<String>
where
    F: FnOnce() -> Result<String> + Send,
{
    if let Some(value) = store.get(key).await?
        && !value.is_empty()
    {
        return Ok(value);
    }

    let value = generate()?;
    store.set(key, &value).await?;
    tracing::info!(key, "Generated and persisted new value");
    Ok(value)
}

/// Derive an encryption key from a password with iterated SHA-256
pub fn derive_key_from_password(password: &str, salt: &[u8; 32]) -> Result<[u8; 32]> {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);

    let mut result = hasher.finalize();
    for _ in 0..10000 {
        let mut hasher = Sha256::new();
        hasher.update(result);
        hasher.update(salt);
        result = hasher.finalize();
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&result);
    Ok(key)
}

/// Generate a random encryption key
pub fn generate_encryption_key() -> [u8; 32] {
    rand::random()
}
