//! Vault key material: lazily created, persisted once, never rotated.

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::platform::BlobStore;

/// Blob store entry holding the derived key string.
pub const KEY_STORAGE_KEY: &str = "encryption_key";

/// Length of the derived key string (hex characters of a SHA-256 digest).
pub const KEY_LENGTH: usize = 32;

const KEY_PASSPHRASE: &str = "safepass-vault-key-v1";

/// Symmetric key material for the vault cipher.
///
/// Stored as the hex text the blob store holds, so keys written by earlier
/// releases load unchanged. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    key: String,
}

impl KeyMaterial {
    /// Use a caller-provided key string. `None` for blank input.
    pub fn from_passphrase(key: &str) -> Option<Self> {
        if key.is_empty() {
            return None;
        }
        Some(Self {
            key: key.to_string(),
        })
    }

    /// Parse the bytes read from the blob store.
    pub fn from_stored(bytes: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(bytes).ok()?;
        Self::from_passphrase(text.trim())
    }

    /// SHA-256 of `seed`, hex encoded, truncated to `KEY_LENGTH`.
    pub fn derive(seed: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        let mut key = hex::encode(hasher.finalize());
        key.truncate(KEY_LENGTH);
        Self { key }
    }

    /// Fresh key salted with the current time.
    pub fn generate() -> Self {
        Self::derive(&format!("{}{}", KEY_PASSPHRASE, Utc::now().timestamp_millis()))
    }

    /// Key used for a session whose key could not be persisted.
    ///
    /// Derived from the fixed passphrase alone, so it is weaker than a
    /// persisted key but lets the session keep working.
    pub fn session_fallback() -> Self {
        Self::derive(KEY_PASSPHRASE)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.key.as_bytes()
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the actual key material
        f.debug_struct("KeyMaterial")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Where the key returned by `get_or_create_key` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Stored,
    Created,
    /// Persistence failed; the key lives only in this session.
    SessionFallback,
    /// The stored key could not be read. The returned key is the session
    /// fallback and must not be used to overwrite an encrypted vault.
    Unreadable,
}

/// Return the persisted key, creating and persisting one on first use.
///
/// Never fails: if the store cannot be read or written, a session-only key
/// derived from the fixed passphrase is returned instead, tagged
/// `Unreadable` or `SessionFallback` respectively.
pub async fn get_or_create_key(store: &dyn BlobStore) -> (KeyMaterial, KeySource) {
    match store.get(KEY_STORAGE_KEY).await {
        Ok(Some(bytes)) => {
            if let Some(key) = KeyMaterial::from_stored(&bytes) {
                debug!("Loaded vault key from storage");
                return (key, KeySource::Stored);
            }
            warn!("Stored vault key is unusable, creating a new one");
        }
        Ok(None) => {}
        Err(e) => {
            // Do not write: the stored key may only be temporarily unreadable
            warn!("Failed to read vault key, using session key: {}", e);
            return (KeyMaterial::session_fallback(), KeySource::Unreadable);
        }
    }

    let key = KeyMaterial::generate();
    match store.set(KEY_STORAGE_KEY, key.as_bytes()).await {
        Ok(()) => {
            info!("Created and persisted new vault key");
            (key, KeySource::Created)
        }
        Err(e) => {
            warn!("Failed to persist vault key, using session key: {}", e);
            (KeyMaterial::session_fallback(), KeySource::SessionFallback)
        }
    }
}
