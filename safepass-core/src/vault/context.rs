use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::cipher::{VaultCipher, XorCipher};
use super::key::{get_or_create_key, KeyMaterial, KeySource};
use crate::platform::BlobStore;

/// Storage, cipher and key state for one vault.
///
/// Passed explicitly into every codec and migration call so several vaults
/// (or tests) can coexist in one process.
pub struct VaultContext {
    store: Arc<dyn BlobStore>,
    cipher: Arc<dyn VaultCipher>,
    key: Mutex<Option<(KeyMaterial, KeySource)>>,
    /// Stored vault exists but this session could not open it.
    stored_unopened: AtomicBool,
}

impl VaultContext {
    pub fn new(store: Arc<dyn BlobStore>, cipher: Arc<dyn VaultCipher>) -> Self {
        Self {
            store,
            cipher,
            key: Mutex::new(None),
            stored_unopened: AtomicBool::new(false),
        }
    }

    /// Context using the format-compatible `XorCipher`.
    pub fn with_default_cipher(store: Arc<dyn BlobStore>) -> Self {
        Self::new(store, Arc::new(XorCipher))
    }

    pub fn store(&self) -> &dyn BlobStore {
        self.store.as_ref()
    }

    pub fn cipher(&self) -> &dyn VaultCipher {
        self.cipher.as_ref()
    }

    /// Key material for this session, created on first use.
    pub async fn key(&self) -> KeyMaterial {
        self.resolve_key().await.0
    }

    /// Key material and where it came from, read under one lock.
    ///
    /// A key that could not be read is not cached, so the next call tries
    /// the store again.
    pub async fn resolve_key(&self) -> (KeyMaterial, KeySource) {
        // Held across the store round-trip so concurrent first calls create one key
        let mut slot = self.key.lock().await;
        if let Some((key, source)) = slot.as_ref() {
            if *source != KeySource::Unreadable {
                return (key.clone(), *source);
            }
        }
        let (key, source) = get_or_create_key(self.store()).await;
        *slot = Some((key.clone(), source));
        (key, source)
    }

    /// Where the session key came from, if it has been resolved yet.
    pub async fn key_source(&self) -> Option<KeySource> {
        self.key.lock().await.as_ref().map(|(_, source)| *source)
    }

    /// Drop the cached key so the next `key()` call goes back to storage.
    pub(crate) async fn forget_key(&self) {
        *self.key.lock().await = None;
    }

    /// True while the stored vault could not be read or decrypted because
    /// storage failed. Saves refuse to overwrite it until a load succeeds.
    pub fn stored_vault_unopened(&self) -> bool {
        self.stored_unopened.load(Ordering::SeqCst)
    }

    pub(crate) fn set_stored_vault_unopened(&self, unopened: bool) {
        self.stored_unopened.store(unopened, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for VaultContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultContext")
            .field("cipher", &self.cipher.marker())
            .field("stored_vault_unopened", &self.stored_vault_unopened())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryBlobStore;
    use crate::vault::key::KEY_STORAGE_KEY;

    #[tokio::test]
    async fn test_key_cached_for_session() {
        let store = Arc::new(MemoryBlobStore::new());
        let ctx = VaultContext::with_default_cipher(store.clone());

        assert_eq!(ctx.key_source().await, None);
        let first = ctx.key().await;
        let second = ctx.key().await;
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(ctx.key_source().await, Some(KeySource::Created));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_key_is_not_persisted_later_in_session() {
        let store = Arc::new(MemoryBlobStore::new());
        store.set_fail_writes(true);
        let ctx = VaultContext::with_default_cipher(store.clone());

        let fallback = ctx.key().await;
        store.set_fail_writes(false);
        let again = ctx.key().await;

        assert_eq!(fallback.as_bytes(), again.as_bytes());
        assert_eq!(ctx.key_source().await, Some(KeySource::SessionFallback));
        assert_eq!(store.snapshot(KEY_STORAGE_KEY).await, None);
    }

    #[tokio::test]
    async fn test_unreadable_key_is_retried() {
        let store = Arc::new(MemoryBlobStore::new());
        store.insert(KEY_STORAGE_KEY, "stored-key").await;
        let ctx = VaultContext::with_default_cipher(store.clone());

        store.set_fail_reads(true);
        let (_, source) = ctx.resolve_key().await;
        assert_eq!(source, KeySource::Unreadable);

        store.set_fail_reads(false);
        let (key, source) = ctx.resolve_key().await;
        assert_eq!(source, KeySource::Stored);
        assert_eq!(key.as_bytes(), b"stored-key");
        assert_eq!(store.write_count(), 0);
    }
}
