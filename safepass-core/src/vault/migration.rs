//! Loading vault bytes of any known format, write-back migration, and the
//! save path.
//!
//! | stored payload    | load returns          | side effect                  |
//! |-------------------|-----------------------|------------------------------|
//! | Empty             | no records            | none                         |
//! | LegacyPlain       | decoded records       | rewritten as CurrentEnvelope |
//! | CurrentEnvelope   | decrypted records     | none                         |
//! | Unknown           | no records            | none, bytes left untouched   |

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::cipher;
use super::context::VaultContext;
use super::format::{
    classify_payload, PayloadFormat, StorageEnvelope, StoredPayload, PASSWORDS_STORAGE_KEY,
};
use super::key::{KeySource, KEY_STORAGE_KEY};
use super::record::CredentialRecord;
use crate::error::{Result, SafePassError};

/// Result of `load_vault`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub records: Vec<CredentialRecord>,
    /// Format found in storage before any migration.
    pub format: PayloadFormat,
    /// Whether a legacy payload was rewritten in the current format.
    pub migrated: bool,
}

impl LoadOutcome {
    fn empty(format: PayloadFormat) -> Self {
        Self {
            records: Vec::new(),
            format,
            migrated: false,
        }
    }
}

/// How `save_vault` persisted the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Encrypted,
    /// Encryption was not possible; records were written as a legacy array.
    PlainFallback,
}

/// Load the vault, migrating a legacy payload in place.
///
/// Never fails: read and decode problems are logged and yield an empty vault
/// so the host can always start.
pub async fn load_vault(ctx: &VaultContext) -> LoadOutcome {
    let raw = match ctx.store().get(PASSWORDS_STORAGE_KEY).await {
        Ok(raw) => raw,
        Err(e) => {
            error!("Failed to read vault, starting empty: {}", e);
            ctx.set_stored_vault_unopened(true);
            return LoadOutcome::empty(PayloadFormat::Unknown);
        }
    };
    ctx.set_stored_vault_unopened(false);

    match classify_payload(raw.as_deref()) {
        StoredPayload::Empty => {
            debug!("No stored vault");
            LoadOutcome::empty(PayloadFormat::Empty)
        }
        StoredPayload::LegacyPlain(items) => migrate_legacy(ctx, items).await,
        StoredPayload::CurrentEnvelope(envelope) => {
            let (key, source) = ctx.resolve_key().await;
            if source == KeySource::Unreadable {
                error!("Vault key is unreadable, starting empty and keeping the stored vault");
                ctx.set_stored_vault_unopened(true);
                return LoadOutcome::empty(PayloadFormat::CurrentEnvelope);
            }
            let records = cipher::decrypt(ctx.cipher(), &envelope, &key);
            debug!("Loaded {} records from encrypted vault", records.len());
            LoadOutcome {
                records,
                format: PayloadFormat::CurrentEnvelope,
                migrated: false,
            }
        }
        StoredPayload::Unknown => {
            warn!("Stored vault has an unrecognized format, leaving it untouched");
            LoadOutcome::empty(PayloadFormat::Unknown)
        }
    }
}

async fn migrate_legacy(ctx: &VaultContext, items: Vec<Value>) -> LoadOutcome {
    let records: Vec<CredentialRecord> = match serde_json::from_value(Value::Array(items)) {
        Ok(records) => records,
        Err(e) => {
            // Not our record shape: keep the bytes for manual recovery
            warn!("Legacy vault does not hold records, leaving it untouched: {}", e);
            return LoadOutcome::empty(PayloadFormat::LegacyPlain);
        }
    };

    info!("Migrating {} records from legacy plain vault", records.len());
    let migrated = match save_vault(ctx, &records).await {
        Ok(SaveOutcome::Encrypted) => true,
        Ok(SaveOutcome::PlainFallback) => false,
        Err(e) => {
            warn!("Write-back migration failed, will retry on next load: {}", e);
            false
        }
    };

    LoadOutcome {
        records,
        format: PayloadFormat::LegacyPlain,
        migrated,
    }
}

/// Persist `records` as a current envelope.
///
/// Falls back to a plain legacy write when the records cannot be sealed with
/// a key that survives the session. The previous bytes stay in place if the
/// write itself fails.
///
/// Refuses with `StorageWrite` while an encrypted vault is stored that this
/// session could not open.
pub async fn save_vault(ctx: &VaultContext, records: &[CredentialRecord]) -> Result<SaveOutcome> {
    if ctx.stored_vault_unopened() {
        return Err(refuse_overwrite());
    }

    let (key, source) = ctx.resolve_key().await;
    if source == KeySource::Unreadable && !stored_vault_replaceable(ctx).await {
        ctx.set_stored_vault_unopened(true);
        return Err(refuse_overwrite());
    }

    let session_only = matches!(source, KeySource::SessionFallback | KeySource::Unreadable);
    let (envelope, outcome) = if session_only {
        warn!("Vault key is not persisted, saving vault unencrypted");
        (
            StorageEnvelope::LegacyPlain(records.to_vec()),
            SaveOutcome::PlainFallback,
        )
    } else {
        match cipher::encrypt(ctx.cipher(), records, &key) {
            Ok(envelope) => (StorageEnvelope::Current(envelope), SaveOutcome::Encrypted),
            Err(e) => {
                warn!("Failed to encrypt vault, saving unencrypted: {}", e);
                (
                    StorageEnvelope::LegacyPlain(records.to_vec()),
                    SaveOutcome::PlainFallback,
                )
            }
        }
    };

    let bytes = envelope.to_bytes()?;
    ctx.store()
        .set(PASSWORDS_STORAGE_KEY, &bytes)
        .await
        .map_err(|e| match e {
            SafePassError::StorageWrite(_) => e,
            other => SafePassError::StorageWrite(other.to_string()),
        })?;

    debug!("Saved {} records ({:?})", records.len(), outcome);
    Ok(outcome)
}

fn refuse_overwrite() -> SafePassError {
    SafePassError::StorageWrite(
        "Stored vault could not be opened this session, refusing to overwrite it".into(),
    )
}

/// Whether the stored payload can be replaced without the vault key.
async fn stored_vault_replaceable(ctx: &VaultContext) -> bool {
    match ctx.store().get(PASSWORDS_STORAGE_KEY).await {
        Ok(raw) => !matches!(
            classify_payload(raw.as_deref()),
            StoredPayload::CurrentEnvelope(_)
        ),
        Err(_) => false,
    }
}

/// Irreversibly delete the stored vault and its key.
pub async fn force_reset(ctx: &VaultContext) -> Result<()> {
    warn!("Resetting vault - all stored records and the key will be lost!");

    ctx.store().remove(PASSWORDS_STORAGE_KEY).await?;
    info!("Deleted stored vault");

    ctx.store().remove(KEY_STORAGE_KEY).await?;
    ctx.forget_key().await;
    ctx.set_stored_vault_unopened(false);
    info!("Deleted vault key");

    Ok(())
}
