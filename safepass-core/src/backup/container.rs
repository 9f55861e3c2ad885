//! Encrypted backup files (`.safepass`).
//!
//! JSON body: `{version, timestamp, count, data}` where `data` is the
//! vault cipher's ciphertext of the record array.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Result, SafePassError};
use crate::vault::cipher::{open_records, seal_records, VaultCipher, XorCipher};
use crate::vault::{CredentialRecord, KeyMaterial};

pub const BACKUP_FORMAT_VERSION: &str = "1.0";

/// Fixed key early releases sealed every backup with.
pub const LEGACY_BACKUP_KEY: &str = "safe-pass-backup-key-2024";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupContainer {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub count: usize,
    pub data: String,
}

pub fn export_encrypted(
    cipher: &dyn VaultCipher,
    key: &KeyMaterial,
    records: &[CredentialRecord],
    now: DateTime<Utc>,
) -> Result<Vec<u8>> {
    let container = BackupContainer {
        version: BACKUP_FORMAT_VERSION.to_string(),
        timestamp: now,
        count: records.len(),
        data: seal_records(cipher, records, key)?,
    };
    Ok(serde_json::to_vec(&container)?)
}

/// Decode an encrypted backup.
///
/// Fails with `Format` when the version tag or payload is missing and with
/// `Decrypt` when neither the current key nor the legacy backup key opens it.
pub fn import_encrypted(
    cipher: &dyn VaultCipher,
    key: &KeyMaterial,
    bytes: &[u8],
) -> Result<Vec<CredentialRecord>> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| SafePassError::Format(format!("Backup is not JSON: {}", e)))?;
    let Value::Object(fields) = value else {
        return Err(SafePassError::Format("Backup is not a JSON object".into()));
    };

    if fields.get("version").map_or(true, Value::is_null) {
        return Err(SafePassError::Format("Backup has no version field".into()));
    }
    let data = match fields.get("data") {
        Some(Value::String(data)) => data,
        Some(_) => return Err(SafePassError::Format("Backup data is not text".into())),
        None => return Err(SafePassError::Format("Backup has no data field".into())),
    };

    let records = match open_records(cipher, data, key) {
        Ok(records) => records,
        Err(current_err) => {
            let legacy = KeyMaterial::from_passphrase(LEGACY_BACKUP_KEY)
                .and_then(|legacy_key| open_records(&XorCipher, data, &legacy_key).ok());
            match legacy {
                Some(records) => {
                    info!("Backup was sealed with the legacy backup key");
                    records
                }
                None => return Err(current_err),
            }
        }
    };

    if let Some(count) = fields.get("count").and_then(Value::as_u64) {
        if count != records.len() as u64 {
            warn!(
                "Backup header claims {} records, payload holds {}",
                count,
                records.len()
            );
        }
    }

    Ok(records)
}
