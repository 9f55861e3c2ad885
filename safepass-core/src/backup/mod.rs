//! Backup export and import.
//!
//! Two formats share one entry point: encrypted `.safepass` containers and
//! plain CSV. Neither touches live vault storage; they turn records into
//! bytes and back.

pub mod container;
pub mod csv_codec;
mod service;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

pub use container::{
    export_encrypted, import_encrypted, BackupContainer, BACKUP_FORMAT_VERSION, LEGACY_BACKUP_KEY,
};
pub use csv_codec::{export_csv, import_csv, CSV_HEADER};
pub use service::BackupService;

use crate::error::Result;
use crate::vault::cipher::VaultCipher;
use crate::vault::{CredentialRecord, KeyMaterial};

const BACKUP_FILE_PREFIX: &str = "SafePass_Backup_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupFormat {
    Csv,
    Encrypted,
}

impl BackupFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Encrypted => "safepass",
        }
    }

    /// Format named by a file extension, case-insensitive.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "safepass" => Some(Self::Encrypted),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Pick the import path for a backup file.
///
/// The extension wins when it is recognized. Otherwise a JSON object with a
/// `version` field is taken as an encrypted container and anything else as
/// CSV.
pub fn detect_format(file_name: Option<&str>, bytes: &[u8]) -> BackupFormat {
    if let Some(format) = file_name.and_then(BackupFormat::from_file_name) {
        return format;
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(fields)) if fields.contains_key("version") => BackupFormat::Encrypted,
        _ => BackupFormat::Csv,
    }
}

/// Decode a backup file into records, choosing the format with `detect_format`.
pub fn import_backup(
    cipher: &dyn VaultCipher,
    key: &KeyMaterial,
    file_name: Option<&str>,
    bytes: &[u8],
) -> Result<Vec<CredentialRecord>> {
    let format = detect_format(file_name, bytes);
    debug!("Importing backup {:?} as {:?}", file_name, format);

    match format {
        BackupFormat::Encrypted => import_encrypted(cipher, key, bytes),
        BackupFormat::Csv => import_csv(bytes),
    }
}

/// `SafePass_Backup_<YYYY-MM-DD>.<ext>`
pub fn backup_file_name(format: BackupFormat, now: DateTime<Utc>) -> String {
    format!(
        "{}{}.{}",
        BACKUP_FILE_PREFIX,
        now.format("%Y-%m-%d"),
        format.extension()
    )
}
