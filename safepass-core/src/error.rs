//! Error types for vault, backup and reveal operations.
//!
//! Load paths never surface these to the host: storage and decrypt failures
//! degrade to an empty vault and are only logged. Import, export and reveal
//! failures are returned to the caller so the UI can act on them.

use std::fmt;

use thiserror::Error;

/// Why biometric authentication cannot be attempted on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthUnavailable {
    /// The device has no biometric sensor.
    NoHardware,
    /// The sensor exists but the user has not enrolled a biometric.
    NotEnrolled,
}

impl fmt::Display for AuthUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHardware => write!(f, "device has no biometric hardware"),
            Self::NotEnrolled => write!(f, "no biometric enrolled on this device"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SafePassError {
    /// Reading from the blob store failed.
    #[error("Storage read error: {0}")]
    StorageRead(String),

    /// Writing to the blob store failed. Previously persisted bytes are intact.
    #[error("Storage write error: {0}")]
    StorageWrite(String),

    /// An envelope or backup payload could not be decoded with the key material.
    #[error("Decrypt error: {0}")]
    Decrypt(String),

    /// The encrypted backup container is missing required fields.
    #[error("Backup format error: {0}")]
    Format(String),

    /// The backup file could not be turned into any records.
    #[error("Import parse error: {0}")]
    ImportParse(String),

    #[error("Authentication unavailable: {0}")]
    AuthenticationUnavailable(AuthUnavailable),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Encryption error: {0}")]
    Encryption(String),

    /// A record was rejected before entering the vault.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("No record at position {0}")]
    RecordNotFound(usize),

    #[error("Vault is empty, nothing to export")]
    EmptyVault,

    #[error("Share error: {0}")]
    Share(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SafePassError {
    /// Stable code for programmatic handling on the host side.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StorageRead(_) => "STORAGE_READ_ERROR",
            Self::StorageWrite(_) => "STORAGE_WRITE_ERROR",
            Self::Decrypt(_) => "DECRYPT_ERROR",
            Self::Format(_) => "FORMAT_ERROR",
            Self::ImportParse(_) => "IMPORT_PARSE_ERROR",
            Self::AuthenticationUnavailable(AuthUnavailable::NoHardware) => "NO_BIOMETRIC_HARDWARE",
            Self::AuthenticationUnavailable(AuthUnavailable::NotEnrolled) => {
                "BIOMETRIC_NOT_ENROLLED"
            }
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::Encryption(_) => "ENCRYPTION_ERROR",
            Self::InvalidRecord(_) => "INVALID_RECORD",
            Self::RecordNotFound(_) => "RECORD_NOT_FOUND",
            Self::EmptyVault => "EMPTY_VAULT",
            Self::Share(_) => "SHARE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

impl serde::Serialize for SafePassError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("SafePassError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

pub type Result<T> = std::result::Result<T, SafePassError>;
