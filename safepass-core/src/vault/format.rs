//! Persisted vault formats and content-only classification of stored bytes.
//!
//! Two formats have ever been written under the `passwords` entry:
//! - legacy: a bare JSON array of `{site, email, password}`
//! - current: `{encrypted, iv, version}` produced by the vault cipher

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record::CredentialRecord;
use crate::error::Result;

/// Blob store entry holding the vault.
pub const PASSWORDS_STORAGE_KEY: &str = "passwords";

/// Version tag written into every current envelope.
pub const ENVELOPE_VERSION: &str = "1.0";

/// The current encrypted vault representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentEnvelope {
    /// Base64 ciphertext of the JSON record array.
    pub encrypted: String,
    /// Marker naming the cipher that sealed `encrypted`.
    #[serde(default)]
    pub iv: String,
    pub version: String,
}

/// What the `passwords` entry can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageEnvelope {
    LegacyPlain(Vec<CredentialRecord>),
    Current(CurrentEnvelope),
}

impl StorageEnvelope {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            Self::LegacyPlain(records) => serde_json::to_vec(records)?,
            Self::Current(envelope) => serde_json::to_vec(envelope)?,
        };
        Ok(bytes)
    }
}

/// Outcome of classifying raw stored bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredPayload {
    Empty,
    /// Bare JSON array, elements not yet checked against the record shape.
    LegacyPlain(Vec<Value>),
    CurrentEnvelope(CurrentEnvelope),
    Unknown,
}

/// Kind of a `StoredPayload`, without its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Empty,
    LegacyPlain,
    CurrentEnvelope,
    Unknown,
}

impl StoredPayload {
    pub fn format(&self) -> PayloadFormat {
        match self {
            Self::Empty => PayloadFormat::Empty,
            Self::LegacyPlain(_) => PayloadFormat::LegacyPlain,
            Self::CurrentEnvelope(_) => PayloadFormat::CurrentEnvelope,
            Self::Unknown => PayloadFormat::Unknown,
        }
    }
}

/// Classify stored bytes by content alone.
pub fn classify_payload(raw: Option<&[u8]>) -> StoredPayload {
    let Some(raw) = raw else {
        return StoredPayload::Empty;
    };
    if raw.iter().all(u8::is_ascii_whitespace) {
        return StoredPayload::Empty;
    }

    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Array(items)) => StoredPayload::LegacyPlain(items),
        Ok(Value::Object(fields)) => match envelope_from_fields(fields) {
            Some(envelope) => StoredPayload::CurrentEnvelope(envelope),
            None => StoredPayload::Unknown,
        },
        Ok(_) | Err(_) => StoredPayload::Unknown,
    }
}

fn envelope_from_fields(mut fields: Map<String, Value>) -> Option<CurrentEnvelope> {
    let version = match fields.remove("version")? {
        Value::String(version) => version,
        _ => return None,
    };
    let encrypted = match fields.remove("encrypted")? {
        Value::String(encrypted) => encrypted,
        _ => return None,
    };
    let iv = match fields.remove("iv") {
        Some(Value::String(iv)) => iv,
        _ => String::new(),
    };
    Some(CurrentEnvelope {
        encrypted,
        iv,
        version,
    })
}
