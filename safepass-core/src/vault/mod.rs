//! Vault module - credential storage, formats and lifecycle.
//!
//! This module provides:
//! - Key material creation and persistence (`key`)
//! - Payload classification for every stored format (`format`)
//! - Pluggable ciphers for the current envelope (`cipher`)
//! - Load with write-back migration, save and reset (`migration`)
//! - A single background writer for the live vault (`writer`)
//! - The in-memory vault and its operations (`manager`)

pub mod cipher;
pub mod context;
pub mod format;
pub mod key;
pub mod manager;
pub mod migration;
pub mod record;
pub mod writer;

pub use cipher::{AesGcmCipher, VaultCipher, XorCipher};
pub use context::VaultContext;
pub use format::{classify_payload, CurrentEnvelope, PayloadFormat, StorageEnvelope, StoredPayload};
pub use key::{get_or_create_key, KeyMaterial, KeySource};
pub use manager::VaultManager;
pub use migration::{force_reset, load_vault, save_vault, LoadOutcome, SaveOutcome};
pub use record::CredentialRecord;
pub use writer::{VaultWriter, WriteStatus};
