use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::generator::CharacterClasses;
use crate::platform::BlobStore;

/// Blob store entry holding the settings JSON.
pub const SETTINGS_STORAGE_KEY: &str = "settings";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub length: usize,
    pub classes: CharacterClasses,
    pub passphrase_words: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            length: 16,
            classes: CharacterClasses::default(),
            passphrase_words: 4,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Directory backup files are written to; the working directory if unset.
    pub export_dir: Option<PathBuf>,
}

impl BackupSettings {
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    pub generator: GeneratorSettings,
    pub backup: BackupSettings,
}

pub async fn load_settings(store: &dyn BlobStore) -> Result<VaultSettings> {
    match store.get(SETTINGS_STORAGE_KEY).await? {
        Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
        None => Ok(VaultSettings::default()),
    }
}

pub async fn save_settings(store: &dyn BlobStore, settings: &VaultSettings) -> Result<()> {
    let content = serde_json::to_vec_pretty(settings)?;
    store.set(SETTINGS_STORAGE_KEY, &content).await
}
