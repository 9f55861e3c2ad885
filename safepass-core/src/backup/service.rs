//! BackupService - moves backup bytes between the vault and the host's files.
//!
//! The codec functions in this module's parent stay pure; this type adds
//! the collaborators needed to write a file, share it and read one back.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{backup_file_name, export_csv, export_encrypted, import_backup, BackupFormat};
use crate::config::BackupSettings;
use crate::error::{Result, SafePassError};
use crate::platform::{FilePicker, FileWriter, Sharer};
use crate::vault::{CredentialRecord, KeySource, VaultContext};

pub struct BackupService {
    ctx: Arc<VaultContext>,
    writer: Arc<dyn FileWriter>,
    picker: Arc<dyn FilePicker>,
    sharer: Arc<dyn Sharer>,
    settings: BackupSettings,
}

impl BackupService {
    pub fn new(
        ctx: Arc<VaultContext>,
        writer: Arc<dyn FileWriter>,
        picker: Arc<dyn FilePicker>,
        sharer: Arc<dyn Sharer>,
        settings: BackupSettings,
    ) -> Self {
        Self {
            ctx,
            writer,
            picker,
            sharer,
            settings,
        }
    }

    pub fn settings(&self) -> &BackupSettings {
        &self.settings
    }

    /// Write `records` to a dated backup file in the export directory.
    ///
    /// Refuses an empty vault with `EmptyVault`; returns the written path.
    pub async fn export(
        &self,
        records: &[CredentialRecord],
        format: BackupFormat,
    ) -> Result<PathBuf> {
        if records.is_empty() {
            return Err(SafePassError::EmptyVault);
        }

        let now = Utc::now();
        let bytes = match format {
            BackupFormat::Csv => export_csv(records)?,
            BackupFormat::Encrypted => {
                let (key, source) = self.ctx.resolve_key().await;
                if source == KeySource::Unreadable {
                    return Err(SafePassError::StorageRead(
                        "Vault key is unreadable, cannot seal an encrypted backup".into(),
                    ));
                }
                export_encrypted(self.ctx.cipher(), &key, records, now)?
            }
        };

        let location = self
            .settings
            .export_dir()
            .join(backup_file_name(format, now));
        self.writer.write(&location, &bytes).await?;

        info!(
            "Exported {} records as {:?} to {:?}",
            records.len(),
            format,
            location
        );
        Ok(location)
    }

    /// Export, then hand the file to the platform share action.
    ///
    /// The file stays written when sharing fails.
    pub async fn export_and_share(
        &self,
        records: &[CredentialRecord],
        format: BackupFormat,
    ) -> Result<PathBuf> {
        let location = self.export(records, format).await?;
        if let Err(e) = self.sharer.share(&location).await {
            warn!("Backup written to {:?} but could not be shared: {}", location, e);
            return Err(e);
        }
        Ok(location)
    }

    /// Let the user pick a backup file and decode it.
    ///
    /// `Ok(None)` means the picker was dismissed. Decoding is all or nothing;
    /// nothing here touches the live vault.
    pub async fn pick_and_import(&self) -> Result<Option<Vec<CredentialRecord>>> {
        let Some(file) = self.picker.pick_one().await? else {
            debug!("Backup import cancelled");
            return Ok(None);
        };

        let bytes = self.picker.read(&file).await?;
        let key = self.ctx.key().await;
        let records = import_backup(self.ctx.cipher(), &key, Some(file.name.as_str()), &bytes)
            .inspect_err(|e| warn!("Backup {} rejected: {}", file.name, e))?;

        info!("Decoded {} records from {}", records.len(), file.name);
        Ok(Some(records))
    }
}

impl std::fmt::Debug for BackupService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{MemoryBlobStore, MemoryFiles, RecordingSharer};

    struct Harness {
        service: BackupService,
        files: Arc<MemoryFiles>,
        sharer: Arc<RecordingSharer>,
    }

    fn harness(share_available: bool) -> Harness {
        let ctx = Arc::new(VaultContext::with_default_cipher(Arc::new(
            MemoryBlobStore::new(),
        )));
        let files = Arc::new(MemoryFiles::new());
        let sharer = Arc::new(RecordingSharer::new(share_available));
        let settings = BackupSettings {
            export_dir: Some(PathBuf::from("/backups")),
        };
        let service = BackupService::new(
            ctx,
            files.clone(),
            files.clone(),
            sharer.clone(),
            settings,
        );
        Harness {
            service,
            files,
            sharer,
        }
    }

    fn records() -> Vec<CredentialRecord> {
        vec![
            CredentialRecord::new("Mail", "me@example.com", "s3cret!"),
            CredentialRecord::new("Bank, Inc.", "a\"b", "p@ss"),
        ]
    }

    #[tokio::test]
    async fn test_export_empty_vault_refused() {
        let h = harness(true);
        let result = h.service.export(&[], BackupFormat::Encrypted).await;
        assert!(matches!(result, Err(SafePassError::EmptyVault)));
    }

    #[tokio::test]
    async fn test_export_writes_dated_file() {
        let h = harness(true);
        let path = h.service.export(&records(), BackupFormat::Csv).await.unwrap();

        assert!(path.starts_with("/backups"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("SafePass_Backup_"));
        assert!(name.ends_with(".csv"));

        let written = h.files.get(&path).await.unwrap();
        assert!(String::from_utf8(written).unwrap().starts_with("site,email,password"));
    }

    #[tokio::test]
    async fn test_export_and_share() {
        let h = harness(true);
        let path = h
            .service
            .export_and_share(&records(), BackupFormat::Encrypted)
            .await
            .unwrap();
        assert_eq!(h.sharer.shared().await, vec![path]);
    }

    #[tokio::test]
    async fn test_share_failure_keeps_file() {
        let h = harness(false);
        let result = h
            .service
            .export_and_share(&records(), BackupFormat::Csv)
            .await;
        assert!(matches!(result, Err(SafePassError::Share(_))));
        assert!(h.sharer.shared().await.is_empty());
    }

    #[tokio::test]
    async fn test_encrypted_export_reimports() {
        let h = harness(true);
        let path = h
            .service
            .export(&records(), BackupFormat::Encrypted)
            .await
            .unwrap();
        let bytes = h.files.get(&path).await.unwrap();

        h.files.offer("restored.safepass", bytes).await;
        let imported = h.service.pick_and_import().await.unwrap();
        assert_eq!(imported, Some(records()));
    }

    #[tokio::test]
    async fn test_encrypted_export_needs_readable_key() {
        let store = Arc::new(MemoryBlobStore::new());
        store.insert(crate::vault::key::KEY_STORAGE_KEY, "stored-key").await;
        store.set_unreadable(crate::vault::key::KEY_STORAGE_KEY, true);
        let files = Arc::new(MemoryFiles::new());
        let service = BackupService::new(
            Arc::new(VaultContext::with_default_cipher(store)),
            files.clone(),
            files,
            Arc::new(RecordingSharer::new(true)),
            BackupSettings::default(),
        );

        assert!(matches!(
            service.export(&records(), BackupFormat::Encrypted).await,
            Err(SafePassError::StorageRead(_))
        ));
        // CSV needs no key
        assert!(service.export(&records(), BackupFormat::Csv).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_pick() {
        let h = harness(true);
        assert_eq!(h.service.pick_and_import().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bad_backup_surfaces_error() {
        let h = harness(true);
        h.files
            .offer("broken.safepass", r#"{"version":"1.0","count":2}"#)
            .await;
        assert!(matches!(
            h.service.pick_and_import().await,
            Err(SafePassError::Format(_))
        ));
    }
}
