//! VaultManager - the live, in-memory vault and its operations.
//!
//! Records are kept newest first. Every mutation updates memory, moves the
//! reveal state along with the records, and hands a snapshot to the single
//! writer task. Nothing here blocks on storage except `flush`, `reload`
//! and `clear_all`.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::context::VaultContext;
use super::migration::{force_reset, load_vault, LoadOutcome};
use super::record::CredentialRecord;
use super::writer::VaultWriter;
use crate::backup::{BackupFormat, BackupService};
use crate::config::{load_settings, save_settings, VaultSettings};
use crate::error::{Result, SafePassError};
use crate::generator;
use crate::platform::{Biometric, SecureRandom, SystemRandom};
use crate::reveal::{RevealGate, RevealOutcome, RevealState};

pub struct VaultManager {
    ctx: Arc<VaultContext>,
    records: Vec<CredentialRecord>,
    reveal: RevealGate,
    writer: VaultWriter,
    settings: VaultSettings,
    rng: Arc<dyn SecureRandom>,
}

impl VaultManager {
    /// Load the vault and start its writer. Must be called inside a tokio
    /// runtime.
    ///
    /// Never fails: unreadable vaults open empty and unreadable settings
    /// fall back to defaults.
    pub async fn open(ctx: Arc<VaultContext>, biometric: Arc<dyn Biometric>) -> Self {
        let loaded = load_vault(&ctx).await;
        info!(
            "Vault opened with {} records ({:?}{})",
            loaded.records.len(),
            loaded.format,
            if loaded.migrated { ", migrated" } else { "" }
        );

        let settings = match load_settings(ctx.store()).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring unreadable settings, using defaults: {}", e);
                VaultSettings::default()
            }
        };

        let reveal = RevealGate::new(biometric);
        reveal.reset();

        Self {
            writer: VaultWriter::spawn(ctx.clone()),
            ctx,
            records: loaded.records,
            reveal,
            settings,
            rng: Arc::new(SystemRandom),
        }
    }

    /// Replace the random source used for generated secrets.
    pub fn with_random(mut self, rng: Arc<dyn SecureRandom>) -> Self {
        self.rng = rng;
        self
    }

    pub fn context(&self) -> &Arc<VaultContext> {
        &self.ctx
    }

    /// Load the vault from storage again, after pending writes land.
    ///
    /// Reveal state is reset as for any load.
    pub async fn reload(&mut self) -> LoadOutcome {
        if let Err(e) = self.writer.flush().await {
            warn!("Reloading after a failed save: {}", e);
        }
        let loaded = load_vault(&self.ctx).await;
        self.records = loaded.records.clone();
        self.reveal.reset();
        loaded
    }

    pub fn records(&self) -> &[CredentialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CredentialRecord> {
        self.records.get(index)
    }

    /// Add a record at the front of the vault.
    pub fn add(&mut self, record: CredentialRecord) -> Result<()> {
        record.validate()?;
        debug!("Adding record for {}", record.service);
        self.prepend(vec![record]);
        Ok(())
    }

    /// Add a record whose secret is generated from the configured settings.
    pub fn generate_and_add(
        &mut self,
        service: impl Into<String>,
        login: impl Into<String>,
    ) -> Result<CredentialRecord> {
        let record = CredentialRecord::new(service, login, self.generate_password());
        self.add(record.clone())?;
        Ok(record)
    }

    pub fn generate_password(&self) -> String {
        let options = &self.settings.generator;
        generator::generate(options.length, &options.classes, self.rng.as_ref())
    }

    pub fn generate_passphrase(&self) -> String {
        generator::generate_passphrase(self.settings.generator.passphrase_words, self.rng.as_ref())
    }

    /// Delete the record at `index` and its reveal state.
    pub fn delete(&mut self, index: usize) -> Result<CredentialRecord> {
        if index >= self.records.len() {
            return Err(SafePassError::RecordNotFound(index));
        }
        let removed = self.records.remove(index);
        self.reveal.remove(index);
        self.writer.submit(self.records.clone());
        debug!("Deleted record {}", index);
        Ok(removed)
    }

    /// Prepend a fully decoded import in file order, in one step.
    ///
    /// An empty or partly invalid import is rejected and leaves the vault
    /// as it was.
    pub fn merge_imported(&mut self, imported: Vec<CredentialRecord>) -> Result<usize> {
        if imported.is_empty() {
            return Err(SafePassError::ImportParse(
                "Backup contains no records".into(),
            ));
        }
        for (row, record) in imported.iter().enumerate() {
            record
                .validate()
                .map_err(|e| SafePassError::ImportParse(format!("Record {}: {}", row + 1, e)))?;
        }

        let count = imported.len();
        self.prepend(imported);
        info!("Imported {} records", count);
        Ok(count)
    }

    fn prepend(&mut self, mut front: Vec<CredentialRecord>) {
        let count = front.len();
        front.append(&mut self.records);
        self.records = front;
        self.reveal.shift_for_prepend(count);
        self.writer.submit(self.records.clone());
    }

    /// Let the user pick a backup and merge it. `Ok(None)` when cancelled.
    pub async fn import_backup(&mut self, backups: &BackupService) -> Result<Option<usize>> {
        match backups.pick_and_import().await? {
            Some(records) => self.merge_imported(records).map(Some),
            None => Ok(None),
        }
    }

    /// Write the current records to a backup file, optionally sharing it.
    pub async fn export_backup(
        &self,
        backups: &BackupService,
        format: BackupFormat,
        share: bool,
    ) -> Result<PathBuf> {
        if share {
            backups.export_and_share(&self.records, format).await
        } else {
            backups.export(&self.records, format).await
        }
    }

    pub fn reveal_gate(&self) -> RevealGate {
        self.reveal.clone()
    }

    pub fn reveal_state(&self, index: usize) -> RevealState {
        self.reveal.state(index)
    }

    /// Authenticate and reveal the record at `index`.
    ///
    /// Holding the manager across the prompt blocks other operations; use
    /// `reveal_gate` to prompt without it.
    pub async fn reveal(&self, index: usize) -> Result<RevealOutcome> {
        if index >= self.records.len() {
            return Err(SafePassError::RecordNotFound(index));
        }
        self.reveal.reveal(index).await
    }

    pub fn conceal(&self, index: usize) {
        self.reveal.conceal(index);
    }

    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    pub async fn update_settings(&mut self, settings: VaultSettings) -> Result<()> {
        save_settings(self.ctx.store(), &settings).await?;
        self.settings = settings;
        Ok(())
    }

    /// Wait for pending writes and report the outcome of the last one.
    pub async fn flush(&self) -> Result<()> {
        self.writer.flush().await
    }

    /// Delete every record and the vault key, in memory and in storage.
    pub async fn clear_all(&mut self) -> Result<()> {
        if let Err(e) = self.writer.flush().await {
            warn!("Pending save failed before clearing the vault: {}", e);
        }
        force_reset(&self.ctx).await?;
        self.records.clear();
        self.reveal.reset();
        info!("Vault cleared");
        Ok(())
    }
}

impl std::fmt::Debug for VaultManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultManager")
            .field("records", &self.records.len())
            .field("reveal", &self.reveal)
            .finish_non_exhaustive()
    }
}
