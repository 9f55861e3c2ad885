//! Single writer for the live vault.
//!
//! Every mutation submits a full snapshot of the record sequence. Snapshots
//! go through a depth-1 `watch` channel: if several arrive while a write is
//! running, only the newest is written next. One background task performs
//! all writes, so two saves never interleave.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::context::VaultContext;
use super::migration::save_vault;
use super::record::CredentialRecord;
use crate::error::{Result, SafePassError};

#[derive(Debug, Clone, Default)]
struct Snapshot {
    generation: u64,
    records: Arc<Vec<CredentialRecord>>,
}

/// Outcome of the most recent write performed by the writer task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteStatus {
    /// Generation of the snapshot last written (0 = nothing written yet).
    pub generation: u64,
    pub error: Option<String>,
}

pub struct VaultWriter {
    pending: watch::Sender<Snapshot>,
    persisted: watch::Receiver<WriteStatus>,
    task: JoinHandle<()>,
}

impl VaultWriter {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    pub fn spawn(ctx: Arc<VaultContext>) -> Self {
        let (pending, mut pending_rx) = watch::channel(Snapshot::default());
        let (status_tx, persisted) = watch::channel(WriteStatus::default());

        let task = tokio::spawn(async move {
            // Ends once the sender is dropped and the last snapshot is written
            while pending_rx.changed().await.is_ok() {
                let snapshot = pending_rx.borrow_and_update().clone();
                let error = match save_vault(&ctx, &snapshot.records).await {
                    Ok(_) => None,
                    Err(e) => {
                        warn!("Vault save {} failed: {}", snapshot.generation, e);
                        Some(e.to_string())
                    }
                };
                let _ = status_tx.send(WriteStatus {
                    generation: snapshot.generation,
                    error,
                });
            }
            debug!("Vault writer stopped");
        });

        Self {
            pending,
            persisted,
            task,
        }
    }

    /// Queue a snapshot for writing, replacing any snapshot not yet written.
    pub fn submit(&self, records: Vec<CredentialRecord>) {
        let records = Arc::new(records);
        self.pending.send_modify(|snapshot| {
            snapshot.generation += 1;
            snapshot.records = records;
        });
    }

    /// Wait until the latest submitted snapshot has been written.
    ///
    /// Returns the error of that write, if it failed.
    pub async fn flush(&self) -> Result<()> {
        let target = self.pending.borrow().generation;
        if target == 0 {
            return Ok(());
        }

        let mut persisted = self.persisted.clone();
        let status = persisted
            .wait_for(|status| status.generation >= target)
            .await
            .map_err(|_| SafePassError::StorageWrite("Vault writer stopped".into()))?
            .clone();

        match status.error {
            Some(e) => Err(SafePassError::StorageWrite(e)),
            None => Ok(()),
        }
    }

    pub fn status(&self) -> WriteStatus {
        self.persisted.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
