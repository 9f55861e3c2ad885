//! In-memory collaborators for tests and embedders without a platform layer.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Notify, RwLock};

use super::{Biometric, BlobStore, FilePicker, FileWriter, PickedFile, Sharer};
use crate::error::{Result, SafePassError};

/// Map-backed `BlobStore`. Writes can be made to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    unreadable: Mutex<HashSet<String>>,
    writes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without counting it as a write.
    pub async fn insert(&self, key: &str, value: impl Into<Vec<u8>>) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.into());
    }

    pub async fn snapshot(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().await.get(key).cloned()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make reads of one entry fail while the rest of the store works.
    pub fn set_unreadable(&self, key: &str, unreadable: bool) {
        let mut keys = self.unreadable.lock().unwrap_or_else(|e| e.into_inner());
        if unreadable {
            keys.insert(key.to_string());
        } else {
            keys.remove(key);
        }
    }

    fn is_unreadable(&self, key: &str) -> bool {
        self.fail_reads.load(Ordering::SeqCst)
            || self
                .unreadable
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .contains(key)
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.is_unreadable(key) {
            return Err(SafePassError::StorageRead(format!("{} is unavailable", key)));
        }
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SafePassError::StorageWrite("store is read-only".into()));
        }
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SafePassError::StorageWrite("store is read-only".into()));
        }
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// In-memory file system acting as both writer and picker.
#[derive(Debug, Default)]
pub struct MemoryFiles {
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
    next_pick: RwLock<Option<PickedFile>>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, location: &Path) -> Option<Vec<u8>> {
        self.files.read().await.get(location).cloned()
    }

    /// Place a file and make it the next one `pick_one` returns.
    pub async fn offer(&self, name: &str, bytes: impl Into<Vec<u8>>) {
        let location = PathBuf::from(name);
        self.files
            .write()
            .await
            .insert(location.clone(), bytes.into());
        *self.next_pick.write().await = Some(PickedFile {
            name: name.to_string(),
            location,
        });
    }
}

#[async_trait]
impl FileWriter for MemoryFiles {
    async fn write(&self, location: &Path, bytes: &[u8]) -> Result<()> {
        self.files
            .write()
            .await
            .insert(location.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}

#[async_trait]
impl FilePicker for MemoryFiles {
    async fn pick_one(&self) -> Result<Option<PickedFile>> {
        Ok(self.next_pick.write().await.take())
    }

    async fn read(&self, file: &PickedFile) -> Result<Vec<u8>> {
        self.files
            .read()
            .await
            .get(&file.location)
            .cloned()
            .ok_or_else(|| {
                SafePassError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{:?} not found", file.location),
                ))
            })
    }
}

/// `Sharer` that records what it was asked to share.
#[derive(Debug)]
pub struct RecordingSharer {
    available: bool,
    shared: RwLock<Vec<PathBuf>>,
}

impl RecordingSharer {
    pub fn new(available: bool) -> Self {
        Self {
            available,
            shared: RwLock::new(Vec::new()),
        }
    }

    pub async fn shared(&self) -> Vec<PathBuf> {
        self.shared.read().await.clone()
    }
}

#[async_trait]
impl Sharer for RecordingSharer {
    async fn share(&self, location: &Path) -> Result<()> {
        if !self.available {
            return Err(SafePassError::Share(
                "Sharing is not available on this device".into(),
            ));
        }
        self.shared.write().await.push(location.to_path_buf());
        Ok(())
    }
}

/// Biometric sensor with scripted answers.
///
/// With `hold` set, `authenticate` parks until `release` is called, which
/// lets tests observe a prompt that is still in flight.
#[derive(Debug)]
pub struct ScriptedBiometric {
    pub hardware: bool,
    pub enrolled: bool,
    pub accept: bool,
    hold: Option<Arc<Notify>>,
    prompts: AtomicUsize,
}

impl ScriptedBiometric {
    pub fn new(hardware: bool, enrolled: bool, accept: bool) -> Self {
        Self {
            hardware,
            enrolled,
            accept,
            hold: None,
            prompts: AtomicUsize::new(0),
        }
    }

    /// Sensor present, enrolled, and accepting every prompt.
    pub fn accepting() -> Self {
        Self::new(true, true, true)
    }

    pub fn held(mut self) -> Self {
        self.hold = Some(Arc::new(Notify::new()));
        self
    }

    /// Let one held prompt resolve.
    pub fn release(&self) {
        if let Some(hold) = &self.hold {
            hold.notify_one();
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Biometric for ScriptedBiometric {
    async fn has_hardware(&self) -> bool {
        self.hardware
    }

    async fn is_enrolled(&self) -> bool {
        self.enrolled
    }

    async fn authenticate(&self, _prompt: &str) -> bool {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        if let Some(hold) = &self.hold {
            hold.notified().await;
        }
        self.accept
    }
}
