//! Host platform capabilities consumed by the vault core.
//!
//! The core never talks to a sensor, a file dialog or the OS key-value store
//! directly. Hosts hand in implementations of these traits; `fs` and `memory`
//! provide stock ones for headless use and tests.

pub mod fs;
pub mod memory;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::RngCore;

use crate::error::Result;

pub use fs::{FileBlobStore, FsFilePicker, FsFileWriter};
pub use memory::{MemoryBlobStore, MemoryFiles, RecordingSharer, ScriptedBiometric};

/// Source of cryptographic-quality random bytes.
pub trait SecureRandom: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]);

    fn bytes(&self, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        self.fill_bytes(&mut buf);
        buf
    }
}

/// `SecureRandom` backed by the thread-local CSPRNG seeded from the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRandom;

impl SecureRandom for SystemRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::rng().fill_bytes(dest);
    }
}

/// Biometric sensor access (fingerprint, face unlock).
#[async_trait]
pub trait Biometric: Send + Sync {
    async fn has_hardware(&self) -> bool;
    async fn is_enrolled(&self) -> bool;
    /// Shows the system prompt; resolves `true` only on a successful match.
    async fn authenticate(&self, prompt: &str) -> bool;
}

/// Opaque key-value blob store the vault is persisted into.
///
/// `set` is expected to replace the value atomically: a failed write must
/// leave the previous bytes readable.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// A file chosen by the user for import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedFile {
    pub name: String,
    pub location: PathBuf,
}

#[async_trait]
pub trait FilePicker: Send + Sync {
    /// Returns `None` when the user dismisses the picker.
    async fn pick_one(&self) -> Result<Option<PickedFile>>;
    async fn read(&self, file: &PickedFile) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait FileWriter: Send + Sync {
    async fn write(&self, location: &Path, bytes: &[u8]) -> Result<()>;
}

#[async_trait]
pub trait Sharer: Send + Sync {
    async fn share(&self, location: &Path) -> Result<()>;
}
