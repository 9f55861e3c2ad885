//! Filesystem-backed collaborators for desktop and headless hosts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{BlobStore, FilePicker, FileWriter, PickedFile};
use crate::error::{Result, SafePassError};

const TEMP_SUFFIX: &str = ".tmp";

/// `BlobStore` keeping one file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    data_dir: PathBuf,
}

impl FileBlobStore {
    /// Create the store, creating `data_dir` if needed.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key.contains(['/', '\\'])
            || key.starts_with('.')
            || key.ends_with(TEMP_SUFFIX)
        {
            return Err(SafePassError::StorageWrite(format!(
                "Invalid storage key: {:?}",
                key
            )));
        }
        Ok(self.data_dir.join(key))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self
            .path_for(key)
            .map_err(|e| SafePassError::StorageRead(e.to_string()))?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SafePassError::StorageRead(format!(
                "Failed to read {:?}: {}",
                path, e
            ))),
        }
    }

    /// Write atomically (write to temp file, then rename).
    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        // Whole key plus suffix, so `a.b` and `a.c` never share a temp file
        let temp_path = self.data_dir.join(format!("{}{}", key, TEMP_SUFFIX));

        let write = async {
            tokio::fs::write(&temp_path, value).await?;
            tokio::fs::rename(&temp_path, &path).await?;

            // Set restrictive permissions on Unix
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mut perms = tokio::fs::metadata(&path).await?.permissions();
                perms.set_mode(0o600);
                tokio::fs::set_permissions(&path, perms).await?;
            }

            Ok::<(), std::io::Error>(())
        };

        write.await.map_err(|e| {
            SafePassError::StorageWrite(format!("Failed to write {:?}: {}", path, e))
        })?;

        debug!("Wrote {} bytes to {:?}", value.len(), path);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SafePassError::StorageWrite(format!(
                "Failed to remove {:?}: {}",
                path, e
            ))),
        }
    }
}

/// Writes backup files straight to the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsFileWriter;

#[async_trait]
impl FileWriter for FsFileWriter {
    async fn write(&self, location: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = location.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(location, bytes).await?;
        Ok(())
    }
}

/// Non-interactive picker that always "picks" a path given up front,
/// e.g. from a command-line argument.
#[derive(Debug, Clone)]
pub struct FsFilePicker {
    path: Option<PathBuf>,
}

impl FsFilePicker {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl FilePicker for FsFilePicker {
    async fn pick_one(&self) -> Result<Option<PickedFile>> {
        Ok(self.path.as_ref().map(|path| PickedFile {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            location: path.clone(),
        }))
    }

    async fn read(&self, file: &PickedFile) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&file.location).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_blob_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();

        assert_eq!(store.get("passwords").await.unwrap(), None);

        store.set("passwords", b"[]").await.unwrap();
        assert_eq!(store.get("passwords").await.unwrap(), Some(b"[]".to_vec()));

        store.set("passwords", b"{}").await.unwrap();
        assert_eq!(store.get("passwords").await.unwrap(), Some(b"{}".to_vec()));
        assert!(!dir.path().join("passwords.tmp").exists());

        store.remove("passwords").await.unwrap();
        assert_eq!(store.get("passwords").await.unwrap(), None);
        // Removing a missing key is a no-op
        store.remove("passwords").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_blob_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();

        assert!(matches!(
            store.set("../escape", b"x").await,
            Err(SafePassError::StorageWrite(_))
        ));
        assert!(matches!(
            store.get("a/b").await,
            Err(SafePassError::StorageRead(_))
        ));
    }

    #[tokio::test]
    async fn test_dotted_keys_do_not_share_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();

        for _ in 0..20 {
            let (first, second) = tokio::join!(
                store.set("vault.main", b"main"),
                store.set("vault.backup", b"backup")
            );
            first.unwrap();
            second.unwrap();
        }

        assert_eq!(
            store.get("vault.main").await.unwrap(),
            Some(b"main".to_vec())
        );
        assert_eq!(
            store.get("vault.backup").await.unwrap(),
            Some(b"backup".to_vec())
        );
        assert!(!dir.path().join("vault.tmp").exists());
        assert!(!dir.path().join("vault.main.tmp").exists());

        // Keys that would alias a temp file are refused
        assert!(store.set("vault.main.tmp", b"x").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_blob_store_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();
        store.set("encryption_key", b"k").await.unwrap();

        let mode = std::fs::metadata(dir.path().join("encryption_key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_fs_picker_reads_given_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.csv");
        FsFileWriter.write(&path, b"site,email,password\n").await.unwrap();

        let picker = FsFilePicker::new(Some(path.clone()));
        let picked = picker.pick_one().await.unwrap().unwrap();
        assert_eq!(picked.name, "backup.csv");
        assert_eq!(picker.read(&picked).await.unwrap(), b"site,email,password\n");

        assert!(FsFilePicker::new(None).pick_one().await.unwrap().is_none());
    }
}
