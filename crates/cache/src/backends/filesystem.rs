//! Local filesystem record store.

use crate::error::{CacheError, CacheResult};
use crate::traits::{RecordStore, validate_key};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Marker embedded in temporary file names; such files are never listed.
const TEMP_MARKER: &str = ".tmp.";

/// One file per record in a single directory.
pub struct FilesystemRecordStore {
    root: PathBuf,
    quota_bytes: Option<u64>,
}

impl FilesystemRecordStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl AsRef<Path>, quota_bytes: Option<u64>) -> CacheResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root, quota_bytes })
    }

    fn key_path(&self, key: &str) -> CacheResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    /// Bytes used by all records except `skip_key`.
    async fn usage_excluding(&self, skip_key: &str) -> CacheResult<u64> {
        let mut used = 0u64;
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name == skip_key || name.contains(TEMP_MARKER) {
                continue;
            }
            let file_type = entry.file_type().await?;
            if file_type.is_file() {
                used += entry.metadata().await?.len();
            }
        }
        Ok(used)
    }
}

#[async_trait]
impl RecordStore for FilesystemRecordStore {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        let path = self.key_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> CacheResult<()> {
        let path = self.key_path(key)?;

        if let Some(quota) = self.quota_bytes {
            let used = self.usage_excluding(key).await?;
            let requested = data.len() as u64;
            if used.saturating_add(requested) > quota {
                return Err(CacheError::QuotaExceeded {
                    requested,
                    used,
                    quota,
                });
            }
        }

        // Write to a uniquely named temp file, fsync, then rename
        let temp_path = self.root.join(format!("{key}{TEMP_MARKER}{}", Uuid::new_v4()));
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(CacheError::Io(e));
        }

        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, key: &str) -> CacheResult<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list(&self, prefix: &str) -> CacheResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            // Symlinks and subdirectories are never records
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(prefix) && !name.contains(TEMP_MARKER) {
                keys.push(name);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> CacheResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            CacheError::Io(std::io::Error::new(
                e.kind(),
                format!("cache root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(CacheError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("cache root is not a directory: {:?}", self.root),
            )));
        }

        Ok(())
    }
}
