//! Durable directory listing cache for cairn.
//!
//! This crate provides:
//! - A flat record store abstraction with filesystem and in-memory backends
//! - `DirectoryCache`, the CID-keyed listing cache with retention and quota eviction

pub mod backends;
pub mod directory;
pub mod error;
pub mod traits;

pub use backends::{filesystem::FilesystemRecordStore, memory::MemoryRecordStore};
pub use directory::{CacheRecord, DirectoryCache};
pub use error::{CacheError, CacheResult};
pub use traits::RecordStore;

use cairn_core::config::{CacheBackendConfig, CacheConfig};
use std::sync::Arc;

/// Create a record store from configuration.
pub async fn store_from_config(config: &CacheBackendConfig) -> CacheResult<Arc<dyn RecordStore>> {
    match config {
        CacheBackendConfig::Filesystem { path, quota_bytes } => {
            let backend = FilesystemRecordStore::new(path, *quota_bytes).await?;
            Ok(Arc::new(backend))
        }
        CacheBackendConfig::Memory { quota_bytes } => {
            Ok(Arc::new(MemoryRecordStore::new(*quota_bytes)))
        }
    }
}

/// Create a directory cache from configuration.
pub async fn from_config(config: &CacheConfig) -> CacheResult<DirectoryCache> {
    config.validate().map_err(CacheError::Config)?;
    let store = store_from_config(&config.backend).await?;
    store.health_check().await?;
    Ok(DirectoryCache::new(store, config))
}
