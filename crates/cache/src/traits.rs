//! Record store trait definitions.

use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use bytes::Bytes;

/// Maximum key length accepted by every backend.
pub const MAX_KEY_LEN: usize = 255;

/// Flat key/value store persisting serialized cache records.
///
/// Keys are single path components; backends reject anything that could be
/// interpreted as a nested or escaping path.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Get a record's bytes, or `None` if absent.
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>>;

    /// Write a record atomically, replacing any previous value.
    ///
    /// Returns [`CacheError::QuotaExceeded`] when the backend has a quota and
    /// the write would exceed it.
    async fn put(&self, key: &str, data: Bytes) -> CacheResult<()>;

    /// Delete a record. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// List keys starting with `prefix`.
    async fn list(&self, prefix: &str) -> CacheResult<Vec<String>>;

    /// Static identifier of the backend, used in logs.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is usable.
    async fn health_check(&self) -> CacheResult<()> {
        Ok(())
    }
}

/// Validate a record key.
pub fn validate_key(key: &str) -> CacheResult<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(CacheError::InvalidKey(format!(
            "key too long: {} bytes (max: {MAX_KEY_LEN})",
            key.len()
        )));
    }
    if key.contains(['/', '\\', '\0']) || key == "." || key.contains("..") {
        return Err(CacheError::InvalidKey(format!(
            "key must be a single path component: {key}"
        )));
    }
    if key.starts_with('.') {
        return Err(CacheError::InvalidKey(format!(
            "key cannot start with '.': {key}"
        )));
    }
    Ok(())
}
