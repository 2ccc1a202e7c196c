//! In-memory record store.

use crate::error::{CacheError, CacheResult};
use crate::traits::{RecordStore, validate_key};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Process-local record store, optionally bounded by a byte quota.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<String, Bytes>>,
    quota_bytes: Option<u64>,
}

impl MemoryRecordStore {
    pub fn new(quota_bytes: Option<u64>) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            quota_bytes,
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        validate_key(key)?;
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, data: Bytes) -> CacheResult<()> {
        validate_key(key)?;
        let mut records = self.records.write().await;

        if let Some(quota) = self.quota_bytes {
            let used: u64 = records
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len() as u64)
                .sum();
            let requested = data.len() as u64;
            if used.saturating_add(requested) > quota {
                return Err(CacheError::QuotaExceeded {
                    requested,
                    used,
                    quota,
                });
            }
        }

        records.insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> CacheResult<Vec<String>> {
        Ok(self
            .records
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
