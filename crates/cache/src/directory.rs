//! CID-keyed cache of directory listings.
//!
//! Listings are keyed by the root CID. Because CIDs are derived from content a
//! record never goes out of date; it is only dropped once it is older than the
//! retention window, on explicit clear, or under quota pressure. The only
//! in-place change is appending entries found by background traversal.

use crate::error::{CacheError, CacheResult};
use crate::traits::RecordStore;
use bytes::Bytes;
use cairn_core::config::CacheConfig;
use cairn_core::{Cid, DirectoryEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// A persisted listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Entries with sizes encoded as strings.
    pub files: Vec<DirectoryEntry>,
    /// Write time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub cid: Cid,
}

impl CacheRecord {
    pub fn new(cid: Cid, files: Vec<DirectoryEntry>) -> Self {
        Self {
            files,
            timestamp: now_millis(),
            cid,
        }
    }

    /// Age of the record relative to `now_ms`.
    pub fn age(&self, now_ms: i64) -> Duration {
        Duration::milliseconds(now_ms.saturating_sub(self.timestamp))
    }
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}

/// Durable listing cache over a [`RecordStore`].
#[derive(Clone)]
pub struct DirectoryCache {
    store: Arc<dyn RecordStore>,
    key_prefix: String,
    retention: Duration,
    quota_eviction_window: Duration,
}

impl DirectoryCache {
    /// Create a cache from configuration and an already constructed store.
    pub fn new(store: Arc<dyn RecordStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            key_prefix: config.key_prefix.clone(),
            retention: config.retention(),
            quota_eviction_window: config.quota_eviction_window(),
        }
    }

    /// Record key for a CID.
    pub fn key_for(&self, cid: &Cid) -> String {
        format!("{}{}", self.key_prefix, cid)
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Get the cached listing for `cid` if present and fresh.
    ///
    /// Stale records are deleted and reported as absent.
    pub async fn get(&self, cid: &Cid) -> CacheResult<Option<Vec<DirectoryEntry>>> {
        let key = self.key_for(cid);
        let Some(record) = self.read_record(&key).await? else {
            return Ok(None);
        };

        if record.age(now_millis()) >= self.retention {
            tracing::debug!(cid = %cid, "Evicting stale listing");
            self.store.delete(&key).await?;
            return Ok(None);
        }

        Ok(Some(record.files))
    }

    /// Store the full listing for `cid`, replacing any previous record.
    pub async fn put(&self, cid: &Cid, entries: &[DirectoryEntry]) -> CacheResult<()> {
        let record = CacheRecord::new(cid.clone(), entries.to_vec());
        self.write_record(&record).await?;
        tracing::debug!(cid = %cid, entries = entries.len(), "Cached listing");
        Ok(())
    }

    /// Merge background discoveries into the record for `cid`.
    ///
    /// Entries whose name is already present are skipped. The original
    /// timestamp is kept. Returns `false` without writing when no record
    /// exists or nothing new was added.
    pub async fn append_discovered(
        &self,
        cid: &Cid,
        new_entries: &[DirectoryEntry],
    ) -> CacheResult<bool> {
        let key = self.key_for(cid);
        let Some(mut record) = self.read_record(&key).await? else {
            return Ok(false);
        };

        let mut known: HashSet<String> = record.files.iter().map(|e| e.name.clone()).collect();
        let before = record.files.len();
        for entry in new_entries {
            if known.insert(entry.name.clone()) {
                record.files.push(entry.clone());
            }
        }

        let added = record.files.len() - before;
        if added == 0 {
            return Ok(false);
        }

        self.write_record(&record).await?;
        tracing::debug!(cid = %cid, added, total = record.files.len(), "Appended discovered entries");
        Ok(true)
    }

    /// Remove every record under this cache's prefix.
    pub async fn clear_all(&self) -> CacheResult<usize> {
        let keys = self.store.list(&self.key_prefix).await?;
        for key in &keys {
            self.store.delete(key).await?;
        }
        tracing::info!(removed = keys.len(), "Cleared directory cache");
        Ok(keys.len())
    }

    /// Remove records older than `window`. Unreadable records are removed too.
    pub async fn evict_older_than(&self, window: Duration) -> CacheResult<usize> {
        let now = now_millis();
        let mut removed = 0;
        for key in self.store.list(&self.key_prefix).await? {
            let stale = match self.store.get(&key).await? {
                Some(data) => match serde_json::from_slice::<CacheRecord>(&data) {
                    Ok(record) => record.age(now) >= window,
                    Err(_) => true,
                },
                None => false,
            };
            if stale {
                self.store.delete(&key).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(removed, window_days = window.whole_days(), "Evicted old listings");
        }
        Ok(removed)
    }

    async fn read_record(&self, key: &str) -> CacheResult<Option<CacheRecord>> {
        let Some(data) = self.store.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice::<CacheRecord>(&data) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Dropping unreadable cache record");
                self.store.delete(key).await?;
                Ok(None)
            }
        }
    }

    /// Persist a record, evicting old records and retrying once on quota errors.
    async fn write_record(&self, record: &CacheRecord) -> CacheResult<()> {
        let key = self.key_for(&record.cid);
        let data = Bytes::from(serde_json::to_vec(record)?);

        match self.store.put(&key, data.clone()).await {
            Err(CacheError::QuotaExceeded { .. }) => {
                tracing::warn!(
                    cid = %record.cid,
                    backend = self.store.backend_name(),
                    "Cache quota exceeded, evicting old listings"
                );
                self.evict_older_than(self.quota_eviction_window).await?;
                self.store.put(&key, data).await
            }
            other => other,
        }
    }
}
