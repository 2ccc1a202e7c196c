// Behavioural tests for the CID-keyed directory cache over both backends.

mod common;

use bytes::Bytes;
use cairn_cache::{
    CacheRecord, DirectoryCache, FilesystemRecordStore, MemoryRecordStore, RecordStore,
};
use cairn_core::config::CacheConfig;
use common::{directory, file, old_record, test_cid};
use std::sync::Arc;
use tempfile::TempDir;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

fn memory_cache() -> (Arc<dyn RecordStore>, DirectoryCache) {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new(None));
    let cache = DirectoryCache::new(store.clone(), &CacheConfig::default());
    (store, cache)
}

async fn filesystem_cache(quota: Option<u64>) -> (TempDir, Arc<dyn RecordStore>, DirectoryCache) {
    let temp = tempfile::tempdir().unwrap();
    let store: Arc<dyn RecordStore> =
        Arc::new(FilesystemRecordStore::new(temp.path(), quota).await.unwrap());
    let cache = DirectoryCache::new(store.clone(), &CacheConfig::default());
    (temp, store, cache)
}

async fn write_raw(store: &Arc<dyn RecordStore>, cache: &DirectoryCache, record: &CacheRecord) {
    store
        .put(
            &cache.key_for(&record.cid),
            Bytes::from(serde_json::to_vec(record).unwrap()),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_put_then_get_roundtrips_entries() {
    let (_temp, _store, cache) = filesystem_cache(None).await;
    let root = test_cid(1);
    let entries = vec![
        file("cover.jpg", 2, 1024),
        directory("scans", 3),
        file("huge.bin", 4, u64::MAX),
    ];

    cache.put(&root, &entries).await.unwrap();
    let cached = cache.get(&root).await.unwrap().expect("record should exist");
    assert_eq!(cached, entries);
}

#[tokio::test]
async fn test_sizes_persist_as_strings() {
    let (store, cache) = memory_cache();
    let root = test_cid(1);
    cache.put(&root, &[file("a.txt", 2, 42)]).await.unwrap();

    let raw = store.get(&cache.key_for(&root)).await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(value["files"][0]["size"], serde_json::json!("42"));
    assert_eq!(value["cid"], serde_json::json!(root.as_str()));
    assert!(value["timestamp"].is_i64());
}

#[tokio::test]
async fn test_missing_record_is_absent() {
    let (_store, cache) = memory_cache();
    assert!(cache.get(&test_cid(99)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stale_record_is_evicted_on_get() {
    let (store, cache) = memory_cache();
    let root = test_cid(1);
    let record = old_record(root.clone(), vec![file("a", 2, 1)], 31 * DAY_MS);
    write_raw(&store, &cache, &record).await;

    assert!(cache.get(&root).await.unwrap().is_none());
    assert!(
        store.get(&cache.key_for(&root)).await.unwrap().is_none(),
        "stale record should be deleted"
    );
}

#[tokio::test]
async fn test_record_inside_retention_is_returned() {
    let (store, cache) = memory_cache();
    let root = test_cid(1);
    let record = old_record(root.clone(), vec![file("a", 2, 1)], 29 * DAY_MS);
    write_raw(&store, &cache, &record).await;

    assert_eq!(cache.get(&root).await.unwrap().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unreadable_record_is_dropped() {
    let (store, cache) = memory_cache();
    let root = test_cid(1);
    store
        .put(&cache.key_for(&root), Bytes::from_static(b"{not json"))
        .await
        .unwrap();

    assert!(cache.get(&root).await.unwrap().is_none());
    assert!(store.get(&cache.key_for(&root)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_append_discovered_merges_and_keeps_timestamp() {
    let (store, cache) = memory_cache();
    let root = test_cid(1);
    let record = old_record(root.clone(), vec![directory("scans", 2)], DAY_MS);
    let original_timestamp = record.timestamp;
    write_raw(&store, &cache, &record).await;

    let discovered = vec![file("scans/p1.jpg", 3, 10), file("scans/p1.xml", 4, 2)];
    assert!(cache.append_discovered(&root, &discovered).await.unwrap());
    // Re-appending the same entries adds nothing
    assert!(!cache.append_discovered(&root, &discovered).await.unwrap());

    let raw = store.get(&cache.key_for(&root)).await.unwrap().unwrap();
    let stored: CacheRecord = serde_json::from_slice(&raw).unwrap();
    assert_eq!(stored.timestamp, original_timestamp);
    let names: Vec<_> = stored.files.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["scans", "scans/p1.jpg", "scans/p1.xml"]);
}

#[tokio::test]
async fn test_append_without_record_is_noop() {
    let (store, cache) = memory_cache();
    let root = test_cid(1);
    assert!(
        !cache
            .append_discovered(&root, &[file("x", 2, 1)])
            .await
            .unwrap()
    );
    assert!(store.get(&cache.key_for(&root)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_clear_all_only_touches_prefix() {
    let (store, cache) = memory_cache();
    cache.put(&test_cid(1), &[]).await.unwrap();
    cache.put(&test_cid(2), &[]).await.unwrap();
    store
        .put("unrelated-key", Bytes::from_static(b"keep"))
        .await
        .unwrap();

    assert_eq!(cache.clear_all().await.unwrap(), 2);
    assert!(cache.get(&test_cid(1)).await.unwrap().is_none());
    assert!(store.get("unrelated-key").await.unwrap().is_some());
}

#[tokio::test]
async fn test_evict_older_than_keeps_recent_records() {
    let (store, cache) = memory_cache();
    write_raw(&store, &cache, &old_record(test_cid(1), vec![], 10 * DAY_MS)).await;
    write_raw(&store, &cache, &old_record(test_cid(2), vec![], DAY_MS)).await;
    cache.put(&test_cid(3), &[]).await.unwrap();

    let removed = cache
        .evict_older_than(time::Duration::days(7))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(cache.get(&test_cid(1)).await.unwrap().is_none());
    assert!(cache.get(&test_cid(2)).await.unwrap().is_some());
    assert!(cache.get(&test_cid(3)).await.unwrap().is_some());
}

#[tokio::test]
async fn test_quota_pressure_evicts_old_records_and_retries() {
    let (temp, store, cache) = filesystem_cache(None).await;
    let old = old_record(test_cid(1), vec![file("a", 2, 1)], 10 * DAY_MS);
    write_raw(&store, &cache, &old).await;
    let old_len = store
        .get(&cache.key_for(&old.cid))
        .await
        .unwrap()
        .unwrap()
        .len() as u64;

    // Rebuild the cache over a quota that only fits one record
    let bounded: Arc<dyn RecordStore> = Arc::new(
        FilesystemRecordStore::new(temp.path(), Some(old_len + 64))
            .await
            .unwrap(),
    );
    let bounded_cache = DirectoryCache::new(bounded.clone(), &CacheConfig::default());

    bounded_cache
        .put(&test_cid(3), &[file("b", 4, 1)])
        .await
        .unwrap();
    assert!(bounded.get(&bounded_cache.key_for(&old.cid)).await.unwrap().is_none());
    assert!(bounded_cache.get(&test_cid(3)).await.unwrap().is_some());
}

#[tokio::test]
async fn test_quota_failure_surfaces_when_nothing_is_old() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new(Some(16)));
    let cache = DirectoryCache::new(store, &CacheConfig::default());

    let err = cache
        .put(&test_cid(1), &[file("a", 2, 1)])
        .await
        .unwrap_err();
    assert!(err.is_quota_exceeded(), "unexpected error: {err:?}");
}
