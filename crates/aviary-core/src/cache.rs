//! Processed-item cache: tracks which feed/command items a multijson or RSS
//! provider has already posted, persisted to a JSON file next to the
//! provider's configured cache directory.
//!
//! Legacy shapes from earlier cache file formats are migrated on load with a
//! `.pre-migration-backup` copy of the original kept alongside.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Sanity ceiling on how many processed IDs a single cache file may carry
/// after migration. A file beyond this is treated as corrupt rather than
/// loaded: the cache starts empty and the decision is logged at `warn`.
const MAX_MIGRATED_ENTRIES: usize = 100_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    id: String,
    first_seen_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheFile {
    entries: Vec<StoredEntry>,
}

/// An on-disk, size- and age-bounded set of processed item IDs for one
/// provider.
pub struct ProcessedItemCache {
    path: PathBuf,
    max_size: usize,
    ttl: Option<Duration>,
    order: VecDeque<StoredEntry>,
    last_modified: Option<SystemTime>,
    last_len: Option<u64>,
}

impl ProcessedItemCache {
    /// Load (and migrate, if needed) the cache file at `cache_dir/provider_name.json`.
    pub async fn load(cache_dir: &Path, provider_name: &str, max_size: usize, ttl_secs: Option<u64>) -> Result<Self> {
        tokio::fs::create_dir_all(cache_dir).await?;
        let path = cache_dir.join(format!("{provider_name}.json"));
        let ttl = ttl_secs.map(Duration::from_secs);

        let mut cache = Self {
            path: path.clone(),
            max_size,
            ttl,
            order: VecDeque::new(),
            last_modified: None,
            last_len: None,
        };

        if !path.exists() {
            return Ok(cache);
        }

        let raw = tokio::fs::read_to_string(&path).await?;
        let entries = parse_and_migrate(&raw, &path).await?;
        cache.order = entries.into_iter().collect();
        cache.evict_expired();
        cache.record_fingerprint().await?;
        Ok(cache)
    }

    async fn record_fingerprint(&mut self) -> Result<()> {
        if let Ok(meta) = tokio::fs::metadata(&self.path).await {
            self.last_modified = meta.modified().ok();
            self.last_len = Some(meta.len());
        }
        Ok(())
    }

    /// Detect whether the cache file changed on disk since it was last
    /// loaded or saved by this process (another process writing to the
    /// same file concurrently).
    pub async fn externally_modified(&self) -> bool {
        let Ok(meta) = tokio::fs::metadata(&self.path).await else {
            return false;
        };
        let modified = meta.modified().ok();
        let len = meta.len();
        modified != self.last_modified || Some(len) != self.last_len
    }

    pub fn contains(&self, id: &str) -> bool {
        self.order.iter().any(|e| e.id == id)
    }

    /// Mark `id` processed. Evicts the oldest entry first if the cache is
    /// already at capacity (FIFO eviction).
    pub fn insert(&mut self, id: impl Into<String>, now_unix_secs: u64) {
        let id = id.into();
        if self.order.iter().any(|e| e.id == id) {
            return;
        }
        if self.order.len() >= self.max_size {
            self.order.pop_front();
        }
        self.order.push_back(StoredEntry {
            id,
            first_seen_at: now_unix_secs,
        });
    }

    fn evict_expired(&mut self) {
        let Some(ttl) = self.ttl else { return };
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.order.retain(|e| now.saturating_sub(e.first_seen_at) < ttl.as_secs());
    }

    /// Persist via write-to-temp-then-rename so a crash mid-write can never
    /// leave a truncated cache file behind.
    pub async fn save(&mut self) -> Result<()> {
        self.evict_expired();
        let file = CacheFile {
            entries: self.order.iter().cloned().collect(),
        };
        let json = serde_json::to_vec_pretty(&file)?;

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        self.record_fingerprint().await?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Parse a cache file, migrating any of the four legacy shapes this format
/// has had historically:
///
/// 1. `{"processedItems": ["id1", "id2"]}`
/// 2. `{"items": ["id1", "id2"]}`
/// 3. `{"id1": true, "id2": true}` (a map used as a set)
/// 4. `[{"id": "id1"}, {"id": "id2"}]` (a bare array of objects)
///
/// Any shape other than the current `{"entries": [...]}` format triggers a
/// `.pre-migration-backup` copy of the original file before the migrated
/// form is returned. A migrated entry count beyond `MAX_MIGRATED_ENTRIES` is
/// treated as corrupt: the file is discarded and an empty set returned.
async fn parse_and_migrate(raw: &str, path: &Path) -> Result<Vec<StoredEntry>> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| Error::Cache(format!("invalid cache JSON: {e}")))?;
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let (ids, is_legacy): (Vec<String>, bool) = match &value {
        serde_json::Value::Object(map) if map.contains_key("entries") => {
            let entries: Vec<StoredEntry> = serde_json::from_value(value.get("entries").cloned().unwrap_or_default())
                .map_err(|e| Error::Cache(format!("invalid current-format cache: {e}")))?;
            return cap_entries(entries, path, raw).await;
        }
        serde_json::Value::Object(map) if map.contains_key("processedItems") => (
            map.get("processedItems")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
            true,
        ),
        serde_json::Value::Object(map) if map.contains_key("items") => (
            map.get("items")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
            true,
        ),
        serde_json::Value::Object(map) => (map.keys().cloned().collect(), true),
        serde_json::Value::Array(items) => (
            items
                .iter()
                .filter_map(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_string))
                .collect(),
            true,
        ),
        _ => return Err(Error::Cache("unrecognized cache file shape".to_string())),
    };

    if is_legacy {
        let backup_path = path.with_extension("json.pre-migration-backup");
        tokio::fs::write(&backup_path, raw).await?;
        tracing::info!(path = %path.display(), backup = %backup_path.display(), "migrated legacy processed-item cache format");
    }

    let entries = ids
        .into_iter()
        .map(|id| StoredEntry { id, first_seen_at: now })
        .collect();
    cap_entries(entries, path, raw).await
}

async fn cap_entries(entries: Vec<StoredEntry>, path: &Path, _raw: &str) -> Result<Vec<StoredEntry>> {
    if entries.len() > MAX_MIGRATED_ENTRIES {
        tracing::warn!(
            path = %path.display(),
            count = entries.len(),
            limit = MAX_MIGRATED_ENTRIES,
            "processed-item cache exceeds sanity ceiling after migration, discarding and starting empty"
        );
        return Ok(Vec::new());
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn loads_empty_when_file_absent() {
        let dir = TempDir::new().unwrap();
        let cache = ProcessedItemCache::load(dir.path(), "feed1", 100, None).await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn round_trips_insert_and_save() {
        let dir = TempDir::new().unwrap();
        let mut cache = ProcessedItemCache::load(dir.path(), "feed1", 100, None).await.unwrap();
        cache.insert("item-1", 1000);
        cache.save().await.unwrap();

        let reloaded = ProcessedItemCache::load(dir.path(), "feed1", 100, None).await.unwrap();
        assert!(reloaded.contains("item-1"));
    }

    #[tokio::test]
    async fn fifo_evicts_oldest_at_capacity() {
        let dir = TempDir::new().unwrap();
        let mut cache = ProcessedItemCache::load(dir.path(), "feed1", 2, None).await.unwrap();
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[tokio::test]
    async fn migrates_processed_items_legacy_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feed1.json");
        tokio::fs::write(&path, r#"{"processedItems": ["x", "y"]}"#).await.unwrap();

        let cache = ProcessedItemCache::load(dir.path(), "feed1", 100, None).await.unwrap();
        assert!(cache.contains("x"));
        assert!(cache.contains("y"));
        assert!(dir.path().join("feed1.json.pre-migration-backup").exists());
    }

    #[tokio::test]
    async fn migrates_map_as_set_legacy_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feed1.json");
        tokio::fs::write(&path, r#"{"id1": true, "id2": true}"#).await.unwrap();

        let cache = ProcessedItemCache::load(dir.path(), "feed1", 100, None).await.unwrap();
        assert!(cache.contains("id1"));
        assert!(cache.contains("id2"));
    }

    #[tokio::test]
    async fn migrates_bare_array_of_objects_legacy_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feed1.json");
        tokio::fs::write(&path, r#"[{"id": "a"}, {"id": "b"}]"#).await.unwrap();

        let cache = ProcessedItemCache::load(dir.path(), "feed1", 100, None).await.unwrap();
        assert!(cache.contains("a"));
        assert!(cache.contains("b"));
    }

    #[tokio::test]
    async fn discards_cache_exceeding_migration_cardinality_ceiling() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feed1.json");
        let ids: Vec<String> = (0..MAX_MIGRATED_ENTRIES + 10).map(|i| format!("\"id{i}\"")).collect();
        let body = format!(r#"{{"items": [{}]}}"#, ids.join(","));
        tokio::fs::write(&path, body).await.unwrap();

        let cache = ProcessedItemCache::load(dir.path(), "feed1", 1_000_000, None).await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn detects_external_modification() {
        let dir = TempDir::new().unwrap();
        let mut cache = ProcessedItemCache::load(dir.path(), "feed1", 100, None).await.unwrap();
        cache.insert("a", 1);
        cache.save().await.unwrap();

        assert!(!cache.externally_modified().await);

        tokio::time::sleep(Duration::from_millis(10)).await;
        tokio::fs::write(&dir.path().join("feed1.json"), r#"{"entries": []}"#).await.unwrap();
        assert!(cache.externally_modified().await);
    }

    #[tokio::test]
    async fn ttl_evicts_stale_entries_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("feed1.json");
        let ancient = CacheFile {
            entries: vec![StoredEntry {
                id: "old".to_string(),
                first_seen_at: 0,
            }],
        };
        tokio::fs::write(&path, serde_json::to_vec(&ancient).unwrap()).await.unwrap();

        let cache = ProcessedItemCache::load(dir.path(), "feed1", 100, Some(1)).await.unwrap();
        assert!(!cache.contains("old"));
    }
}
