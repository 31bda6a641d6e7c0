//! Time-limited key/value store for platform responses.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// On-disk and in-memory record shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct CacheEntry {
    timestamp: DateTime<Utc>,
    result: Value,
}

pub trait KeyValueCache {
    /// Entry for `key` if it exists and `now` is before its expiry.
    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<Value>;

    /// Overwrite `key`, stamped with `now`.
    fn put_at(&self, key: &str, value: Value, now: DateTime<Utc>) -> Result<()>;

    fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, Utc::now())
    }

    fn put(&self, key: &str, value: Value) -> Result<()> {
        self.put_at(key, value, Utc::now())
    }
}

/// Typed read; entries that no longer deserialize count as misses.
pub fn load<T, C>(cache: &C, key: &str) -> Option<T>
where
    T: DeserializeOwned,
    C: KeyValueCache + ?Sized,
{
    let value = cache.get(key)?;
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(err) => {
            log::debug!("Ignoring malformed cache entry '{}': {}", key, err);
            None
        }
    }
}

/// Typed write. Failures are logged, not returned.
pub fn store<T, C>(cache: &C, key: &str, value: &T)
where
    T: Serialize,
    C: KeyValueCache + ?Sized,
{
    let result = serde_json::to_value(value)
        .context("Failed to serialize cache value")
        .and_then(|v| cache.put(key, v));
    if let Err(err) = result {
        log::warn!("Cache write for '{}' failed: {:#}", key, err);
    }
}

fn is_fresh(entry: &CacheEntry, ttl: Duration, now: DateTime<Utc>) -> bool {
    entry.timestamp + ttl > now
}

/// One JSON file per key under `dir`.
pub struct FileCache {
    dir: PathBuf,
    ttl: Duration,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    /// `<platform cache dir>/otw`, falling back to the home directory.
    pub fn default_dir() -> Result<PathBuf> {
        let base = dirs::cache_dir()
            .or_else(dirs::home_dir)
            .context("Cannot determine cache directory")?;
        Ok(base.join("otw"))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

impl KeyValueCache for FileCache {
    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        let path = self.path_for(key);
        let content = std::fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(e) => e,
            Err(err) => {
                log::debug!("Unreadable cache file {}: {}", path.display(), err);
                return None;
            }
        };
        if is_fresh(&entry, self.ttl, now) {
            log::debug!("Cache hit: {}", key);
            Some(entry.result)
        } else {
            log::debug!("Cache expired: {}", key);
            None
        }
    }

    fn put_at(&self, key: &str, value: Value, now: DateTime<Utc>) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache dir: {}", self.dir.display()))?;
        let path = self.path_for(key);
        let entry = CacheEntry {
            timestamp: now,
            result: value,
        };
        let body = serde_json::to_string(&entry)?;
        std::fs::write(&path, body)
            .with_context(|| format!("Failed to write cache file: {}", path.display()))?;
        Ok(())
    }
}

/// Process-local cache, used with `--no-cache` style runs and in tests.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }
}

impl KeyValueCache for MemoryCache {
    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|e| is_fresh(e, self.ttl, now))
            .map(|e| e.result.clone())
    }

    fn put_at(&self, key: &str, value: Value, now: DateTime<Utc>) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory cache lock poisoned"))?;
        entries.insert(
            key.to_string(),
            CacheEntry {
                timestamp: now,
                result: value,
            },
        );
        Ok(())
    }
}

/// Keys become file names: anything but ASCII alphanumerics, '-' and '_' maps to '_'.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn check_ttl_boundary(cache: &dyn KeyValueCache) {
        cache.put_at("future_house_128", json!(["a", "b"]), t0()).unwrap();

        let just_before = t0() + Duration::hours(23) + Duration::minutes(59);
        let just_after = t0() + Duration::hours(24) + Duration::minutes(1);
        assert_eq!(cache.get_at("future_house_128", just_before), Some(json!(["a", "b"])));
        assert_eq!(cache.get_at("future_house_128", just_after), None);
        assert_eq!(cache.get_at("future_house_128", t0() + Duration::hours(24)), None);
    }

    #[test]
    fn file_cache_ttl_boundary() {
        let dir = tempfile::tempdir().unwrap();
        check_ttl_boundary(&FileCache::new(dir.path(), Duration::hours(24)));
    }

    #[test]
    fn memory_cache_ttl_boundary() {
        check_ttl_boundary(&MemoryCache::new(Duration::hours(24)));
    }

    #[test]
    fn missing_key_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("not_created_yet"), Duration::hours(24));
        assert_eq!(cache.get("keyword_house"), None);
    }

    #[test]
    fn put_overwrites_and_restamps() {
        let cache = MemoryCache::new(Duration::hours(24));
        cache.put_at("k", json!(1), t0()).unwrap();
        let later = t0() + Duration::hours(20);
        cache.put_at("k", json!(2), later).unwrap();
        assert_eq!(cache.get_at("k", t0() + Duration::hours(30)), Some(json!(2)));
    }

    #[test]
    fn file_body_has_timestamp_and_result() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path(), Duration::hours(24));
        cache.put_at("keyword_tech house", json!({"score": 70.0}), t0()).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("keyword_tech_house.json")).unwrap();
        let body: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(body["result"]["score"], 70.0);
        assert!(body["timestamp"].as_str().unwrap().starts_with("2024-03-01T12:00:00"));
    }

    #[test]
    fn corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let cache = FileCache::new(dir.path(), Duration::hours(24));
        assert_eq!(cache.get("broken"), None);
    }

    #[test]
    fn typed_round_trip() {
        let cache = MemoryCache::new(Duration::hours(24));
        store(&cache, "nums", &vec![1u32, 2, 3]);
        let back: Option<Vec<u32>> = load(&cache, "nums");
        assert_eq!(back, Some(vec![1, 2, 3]));
        let wrong: Option<String> = load(&cache, "nums");
        assert_eq!(wrong, None);
    }

    #[test]
    fn sanitizes_keys() {
        assert_eq!(sanitize_key("similar_Future House_126"), "similar_Future_House_126");
        assert_eq!(sanitize_key("keyword_C#/house"), "keyword_C__house");
    }
}
