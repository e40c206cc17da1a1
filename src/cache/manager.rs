//! Cache manager for persisting API responses to disk
//!
//! Provides a `CacheManager` that stores serializable data as one JSON file per
//! key, stamped with the time it was written. Freshness is decided on every
//! read against a caller-supplied TTL; nothing is ever evicted.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Wrapper struct for cached data stored on disk
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// The cached data
    data: T,
    /// Seconds since the Unix epoch when the data was cached
    timestamp: f64,
}

/// Result of reading from cache, including metadata about cache freshness
#[derive(Debug)]
pub struct CachedData<T> {
    /// The cached data
    pub data: T,
    /// When the data was originally cached
    pub cached_at: DateTime<Utc>,
    /// Whether the entry is at least `ttl` old or stamped in the future
    pub is_expired: bool,
}

/// Current time as fractional seconds since the Unix epoch
fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Manages reading and writing cached data to disk
///
/// The cache manager stores data as JSON files in an XDG-compliant cache directory
/// (`~/.cache/eurostat-cli/` on Linux). Missing or corrupt entries read as `None`
/// so a damaged cache degrades to "always fetch" instead of failing the caller.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl CacheManager {
    /// Creates a new CacheManager using XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "eurostat-cli")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a new CacheManager with a custom cache directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &std::path::Path {
        &self.cache_dir
    }

    /// Returns the path to a cache file for the given key
    pub fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }

    /// Serializes data into a cache entry stamped with the current time
    pub fn encode<T: Serialize>(data: &T) -> io::Result<String> {
        let entry = CacheEntry {
            data,
            timestamp: now_timestamp(),
        };
        serde_json::to_string_pretty(&entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Writes an already encoded entry for `key`
    ///
    /// The entry is written to a temporary sibling and renamed into place, so a
    /// concurrent reader sees either the old entry or the new one.
    pub fn write_encoded(&self, key: &str, encoded: &str) -> io::Result<()> {
        self.ensure_dir()?;

        let path = self.cache_path(key);
        let tmp_path = self.cache_dir.join(format!(".{}.json.tmp", key));
        fs::write(&tmp_path, encoded)?;
        fs::rename(&tmp_path, &path)
    }

    /// Writes data to the cache, overwriting any prior entry for `key`
    ///
    /// # Returns
    /// * `Ok(())` on success
    /// * `Err` if directory creation or file writing fails
    pub fn write<T: Serialize>(&self, key: &str, data: &T) -> io::Result<()> {
        let encoded = Self::encode(data)?;
        self.write_encoded(key, &encoded)
    }

    /// Reads data from the cache
    ///
    /// Returns `Some(CachedData)` with `is_expired = true` if the entry exists but
    /// is at least `ttl` old. Returns `None` if the entry doesn't exist or cannot
    /// be parsed; a corrupt entry is logged.
    pub fn read<T: DeserializeOwned>(&self, key: &str, ttl: Duration) -> Option<CachedData<T>> {
        let path = self.cache_path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(key, "no cache entry");
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "cache entry unreadable, treating as miss");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "cache entry corrupt, treating as miss");
                return None;
            }
        };

        let age = now_timestamp() - entry.timestamp;
        // A timestamp from the future (clock moved back) cannot prove freshness
        let is_expired = age < 0.0 || age >= ttl.as_secs_f64();
        let cached_at = DateTime::from_timestamp_micros((entry.timestamp * 1_000_000.0) as i64)
            .unwrap_or_else(Utc::now);

        Some(CachedData {
            data: entry.data,
            cached_at,
            is_expired,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::thread;
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(86_400);

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        name: String,
        value: i32,
    }

    fn create_test_cache() -> (CacheManager, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = CacheManager::with_dir(temp_dir.path().to_path_buf());
        (cache, temp_dir)
    }

    #[test]
    fn test_write_creates_file_with_data_and_timestamp() {
        let (cache, temp_dir) = create_test_cache();
        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        cache.write("test_key", &data).expect("Write should succeed");

        let expected_path = temp_dir.path().join("test_key.json");
        assert!(expected_path.exists(), "Cache file should exist");

        let content = fs::read_to_string(&expected_path).expect("Should read file");
        let json: serde_json::Value = serde_json::from_str(&content).expect("Valid JSON");
        assert_eq!(json["data"]["name"], "test");
        assert_eq!(json["data"]["value"], 42);
        assert!(json["timestamp"].is_f64());
    }

    #[test]
    fn test_write_leaves_no_temporary_file() {
        let (cache, temp_dir) = create_test_cache();
        cache
            .write("atomic_key", &TestData { name: "a".to_string(), value: 1 })
            .expect("Write should succeed");

        let names: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["atomic_key.json".to_string()]);
    }

    #[test]
    fn test_read_returns_none_for_missing_key() {
        let (cache, _temp_dir) = create_test_cache();

        let result: Option<CachedData<TestData>> = cache.read("nonexistent_key", DAY);

        assert!(result.is_none(), "Should return None for missing key");
    }

    #[test]
    fn test_read_returns_none_for_corrupt_entry() {
        let (cache, temp_dir) = create_test_cache();
        fs::write(temp_dir.path().join("corrupt_key.json"), "{ not json").unwrap();

        let result: Option<CachedData<TestData>> = cache.read("corrupt_key", DAY);

        assert!(result.is_none(), "Corrupt entry should read as a miss");
    }

    #[test]
    fn test_read_returns_none_for_wrong_shape() {
        let (cache, temp_dir) = create_test_cache();
        fs::write(
            temp_dir.path().join("shape_key.json"),
            r#"{"data": {"name": 1}, "timestamp": "yesterday"}"#,
        )
        .unwrap();

        let result: Option<CachedData<TestData>> = cache.read("shape_key", DAY);

        assert!(result.is_none());
    }

    #[test]
    fn test_read_returns_data_with_is_expired_false_for_fresh_cache() {
        let (cache, _temp_dir) = create_test_cache();
        let data = TestData {
            name: "fresh".to_string(),
            value: 100,
        };

        cache.write("fresh_key", &data).expect("Write should succeed");

        let result: CachedData<TestData> = cache.read("fresh_key", DAY).expect("Should read fresh cache");

        assert_eq!(result.data, data);
        assert!(!result.is_expired, "Fresh cache should not be expired");
    }

    #[test]
    fn test_read_returns_data_with_is_expired_true_for_expired_cache() {
        let (cache, _temp_dir) = create_test_cache();
        let data = TestData {
            name: "expired".to_string(),
            value: 0,
        };

        cache.write("expired_key", &data).expect("Write should succeed");

        // Small delay to ensure expiry
        thread::sleep(StdDuration::from_millis(10));

        let result: CachedData<TestData> = cache
            .read("expired_key", Duration::from_millis(1))
            .expect("Should read expired cache");

        assert_eq!(result.data, data);
        assert!(result.is_expired, "Entry older than the TTL should be expired");
    }

    #[test]
    fn test_zero_ttl_is_always_expired() {
        let (cache, _temp_dir) = create_test_cache();
        cache
            .write("zero_key", &TestData { name: "z".to_string(), value: 0 })
            .unwrap();

        let result: CachedData<TestData> = cache.read("zero_key", Duration::ZERO).unwrap();

        assert!(result.is_expired);
    }

    #[test]
    fn test_future_timestamp_is_expired() {
        let (cache, temp_dir) = create_test_cache();
        let future = now_timestamp() + 3600.0;
        fs::write(
            temp_dir.path().join("future_key.json"),
            format!(r#"{{"data": {{"name": "ahead", "value": 5}}, "timestamp": {}}}"#, future),
        )
        .unwrap();

        let result: CachedData<TestData> = cache.read("future_key", DAY).unwrap();

        assert_eq!(result.data.name, "ahead");
        assert!(result.is_expired, "Entry stamped in the future should not count as fresh");
    }

    #[test]
    fn test_write_creates_directory_if_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested_path = temp_dir.path().join("nested").join("cache").join("dir");
        let cache = CacheManager::with_dir(nested_path.clone());

        let data = TestData {
            name: "nested".to_string(),
            value: 1,
        };

        cache.write("nested_key", &data).expect("Write should succeed");

        assert!(nested_path.exists(), "Nested directory should be created");
        assert!(nested_path.join("nested_key.json").exists(), "Cache file should exist");
    }

    #[test]
    fn test_cached_at_timestamp_is_recorded() {
        let (cache, _temp_dir) = create_test_cache();
        let data = TestData {
            name: "timestamp".to_string(),
            value: 999,
        };

        let before = Utc::now() - chrono::Duration::milliseconds(1);
        cache.write("timestamp_key", &data).expect("Write should succeed");
        let after = Utc::now() + chrono::Duration::milliseconds(1);

        let result: CachedData<TestData> = cache.read("timestamp_key", DAY).expect("Should read cache");

        assert!(result.cached_at >= before, "cached_at should be after write started");
        assert!(result.cached_at <= after, "cached_at should be before write finished");
    }

    #[test]
    fn test_new_creates_xdg_compliant_path() {
        if let Some(cache) = CacheManager::new() {
            let path_str = cache.cache_dir.to_string_lossy();
            assert!(
                path_str.contains("eurostat-cli"),
                "Cache path should contain project name"
            );
        }
        // Test passes if new() returns None (e.g., no home directory in CI)
    }

    #[test]
    fn test_overwrite_existing_cache() {
        let (cache, _temp_dir) = create_test_cache();
        let data1 = TestData {
            name: "first".to_string(),
            value: 1,
        };
        let data2 = TestData {
            name: "second".to_string(),
            value: 2,
        };

        cache.write("overwrite_key", &data1).expect("First write should succeed");
        cache.write("overwrite_key", &data2).expect("Second write should succeed");

        let result: CachedData<TestData> = cache.read("overwrite_key", DAY).expect("Should read cache");

        assert_eq!(result.data, data2, "Cache should contain latest data");
    }
}
