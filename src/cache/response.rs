//! Time-bounded response cache with per-key fetch serialization
//!
//! `ResponseCache::get_or_fetch` returns a stored payload while it is younger
//! than the TTL and otherwise runs the supplied fetch, persisting its result.
//! Callers sharing a key are serialized so at most one fetch per key is in
//! flight, and a caller that waited on the lock picks up the entry the first
//! caller stored.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::CacheManager;
use crate::data::DatasetFilter;

/// Derives the cache key of a dataset request
///
/// Produces `<dataset>[_geo-<geo>][_unit-<unit>]`. Bytes outside the allowed set
/// of each part are written as `~XX` hex: the dataset id keeps `_`, filter values
/// keep only ASCII alphanumerics. Separators therefore cannot occur inside a part,
/// and distinct requests never share a key.
pub fn cache_key(dataset_id: &str, filter: &DatasetFilter) -> String {
    let mut key = String::new();
    escape_into(&mut key, dataset_id, |c| c == '_');
    if let Some(geo) = &filter.geo {
        key.push_str("_geo-");
        escape_into(&mut key, geo, |_| false);
    }
    if let Some(unit) = &filter.unit {
        key.push_str("_unit-");
        escape_into(&mut key, unit, |_| false);
    }
    key
}

fn escape_into(key: &mut String, part: &str, keep: impl Fn(char) -> bool) {
    for c in part.chars() {
        if c.is_ascii_alphanumeric() || keep(c) {
            key.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                key.push_str(&format!("~{:02X}", byte));
            }
        }
    }
}

/// Disk-backed cache that gates remote fetches on entry age
#[derive(Debug, Clone)]
pub struct ResponseCache {
    manager: CacheManager,
    inflight: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ResponseCache {
    pub fn new(manager: CacheManager) -> Self {
        Self {
            manager,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn manager(&self) -> &CacheManager {
        &self.manager
    }

    /// Returns the fresh entry for `key`, or fetches and stores a new one
    ///
    /// # Arguments
    /// * `key` - Cache slot, see [`cache_key`]
    /// * `ttl` - Maximum age of an entry that is still served
    /// * `fetch` - Performs the remote call
    ///
    /// # Returns
    /// * `Ok(T)` from the cache on a hit, or from `fetch` on a miss
    /// * `Err(E)` if `fetch` fails; any stale entry is left untouched
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let lock = self.key_lock(key).await;
        let result = {
            let _guard = lock.lock().await;
            self.fetch_locked(key, ttl, fetch).await
        };
        self.release_key_lock(key, lock).await;
        result
    }

    async fn fetch_locked<T, E, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(data) = self.read_fresh::<T>(key, ttl).await {
            debug!(key, "cache hit");
            return Ok(data);
        }

        debug!(key, "cache miss, fetching");
        let data = fetch().await?;
        self.store(key, &data).await;
        Ok(data)
    }

    async fn read_fresh<T>(&self, key: &str, ttl: Duration) -> Option<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let manager = self.manager.clone();
        let owned_key = key.to_string();
        let cached = tokio::task::spawn_blocking(move || manager.read::<T>(&owned_key, ttl))
            .await
            .ok()
            .flatten()?;

        if cached.is_expired {
            debug!(key, cached_at = %cached.cached_at, "cache entry stale");
            return None;
        }
        Some(cached.data)
    }

    /// Persists a fetched payload; failures are logged, not returned
    async fn store<T: Serialize>(&self, key: &str, data: &T) {
        let encoded = match CacheManager::encode(data) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key, error = %e, "failed to encode cache entry");
                return;
            }
        };

        let manager = self.manager.clone();
        let owned_key = key.to_string();
        let written =
            tokio::task::spawn_blocking(move || manager.write_encoded(&owned_key, &encoded)).await;

        match written {
            Ok(Ok(())) => debug!(key, "cache entry stored"),
            Ok(Err(e)) => warn!(key, error = %e, "failed to write cache entry"),
            Err(e) => warn!(key, error = %e, "cache write task failed"),
        }
    }

    async fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut map = self.inflight.lock().await;
        Arc::clone(
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Drops the lock entry once no other caller holds a reference to it
    async fn release_key_lock(&self, key: &str, lock: Arc<Mutex<()>>) {
        let mut map = self.inflight.lock().await;
        // One reference in the map, one held here
        if Arc::strong_count(&lock) == 2 {
            map.remove(key);
        }
    }

    #[cfg(test)]
    async fn inflight_len(&self) -> usize {
        self.inflight.lock().await.len()
    }
}
