//! Dataset access combining the Eurostat client with the response cache
//!
//! This is where remote failures stop: a dataset that cannot be fetched is
//! logged and reported as `None`.

use std::time::Duration;
use tracing::warn;

use crate::cache::{cache_key, ResponseCache};
use crate::config::Config;
use crate::data::{DatasetFilter, EurostatClient, FetchError, RawDataset};

#[derive(Debug, Clone)]
pub struct DatasetService {
    client: EurostatClient,
    cache: Option<ResponseCache>,
    ttl: Duration,
}

impl DatasetService {
    pub fn new(client: EurostatClient, cache: Option<ResponseCache>, ttl: Duration) -> Self {
        Self { client, cache, ttl }
    }

    /// Builds the client and cache described by `config`
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let client = EurostatClient::with_base_url(&config.base_url, config.timeout())?;
        let cache = config.cache_manager().map(ResponseCache::new);
        if cache.is_none() {
            warn!("no cache directory available, every request will hit the network");
        }
        Ok(Self::new(client, cache, config.cache_ttl()))
    }

    /// Fetches a dataset, through the cache when `use_cache` is set
    ///
    /// # Returns
    /// * `Some(RawDataset)` from the cache or the network
    /// * `None` if the dataset is unavailable (network failure, error status, bad body)
    pub async fn dataset(
        &self,
        dataset_id: &str,
        filter: &DatasetFilter,
        use_cache: bool,
    ) -> Option<RawDataset> {
        let result = match (&self.cache, use_cache) {
            (Some(cache), true) => {
                let key = cache_key(dataset_id, filter);
                cache
                    .get_or_fetch(&key, self.ttl, || {
                        self.client.fetch_dataset(dataset_id, filter)
                    })
                    .await
            }
            _ => self.client.fetch_dataset(dataset_id, filter).await,
        };

        match result {
            Ok(dataset) => Some(dataset),
            Err(e) => {
                warn!(dataset_id, error = %e, "dataset unavailable");
                None
            }
        }
    }
}
