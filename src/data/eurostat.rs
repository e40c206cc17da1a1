//! Eurostat dissemination API client
//!
//! Downloads JSON-stat datasets by identifier, optionally narrowed by geography
//! and unit. Every transport failure surfaces as a [`FetchError`]; callers that
//! only care about "is there a dataset" go through `DatasetService`, which turns
//! these into `None`.

use reqwest::Client;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::{DatasetFilter, RawDataset};

/// Base URL for JSON-stat dataset downloads
pub const EUROSTAT_JSON_BASE_URL: &str =
    "https://ec.europa.eu/eurostat/api/dissemination/statistics/1.0/data/";

/// Base URL for SDMX dataflow downloads
pub const EUROSTAT_SDMX_BASE_URL: &str =
    "https://ec.europa.eu/eurostat/api/dissemination/sdmx/3.0/data/dataflow/";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Wire formats offered by the dissemination API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    JsonStat,
    Sdmx,
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetFormat::JsonStat => f.write_str("json"),
            DatasetFormat::Sdmx => f.write_str("sdmx"),
        }
    }
}

/// Errors that can occur when fetching a dataset
///
/// All variants mean the remote dataset is unavailable for this request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed (connection, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Body is not a JSON-stat dataset
    #[error("Failed to parse dataset: {0}")]
    Parse(#[from] serde_json::Error),

    /// Format cannot be decoded into a dataset
    #[error("Unsupported dataset format: {0}")]
    UnsupportedFormat(DatasetFormat),
}

/// Client for the Eurostat dissemination API
#[derive(Debug, Clone)]
pub struct EurostatClient {
    client: Client,
    base_url: String,
}

impl EurostatClient {
    /// Creates a client against the public API with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Self::with_base_url(EUROSTAT_JSON_BASE_URL, timeout)
    }

    /// Creates a client against a custom JSON-stat base URL
    ///
    /// The dataset identifier is appended directly, so the URL should end with `/`.
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).gzip(true).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Builds the download URL of a dataset in the given format
    pub fn dataset_url(&self, dataset_id: &str, format: DatasetFormat) -> String {
        match format {
            DatasetFormat::JsonStat => format!("{}{}", self.base_url, dataset_id),
            DatasetFormat::Sdmx => format!("{}{}/1.0", EUROSTAT_SDMX_BASE_URL, dataset_id),
        }
    }

    /// Fetches a JSON-stat dataset
    ///
    /// # Arguments
    /// * `dataset_id` - Eurostat dataset code, e.g. "nama_10_gdp"
    /// * `filter` - Optional geography/unit narrowing
    ///
    /// # Returns
    /// * `Ok(RawDataset)` - The decoded payload
    /// * `Err(FetchError)` - On network failure, timeout, error status or malformed body
    pub async fn fetch_dataset(
        &self,
        dataset_id: &str,
        filter: &DatasetFilter,
    ) -> Result<RawDataset, FetchError> {
        self.fetch_dataset_as(dataset_id, filter, DatasetFormat::JsonStat)
            .await
    }

    /// Fetches a dataset in an explicit format
    ///
    /// Only JSON-stat payloads decode into a [`RawDataset`].
    pub async fn fetch_dataset_as(
        &self,
        dataset_id: &str,
        filter: &DatasetFilter,
        format: DatasetFormat,
    ) -> Result<RawDataset, FetchError> {
        if format != DatasetFormat::JsonStat {
            return Err(FetchError::UnsupportedFormat(format));
        }

        let url = self.dataset_url(dataset_id, format);
        debug!(%url, ?filter, "requesting dataset");

        let response = self
            .client
            .get(&url)
            .query(&filter.query_pairs())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let text = response.text().await?;
        let dataset: RawDataset = serde_json::from_str(&text)?;

        info!(
            dataset_id,
            values = dataset.value.count(),
            "dataset downloaded"
        );
        Ok(dataset)
    }
}
