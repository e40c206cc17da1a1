//! Consumer-facing queries
//!
//! Each kind of request is a [`Query`] variant with its own handler, so adding a
//! query means the compiler points at every place that has to handle it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::data::{DatasetFilter, FetchError, IndicatorTable, OrderedMap, RawDataset};
use crate::decode::{decode, DecodeError, DecoderConfig};
use crate::export::{ExportOptions, Exporter};
use crate::filter::TableFilter;
use crate::service::DatasetService;

/// Sub-directory of a run holding the exported tables
pub const PROCESSED_DIR: &str = "processed_data";

/// Parameters of a `generate` run, also written to `input_request.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub dataset_id: String,
    pub geo: Option<String>,
    pub unit: Option<String>,
    pub time_range: Option<Vec<String>>,
    pub indicators: Option<Vec<String>>,
}

impl GenerateRequest {
    pub fn filter(&self) -> DatasetFilter {
        DatasetFilter {
            geo: self.geo.clone(),
            unit: self.unit.clone(),
        }
    }

    pub fn table_filter(&self) -> TableFilter {
        TableFilter::new(self.indicators.clone(), self.time_range.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Labels of the indicator axis of a dataset
    Indicators { dataset_id: String },
    /// Geography, unit and time options of a dataset
    Parameters { dataset_id: String },
    /// Fetch, decode, export and filter a dataset
    Generate {
        request: GenerateRequest,
        use_cache: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorsResponse {
    pub indicators: OrderedMap<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParametersResponse {
    pub geo_options: OrderedMap<String>,
    pub unit_options: OrderedMap<String>,
    pub time_options: OrderedMap<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub raw_data: RawDataset,
    pub processed_data: IndicatorTable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Indicators(IndicatorsResponse),
    Parameters(ParametersResponse),
    Generate(GenerateResponse),
}

/// Errors that stop a query
#[derive(Debug, Error)]
pub enum QueryError {
    /// The dataset could not be fetched
    #[error("Dataset '{0}' not available")]
    NoData(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Failed to prepare run directory {path}: {source}")]
    RunDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to set up client: {0}")]
    Client(#[from] FetchError),
}

/// Everything a query handler needs
#[derive(Debug, Clone)]
pub struct QueryContext {
    service: DatasetService,
    decoder: DecoderConfig,
    output_root: PathBuf,
    export: ExportOptions,
}

impl QueryContext {
    pub fn new(
        service: DatasetService,
        decoder: DecoderConfig,
        output_root: impl Into<PathBuf>,
        export: ExportOptions,
    ) -> Self {
        Self {
            service,
            decoder,
            output_root: output_root.into(),
            export,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, QueryError> {
        Ok(Self::new(
            DatasetService::from_config(config)?,
            config.decoder.clone(),
            config.output_dir.clone(),
            config.export_options(),
        ))
    }

    pub async fn run(&self, query: Query) -> Result<QueryOutput, QueryError> {
        match query {
            Query::Indicators { dataset_id } => {
                self.indicators(&dataset_id).await.map(QueryOutput::Indicators)
            }
            Query::Parameters { dataset_id } => {
                self.parameters(&dataset_id).await.map(QueryOutput::Parameters)
            }
            Query::Generate { request, use_cache } => {
                self.generate(request, use_cache).await.map(QueryOutput::Generate)
            }
        }
    }

    async fn fetch_uncached(&self, dataset_id: &str) -> Result<RawDataset, QueryError> {
        self.service
            .dataset(dataset_id, &DatasetFilter::default(), false)
            .await
            .ok_or_else(|| QueryError::NoData(dataset_id.to_string()))
    }

    pub async fn indicators(&self, dataset_id: &str) -> Result<IndicatorsResponse, QueryError> {
        let dataset = self.fetch_uncached(dataset_id).await?;
        let axis = &self.decoder.axes.indicator;
        let dimension = dataset
            .dimension(axis)
            .ok_or_else(|| DecodeError::MissingDimension(axis.clone()))?;

        Ok(IndicatorsResponse {
            indicators: dimension.category.label.clone(),
        })
    }

    pub async fn parameters(&self, dataset_id: &str) -> Result<ParametersResponse, QueryError> {
        let dataset = self.fetch_uncached(dataset_id).await?;
        let axes = &self.decoder.axes;

        Ok(ParametersResponse {
            geo_options: dataset.labels_of(&axes.geo),
            unit_options: dataset.labels_of(&axes.unit),
            time_options: dataset.labels_of(&axes.time),
        })
    }

    pub async fn generate(
        &self,
        request: GenerateRequest,
        use_cache: bool,
    ) -> Result<GenerateResponse, QueryError> {
        let run_id = Utc::now().format("%Y%m%dT%H%M%S%6f").to_string();
        let run_dir = self.output_root.join(format!("output_{}", run_id));
        tokio::fs::create_dir_all(&run_dir)
            .await
            .map_err(|source| QueryError::RunDirectory {
                path: run_dir.clone(),
                source,
            })?;
        info!(run_id = %run_id, dataset_id = %request.dataset_id, "generate run started");

        save_json(&run_dir.join("input_request.json"), &request).await;

        let raw = self
            .service
            .dataset(&request.dataset_id, &request.filter(), use_cache)
            .await
            .ok_or_else(|| QueryError::NoData(request.dataset_id.clone()))?;

        save_json(&run_dir.join("raw_data.json"), &raw).await;

        let decoded = decode(&raw, &self.decoder)?;

        let exporter = Exporter::new(run_dir.join(PROCESSED_DIR), self.export);
        let table = decoded.table.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || exporter.export(&table)).await {
            warn!(error = %e, "export task failed");
        }

        let processed_data = request.table_filter().apply(decoded.table);

        Ok(GenerateResponse {
            id: run_id,
            raw_data: raw,
            processed_data,
        })
    }
}

/// Writes a run artifact; failures are logged and do not stop the run
async fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) {
    let encoded = match serde_json::to_vec_pretty(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to encode run artifact");
            return;
        }
    };
    if let Err(e) = tokio::fs::write(path, encoded).await {
        warn!(path = %path.display(), error = %e, "failed to write run artifact");
    }
}
