//! File export of decoded tables
//!
//! Writes one JSON and/or one delimited-text file per indicator plus a combined
//! `final_output.json`. Export failures are logged and collected in the
//! [`ExportSummary`]; they never affect the table itself.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::data::{IndicatorTable, Observation};

/// Name of the combined output file
pub const FINAL_OUTPUT_FILE: &str = "final_output.json";

/// A single file that could not be written
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error writing {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV error writing {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Which files to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// One `<indicator>.json` per indicator
    pub separate_json: bool,
    /// One `<indicator>.csv` per indicator
    pub csv: bool,
    pub csv_delimiter: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            separate_json: true,
            csv: true,
            csv_delimiter: b';',
        }
    }
}

/// Files written and failures encountered by one export
#[derive(Debug, Default)]
pub struct ExportSummary {
    pub written: Vec<PathBuf>,
    pub failures: Vec<ExportError>,
}

impl ExportSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, result: Result<PathBuf, ExportError>) {
        match result {
            Ok(path) => self.written.push(path),
            Err(e) => {
                warn!(error = %e, "export failed");
                self.failures.push(e);
            }
        }
    }
}

/// File-safe stem for an indicator label
pub fn file_stem(indicator: &str) -> String {
    indicator
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}

/// Writes decoded tables into a directory
#[derive(Debug, Clone)]
pub struct Exporter {
    dir: PathBuf,
    options: ExportOptions,
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>, options: ExportOptions) -> Self {
        Self {
            dir: dir.into(),
            options,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes every configured file for `table`
    pub fn export(&self, table: &IndicatorTable) -> ExportSummary {
        let mut summary = ExportSummary::default();

        if let Err(source) = fs::create_dir_all(&self.dir) {
            summary.record(Err(ExportError::Io {
                path: self.dir.clone(),
                source,
            }));
            return summary;
        }

        for series in table.iter() {
            let stem = file_stem(&series.indicator);
            if self.options.separate_json {
                let path = self.dir.join(format!("{}.json", stem));
                summary.record(write_json(&path, &series.observations));
            }
            if self.options.csv {
                let path = self.dir.join(format!("{}.csv", stem));
                summary.record(self.write_csv(&path, &series.observations));
            }
        }

        summary.record(write_json(&self.dir.join(FINAL_OUTPUT_FILE), table));

        info!(
            dir = %self.dir.display(),
            written = summary.written.len(),
            failed = summary.failures.len(),
            "tables exported"
        );
        summary
    }

    fn write_csv(&self, path: &Path, observations: &[Observation]) -> Result<PathBuf, ExportError> {
        let csv_err = |source| ExportError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.options.csv_delimiter)
            .from_path(path)
            .map_err(csv_err)?;
        if observations.is_empty() {
            writer
                .write_record(["time", "geo", "unit", "value"])
                .map_err(csv_err)?;
        }
        for observation in observations {
            writer.serialize(observation).map_err(csv_err)?;
        }
        writer.flush().map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(path.to_path_buf())
    }
}

/// Writes pretty-printed JSON
pub fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf, ExportError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ExportError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(path.to_path_buf())
}
