//! Core data models for the Eurostat CLI
//!
//! This module contains the raw JSON-stat payload types, the Eurostat API client,
//! and the decoded per-indicator table handed to downstream consumers.

pub mod dataset;
pub mod eurostat;

pub use dataset::{Category, CategoryIndex, Dimension, OrderedMap, RawDataset, Values};
pub use eurostat::{DatasetFormat, EurostatClient, FetchError};

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Optional query parameters narrowing a dataset request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetFilter {
    /// Geography code, e.g. "IT"
    pub geo: Option<String>,
    /// Unit code, e.g. "CP_MEUR"
    pub unit: Option<String>,
}

impl DatasetFilter {
    /// Query pairs for the upstream request, skipping unset parameters
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(geo) = self.geo.as_deref() {
            pairs.push(("geo", geo));
        }
        if let Some(unit) = self.unit.as_deref() {
            pairs.push(("unit", unit));
        }
        pairs
    }
}

/// One decoded data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Label of the time category
    pub time: String,
    /// Label of the geography category
    pub geo: String,
    /// Label of the unit category
    pub unit: String,
    /// Observed value
    pub value: f64,
}

/// Observations of a single indicator
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator: String,
    pub observations: Vec<Observation>,
}

/// Decoded observations grouped by indicator label
///
/// Indicators keep first-encounter order and observations keep index-traversal
/// order, which is not necessarily chronological. Serializes as a JSON object
/// keyed by indicator.
#[derive(Debug, Clone, Default)]
pub struct IndicatorTable {
    series: Vec<IndicatorSeries>,
    /// Indicator label to its slot in `series`
    positions: HashMap<String, usize>,
}

impl PartialEq for IndicatorTable {
    fn eq(&self, other: &Self) -> bool {
        self.series == other.series
    }
}

impl IndicatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an observation to the series of `indicator`, creating it if needed
    pub fn push(&mut self, indicator: &str, observation: Observation) {
        match self.positions.get(indicator) {
            Some(&slot) => self.series[slot].observations.push(observation),
            None => {
                self.positions
                    .insert(indicator.to_string(), self.series.len());
                self.series.push(IndicatorSeries {
                    indicator: indicator.to_string(),
                    observations: vec![observation],
                });
            }
        }
    }

    pub fn get(&self, indicator: &str) -> Option<&[Observation]> {
        self.positions
            .get(indicator)
            .map(|&slot| self.series[slot].observations.as_slice())
    }

    pub fn indicators(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.indicator.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndicatorSeries> {
        self.series.iter()
    }

    /// Number of indicators
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Total number of observations across all indicators
    pub fn observation_count(&self) -> usize {
        self.series.iter().map(|s| s.observations.len()).sum()
    }

    pub(crate) fn from_series(series: Vec<IndicatorSeries>) -> Self {
        let positions = series
            .iter()
            .enumerate()
            .map(|(slot, s)| (s.indicator.clone(), slot))
            .collect();
        Self { series, positions }
    }

    pub(crate) fn into_series(self) -> Vec<IndicatorSeries> {
        self.series
    }
}

impl Serialize for IndicatorTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.series.len()))?;
        for series in &self.series {
            map.serialize_entry(&series.indicator, &series.observations)?;
        }
        map.end()
    }
}
