//! JSON-stat decoder
//!
//! Turns the flat `value` mapping of a [`RawDataset`] into an [`IndicatorTable`]:
//! every present linear index is decomposed into category positions with
//! mixed-radix strides, the positions are resolved to labels, and the resulting
//! observation is appended under its indicator label.
//!
//! Decoding is pure. Writing tables to disk is the job of [`crate::export`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::data::{Dimension, IndicatorTable, Observation, RawDataset};

/// Names of the dimensions the decoder reads
///
/// * `time` - chronological axis, varies fastest
/// * `indicator` - grouping axis of the output table
/// * `geo` - geography axis
/// * `unit` - unit of measure axis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisNames {
    pub time: String,
    pub indicator: String,
    pub geo: String,
    pub unit: String,
}

impl Default for AxisNames {
    fn default() -> Self {
        Self {
            time: "time".to_string(),
            indicator: "na_item".to_string(),
            geo: "geo".to_string(),
            unit: "unit".to_string(),
        }
    }
}

/// How linear indices are mapped to geo and unit categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeMode {
    /// Decompose every axis with its own stride
    #[default]
    Full,
    /// Decompose time and indicator only; geo and unit take the first category.
    /// Correct only for datasets narrowed to one geography and one unit.
    FirstCategory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub axes: AxisNames,
    pub mode: DecodeMode,
}

/// Structural problems that make a dataset undecodable
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// A required axis is absent from the payload
    #[error("Missing dimension '{0}' in dataset")]
    MissingDimension(String),

    /// An axis has no categories, so no index can land on it
    #[error("Dimension '{0}' has no categories")]
    EmptyDimension(String),

    /// The payload declares a dimension order that omits a required axis
    #[error("Dimension '{0}' is not listed in the dataset id")]
    UnorderedDimension(String),
}

/// A value whose index could not be resolved to labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodingMismatch {
    /// The value key as it appeared in the payload
    pub key: String,
    /// Axis that failed to resolve, `None` if the key itself is not an index
    pub axis: Option<String>,
    pub position: Option<usize>,
}

impl fmt::Display for DecodingMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.axis, self.position) {
            (Some(axis), Some(position)) => write!(
                f,
                "value {} maps to position {} of '{}', which has no label",
                self.key, position, axis
            ),
            _ => write!(f, "value key '{}' is not a linear index", self.key),
        }
    }
}

/// Diagnostics collected during one decode call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeReport {
    /// Observations emitted into the table
    pub observations: usize,
    /// Values skipped because they could not be resolved
    pub mismatches: Vec<DecodingMismatch>,
}

impl DecodeReport {
    /// Number of values that produced no observation
    pub fn skipped(&self) -> usize {
        self.mismatches.len()
    }
}

/// Output of [`decode`]
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub table: IndicatorTable,
    pub report: DecodeReport,
}

/// How one axis obtains its label for a linear index
#[derive(Debug)]
enum AxisRule<'a> {
    Strided {
        stride: usize,
        size: usize,
        labels: Vec<Option<&'a str>>,
    },
    Fixed(Option<&'a str>),
}

impl<'a> AxisRule<'a> {
    fn strided(dimension: &'a Dimension, stride: usize, size: usize) -> Self {
        AxisRule::Strided {
            stride,
            size,
            labels: dimension.category.labels_by_position(),
        }
    }

    /// Resolves the label at `index`, or the unresolvable position
    fn resolve(&self, index: usize) -> Result<&'a str, usize> {
        match self {
            AxisRule::Strided {
                stride,
                size,
                labels,
            } => {
                let position = (index / stride) % size;
                labels.get(position).copied().flatten().ok_or(position)
            }
            AxisRule::Fixed(label) => label.ok_or(0),
        }
    }
}

fn required<'a>(raw: &'a RawDataset, name: &str) -> Result<&'a Dimension, DecodeError> {
    let dimension = raw
        .dimension(name)
        .ok_or_else(|| DecodeError::MissingDimension(name.to_string()))?;
    if dimension.size() == 0 {
        return Err(DecodeError::EmptyDimension(name.to_string()));
    }
    Ok(dimension)
}

/// Whether `size` lines up with `id` and with the category count of every listed axis
fn sizes_consistent(raw: &RawDataset) -> bool {
    raw.size.len() == raw.id.len()
        && raw
            .id
            .iter()
            .zip(&raw.size)
            .all(|(name, &size)| raw.dimension(name).map_or(true, |d| d.size() == size))
}

/// Stride and size of every dimension in slowest-to-fastest order
fn layout(raw: &RawDataset, axes: &AxisNames) -> Result<Vec<(String, usize, usize)>, DecodeError> {
    let (names, sizes): (Vec<String>, Vec<usize>) = if raw.id.is_empty() {
        // Provider convention: time fastest, then indicator, geo, unit
        let names = vec![
            axes.unit.clone(),
            axes.geo.clone(),
            axes.indicator.clone(),
            axes.time.clone(),
        ];
        let sizes = names
            .iter()
            .map(|name| required(raw, name).map(Dimension::size))
            .collect::<Result<_, _>>()?;
        (names, sizes)
    } else if sizes_consistent(raw) {
        (raw.id.clone(), raw.size.clone())
    } else {
        debug!(declared = ?raw.size, "declared sizes disagree with categories, using category counts");
        let sizes = raw
            .id
            .iter()
            .map(|name| required(raw, name).map(Dimension::size))
            .collect::<Result<_, _>>()?;
        (raw.id.clone(), sizes)
    };

    let mut strides = vec![0; names.len()];
    let mut stride = 1usize;
    for (i, size) in sizes.iter().enumerate().rev() {
        if *size == 0 {
            return Err(DecodeError::EmptyDimension(names[i].clone()));
        }
        strides[i] = stride;
        stride = stride.saturating_mul(*size);
    }

    Ok(names
        .into_iter()
        .zip(strides)
        .zip(sizes)
        .map(|((name, stride), size)| (name, stride, size))
        .collect())
}

fn full_rule<'a>(
    dimension: &'a Dimension,
    name: &str,
    layout: &[(String, usize, usize)],
) -> Result<AxisRule<'a>, DecodeError> {
    let (_, stride, size) = layout
        .iter()
        .find(|(n, _, _)| n == name)
        .ok_or_else(|| DecodeError::UnorderedDimension(name.to_string()))?;
    Ok(AxisRule::strided(dimension, *stride, *size))
}

/// Decodes a dataset into observations grouped by indicator
///
/// Values are visited in ascending index order; missing indices produce no
/// observation. Values whose positions have no label are skipped and listed in
/// the report, with a single warning per call.
///
/// # Errors
/// Fails without a partial table when a configured axis is absent or empty.
pub fn decode(raw: &RawDataset, config: &DecoderConfig) -> Result<Decoded, DecodeError> {
    let axes = &config.axes;
    let time = required(raw, &axes.time)?;
    let indicator = required(raw, &axes.indicator)?;
    let geo = required(raw, &axes.geo)?;
    let unit = required(raw, &axes.unit)?;

    let rules: [(&str, AxisRule); 4] = match config.mode {
        DecodeMode::Full => {
            let layout = layout(raw, axes)?;
            [
                (axes.time.as_str(), full_rule(time, &axes.time, &layout)?),
                (axes.indicator.as_str(), full_rule(indicator, &axes.indicator, &layout)?),
                (axes.geo.as_str(), full_rule(geo, &axes.geo, &layout)?),
                (axes.unit.as_str(), full_rule(unit, &axes.unit, &layout)?),
            ]
        }
        DecodeMode::FirstCategory => [
            (axes.time.as_str(), AxisRule::strided(time, 1, time.size())),
            (
                axes.indicator.as_str(),
                AxisRule::strided(indicator, time.size(), indicator.size()),
            ),
            (axes.geo.as_str(), AxisRule::Fixed(geo.category.first_label())),
            (axes.unit.as_str(), AxisRule::Fixed(unit.category.first_label())),
        ],
    };

    let present = raw.value.present();
    let mut table = IndicatorTable::new();
    let mut mismatches: Vec<DecodingMismatch> = present
        .invalid_keys
        .into_iter()
        .map(|key| DecodingMismatch {
            key,
            axis: None,
            position: None,
        })
        .collect();

    'values: for (index, value) in present.entries {
        let mut labels = [""; 4];
        for (slot, (name, rule)) in labels.iter_mut().zip(rules.iter()) {
            match rule.resolve(index) {
                Ok(label) => *slot = label,
                Err(position) => {
                    mismatches.push(DecodingMismatch {
                        key: index.to_string(),
                        axis: Some(name.to_string()),
                        position: Some(position),
                    });
                    continue 'values;
                }
            }
        }

        let [time_label, indicator_label, geo_label, unit_label] = labels;
        table.push(
            indicator_label,
            Observation {
                time: time_label.to_string(),
                geo: geo_label.to_string(),
                unit: unit_label.to_string(),
                value,
            },
        );
    }

    if let Some(first) = mismatches.first() {
        warn!(
            skipped = mismatches.len(),
            first = %first,
            "decoding mismatch, observations skipped"
        );
    }

    let report = DecodeReport {
        observations: table.observation_count(),
        mismatches,
    };
    debug!(
        indicators = table.len(),
        observations = report.observations,
        mode = ?config.mode,
        "dataset decoded"
    );

    Ok(Decoded { table, report })
}
