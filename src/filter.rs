//! Post-decode filtering of indicator tables
//!
//! Both filters are pure and order-preserving, and they commute.

use std::collections::HashSet;

use crate::data::{IndicatorSeries, IndicatorTable};

/// Caller-supplied restrictions on a decoded table
///
/// `None` leaves the table unrestricted on that axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFilter {
    pub indicators: Option<HashSet<String>>,
    pub time_range: Option<HashSet<String>>,
}

impl TableFilter {
    pub fn new(indicators: Option<Vec<String>>, time_range: Option<Vec<String>>) -> Self {
        Self {
            indicators: indicators.map(|v| v.into_iter().collect()),
            time_range: time_range.map(|v| v.into_iter().collect()),
        }
    }

    pub fn apply(&self, table: IndicatorTable) -> IndicatorTable {
        let table = match &self.indicators {
            Some(indicators) => table.filter_indicators(indicators),
            None => table,
        };
        match &self.time_range {
            Some(times) => table.filter_time(times),
            None => table,
        }
    }
}

impl IndicatorTable {
    /// Keeps only the indicators named in `indicators`
    pub fn filter_indicators(self, indicators: &HashSet<String>) -> IndicatorTable {
        IndicatorTable::from_series(
            self.into_series()
                .into_iter()
                .filter(|s| indicators.contains(&s.indicator))
                .collect(),
        )
    }

    /// Keeps only observations whose time label is in `times`
    ///
    /// Indicators left without observations stay in the table with an empty list.
    pub fn filter_time(self, times: &HashSet<String>) -> IndicatorTable {
        IndicatorTable::from_series(
            self.into_series()
                .into_iter()
                .map(|series| IndicatorSeries {
                    observations: series
                        .observations
                        .into_iter()
                        .filter(|o| times.contains(&o.time))
                        .collect(),
                    indicator: series.indicator,
                })
                .collect(),
        )
    }
}
