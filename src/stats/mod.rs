//! In-memory aggregation of stored records into stat payloads and chart series.
//!
//! Every aggregate is a single pass over already filtered records. Hours are
//! rounded to 2 decimals and percentages to 1.

pub mod arion;
pub mod rse;
pub mod students;
pub mod teaching;
pub mod vacataires;

use std::collections::BTreeMap;

use serde::Serialize;

pub use crate::models::round2;

/// One labeled series, for pie and bar charts.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl Series {
    pub fn from_counts(counts: &BTreeMap<String, usize>) -> Self {
        Self {
            labels: counts.keys().cloned().collect(),
            values: counts.values().map(|&n| n as f64).collect(),
        }
    }

    pub fn from_totals(totals: &BTreeMap<String, f64>) -> Self {
        Self {
            labels: totals.keys().cloned().collect(),
            values: totals.values().map(|&v| round2(v)).collect(),
        }
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// A named line or bar group inside a [`MultiSeries`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
}

/// Several datasets sharing one label axis.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MultiSeries {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

/// Payload of a chart endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Chart {
    Single(Series),
    Multi(MultiSeries),
}

/// Share of `part` in `whole` as a percentage; 0 when `whole` is 0.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        round1(part / whole * 100.0)
    } else {
        0.0
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Increment the count for a non-blank `key`.
fn tally(counts: &mut BTreeMap<String, usize>, key: Option<&str>) {
    if let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) {
        *counts.entry(key.to_string()).or_default() += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_guards_zero() {
        assert_eq!(percentage(3.0, 0.0), 0.0);
        assert_eq!(percentage(1.0, 3.0), 33.3);
        assert_eq!(percentage(2.0, 3.0), 66.7);
    }

    #[test]
    fn test_series_from_counts_is_sorted() {
        let mut counts = BTreeMap::new();
        tally(&mut counts, Some("FIE3"));
        tally(&mut counts, Some(" FIE1 "));
        tally(&mut counts, Some("FIE3"));
        tally(&mut counts, Some(""));
        tally(&mut counts, None);

        let series = Series::from_counts(&counts);
        assert_eq!(series.labels, vec!["FIE1", "FIE3"]);
        assert_eq!(series.values, vec![1.0, 2.0]);
        assert_eq!(series.total(), 3.0);
    }
}
