//! ARION session statistics.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;
use serde::Serialize;

use super::{round1, tally, Series};
use crate::models::ArionSession;

const UNSPECIFIED: &str = "Unspecified";
const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ArionSummary {
    pub activity_count: usize,
    pub total_duration: f64,
    pub trainer_count: usize,
    pub level_count: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct YearShare {
    pub count: usize,
    pub duration: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ArionCharts {
    /// Session count per year
    pub years: Series,
    /// Session count for the last 12 months present in the data
    pub monthly: Series,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ArionStats {
    pub summary: ArionSummary,
    pub by_year: BTreeMap<String, YearShare>,
    pub charts: ArionCharts,
}

pub fn stats(records: &[ArionSession]) -> ArionStats {
    let mut trainers = BTreeSet::new();
    let mut levels = BTreeSet::new();
    let mut by_year: BTreeMap<String, YearShare> = BTreeMap::new();
    let mut by_month: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_duration = 0.0;

    for session in records {
        total_duration += session.duration;
        if let Some(trainer) = non_blank(session.trainer.as_deref()) {
            trainers.insert(trainer.to_string());
        }
        if let Some(level) = non_blank(session.level.as_deref()) {
            levels.insert(level.to_string());
        }
        if let Some(year) = non_blank(session.year.as_deref()) {
            let share = by_year.entry(year.to_string()).or_default();
            share.count += 1;
            share.duration += session.duration;
        }
        if let Some(date) = session.parsed_date() {
            *by_month.entry(date.format("%Y-%m").to_string()).or_default() += 1;
        }
    }

    for share in by_year.values_mut() {
        share.duration = round1(share.duration);
    }

    let skip = by_month.len().saturating_sub(12);
    let last_months: BTreeMap<String, usize> = by_month.into_iter().skip(skip).collect();

    let years = Series {
        labels: by_year.keys().cloned().collect(),
        values: by_year.values().map(|s| s.count as f64).collect(),
    };

    ArionStats {
        summary: ArionSummary {
            activity_count: records.len(),
            total_duration: round1(total_duration),
            trainer_count: trainers.len(),
            level_count: levels.len(),
        },
        by_year,
        charts: ArionCharts {
            years,
            monthly: Series::from_counts(&last_months),
        },
    }
}

/// Session count per status; a missing status counts as `Unspecified`.
pub fn status_counts(records: &[ArionSession]) -> Series {
    let mut counts = BTreeMap::new();
    for session in records {
        tally(
            &mut counts,
            Some(non_blank(session.status.as_deref()).unwrap_or(UNSPECIFIED)),
        );
    }
    Series::from_counts(&counts)
}

/// Sessions per calendar month, January to December.
///
/// With `year`, only sessions whose year or date starts with it are counted.
pub fn monthly(records: &[ArionSession], year: Option<&str>) -> Series {
    let mut counts = [0usize; 12];
    let year = year.map(str::trim).filter(|y| !y.is_empty());

    for session in records {
        if let Some(year) = year {
            let in_year = [session.year.as_deref(), session.date.as_deref()]
                .into_iter()
                .flatten()
                .any(|v| v.trim().starts_with(year))
                || session
                    .parsed_date()
                    .is_some_and(|d| d.year().to_string() == year);
            if !in_year {
                continue;
            }
        }
        if let Some(date) = session.parsed_date() {
            counts[date.month0() as usize] += 1;
        }
    }

    Series {
        labels: MONTH_LABELS.iter().map(|m| m.to_string()).collect(),
        values: counts.iter().map(|&n| n as f64).collect(),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
