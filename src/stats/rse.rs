//! RSE hours by promotion, activity type and year.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{percentage, round2, Chart, Series};
use crate::errors::AppError;
use crate::models::RseActivity;

/// Hours and activity count for one group of RSE activities.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct RseBreakdown {
    pub total_hours: f64,
    pub lecture_hours: f64,
    pub tutorial_hours: f64,
    pub lab_hours: f64,
    pub activity_count: usize,
}

impl RseBreakdown {
    fn add(&mut self, record: &RseActivity) {
        self.lecture_hours += record.lecture_hours;
        self.tutorial_hours += record.tutorial_hours;
        self.lab_hours += record.lab_hours;
        self.total_hours += record.lecture_hours + record.tutorial_hours + record.lab_hours;
        self.activity_count += 1;
    }

    fn rounded(mut self) -> Self {
        self.total_hours = round2(self.total_hours);
        self.lecture_hours = round2(self.lecture_hours);
        self.tutorial_hours = round2(self.tutorial_hours);
        self.lab_hours = round2(self.lab_hours);
        self
    }
}

/// Percentage of total hours per session kind.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct CourseFormatShare {
    pub lecture: f64,
    pub tutorial: f64,
    pub lab: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RseCharts {
    pub promotions: Series,
    pub evolution: Series,
    pub activity_types: Series,
    pub course_format: Series,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RseStats {
    pub total_hours: f64,
    pub lecture_hours: f64,
    pub tutorial_hours: f64,
    pub lab_hours: f64,
    pub activity_count: usize,
    pub promotion_count: usize,
    pub by_promotion: BTreeMap<String, RseBreakdown>,
    pub by_activity_type: BTreeMap<String, RseBreakdown>,
    pub by_year: BTreeMap<String, RseBreakdown>,
    pub years: Vec<i32>,
    pub promotions: Vec<String>,
    pub course_format_percentages: CourseFormatShare,
    pub charts: RseCharts,
}

pub fn stats(records: &[RseActivity]) -> RseStats {
    let mut overall = RseBreakdown::default();
    let mut by_promotion: BTreeMap<String, RseBreakdown> = BTreeMap::new();
    let mut by_activity_type: BTreeMap<String, RseBreakdown> = BTreeMap::new();
    let mut by_year: BTreeMap<i32, RseBreakdown> = BTreeMap::new();

    for record in records {
        overall.add(record);
        by_promotion.entry(record.promotion.clone()).or_default().add(record);
        by_activity_type
            .entry(record.activity_type.clone())
            .or_default()
            .add(record);
        by_year.entry(record.year).or_default().add(record);
    }

    let by_year: BTreeMap<String, RseBreakdown> = by_year
        .iter()
        .map(|(year, b)| (year.to_string(), *b))
        .collect();

    let charts = RseCharts {
        promotions: totals_series(&by_promotion),
        evolution: totals_series(&by_year),
        activity_types: totals_series(&by_activity_type),
        course_format: course_format_series(&overall),
    };

    let total = overall.total_hours;
    let course_format_percentages = CourseFormatShare {
        lecture: percentage(overall.lecture_hours, total),
        tutorial: percentage(overall.tutorial_hours, total),
        lab: percentage(overall.lab_hours, total),
    };

    let overall = overall.rounded();
    let round_all = |groups: BTreeMap<String, RseBreakdown>| -> BTreeMap<String, RseBreakdown> {
        groups.into_iter().map(|(k, b)| (k, b.rounded())).collect()
    };

    RseStats {
        total_hours: overall.total_hours,
        lecture_hours: overall.lecture_hours,
        tutorial_hours: overall.tutorial_hours,
        lab_hours: overall.lab_hours,
        activity_count: overall.activity_count,
        promotion_count: by_promotion.len(),
        promotions: by_promotion.keys().cloned().collect(),
        years: by_year.keys().filter_map(|y| y.parse().ok()).collect(),
        by_promotion: round_all(by_promotion),
        by_activity_type: round_all(by_activity_type),
        by_year: round_all(by_year),
        course_format_percentages,
        charts,
    }
}

/// A single chart by name: promotions, evolution, activity_types or course_format.
pub fn chart(records: &[RseActivity], name: &str) -> Result<Chart, AppError> {
    let charts = stats(records).charts;
    let series = match name {
        "promotions" => charts.promotions,
        "evolution" => charts.evolution,
        "activity_types" => charts.activity_types,
        "course_format" => charts.course_format,
        other => {
            return Err(AppError::BadRequest(format!(
                "Unknown RSE chart '{}'",
                other
            )))
        }
    };
    Ok(Chart::Single(series))
}

fn totals_series(groups: &BTreeMap<String, RseBreakdown>) -> Series {
    let totals: BTreeMap<String, f64> = groups
        .iter()
        .map(|(k, b)| (k.clone(), b.total_hours))
        .collect();
    Series::from_totals(&totals)
}

fn course_format_series(overall: &RseBreakdown) -> Series {
    Series {
        labels: vec!["CM".into(), "TD".into(), "TP".into()],
        values: vec![
            round2(overall.lecture_hours),
            round2(overall.tutorial_hours),
            round2(overall.lab_hours),
        ],
    }
}
