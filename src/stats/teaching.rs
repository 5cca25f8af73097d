//! Teaching hours summary and graph data.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::{Dataset, MultiSeries, Series};
use crate::models::{HourMeasures, HoursMatrix, SessionKind, TeachingFilter, TeachingUnitRecord};

const ALL: &str = "All";

/// Filters echoed back with a summary.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppliedFilters {
    pub academic_year: String,
    pub level: String,
    pub semester: String,
    pub instructor: String,
}

impl AppliedFilters {
    fn from_filter(filter: &TeachingFilter) -> Self {
        let academic_year = match (filter.start_year, filter.end_year) {
            (Some(start), Some(end)) => format!("{}-{}", start, end),
            (Some(start), None) => format!("{}-", start),
            (None, Some(end)) => format!("-{}", end),
            (None, None) => ALL.to_string(),
        };
        let or_all = |v: &Option<String>| v.clone().unwrap_or_else(|| ALL.to_string());

        Self {
            academic_year,
            level: or_all(&filter.level),
            semester: or_all(&filter.semester),
            instructor: or_all(&filter.instructor),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TeachingSummary {
    pub unit_count: usize,
    pub subject_count: usize,
    pub instructor_count: usize,
    pub totals: HoursMatrix,
    pub grand_total: HourMeasures,
    pub filters: AppliedFilters,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TeachingGraphData {
    /// Planned hours by session kind
    pub pie: Series,
    /// Planned hours per academic year
    pub by_year: MultiSeries,
    pub by_level: MultiSeries,
    pub by_semester: MultiSeries,
}

pub fn summary(records: &[TeachingUnitRecord], filter: &TeachingFilter) -> TeachingSummary {
    let mut totals = HoursMatrix::default();
    let mut subject_count = 0;
    let mut instructors = BTreeSet::new();

    for record in records {
        for subject in &record.unit.subjects {
            subject_count += 1;
            totals += subject.hours;
            let instructor = subject.instructor.trim();
            if !instructor.is_empty() {
                instructors.insert(instructor.to_string());
            }
        }
    }

    TeachingSummary {
        unit_count: records.len(),
        subject_count,
        instructor_count: instructors.len(),
        totals: totals.rounded(),
        grand_total: totals.total().rounded(),
        filters: AppliedFilters::from_filter(filter),
    }
}

pub fn graph_data(records: &[TeachingUnitRecord]) -> TeachingGraphData {
    let mut overall = HoursMatrix::default();
    let mut by_year: BTreeMap<String, HoursMatrix> = BTreeMap::new();
    let mut by_level: BTreeMap<String, HoursMatrix> = BTreeMap::new();
    let mut by_semester: BTreeMap<String, HoursMatrix> = BTreeMap::new();

    for record in records {
        let mut unit_hours = HoursMatrix::default();
        for subject in &record.unit.subjects {
            unit_hours += subject.hours;
        }

        overall += unit_hours;
        *by_year.entry(record.academic_year.clone()).or_default() += unit_hours;
        *by_level.entry(record.level.clone()).or_default() += unit_hours;
        *by_semester.entry(record.semester.clone()).or_default() += unit_hours;
    }

    TeachingGraphData {
        pie: Series {
            labels: SessionKind::ALL.iter().map(|k| k.label().to_string()).collect(),
            values: SessionKind::ALL
                .iter()
                .map(|&k| super::round2(overall.get(k).planned))
                .collect(),
        },
        by_year: planned_by_kind(&by_year),
        by_level: planned_by_kind(&by_level),
        by_semester: planned_by_kind(&by_semester),
    }
}

/// One dataset per session kind, over the sorted group labels.
fn planned_by_kind(groups: &BTreeMap<String, HoursMatrix>) -> MultiSeries {
    MultiSeries {
        labels: groups.keys().cloned().collect(),
        datasets: SessionKind::ALL
            .iter()
            .map(|&kind| Dataset {
                label: kind.label().to_string(),
                data: groups
                    .values()
                    .map(|hours| super::round2(hours.get(kind).planned))
                    .collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, Subject, TeachingUnit};

    fn hours(lecture: f64, tutorial: f64, lab: f64) -> HoursMatrix {
        HoursMatrix {
            lecture: HourMeasures {
                planned: lecture,
                actual: lecture / 2.0,
                remaining: lecture / 2.0,
            },
            tutorial: HourMeasures {
                planned: tutorial,
                ..Default::default()
            },
            lab: HourMeasures {
                planned: lab,
                ..Default::default()
            },
        }
    }

    fn record(year: (i32, i32), level: &str, semester: &str, subjects: Vec<(&str, HoursMatrix)>) -> TeachingUnitRecord {
        let mut record = TeachingUnitRecord {
            start_year: year.0,
            end_year: year.1,
            level: level.into(),
            semester: semester.into(),
            unit: TeachingUnit {
                code: "UE1".into(),
                name: "Unit".into(),
                subjects: subjects
                    .into_iter()
                    .map(|(instructor, hours)| Subject {
                        name: "Subject".into(),
                        ects: 0.0,
                        instructor: instructor.into(),
                        hours,
                    })
                    .collect(),
            },
            ..Default::default()
        };
        record.finalize();
        record
    }

    fn sample() -> Vec<TeachingUnitRecord> {
        vec![
            record((2023, 2024), "FIE3", "S1", vec![("Dupont", hours(10.0, 4.0, 2.0)), ("", hours(1.5, 0.0, 0.0))]),
            record((2023, 2024), "FIE1", "S2", vec![("Martin", hours(6.0, 6.0, 6.0))]),
            record((2024, 2025), "FIE3", "S1", vec![("Dupont", hours(8.0, 0.0, 3.25))]),
        ]
    }

    #[test]
    fn test_summary_counts_and_totals() {
        let stats = summary(&sample(), &TeachingFilter::default());

        assert_eq!(stats.unit_count, 3);
        assert_eq!(stats.subject_count, 4);
        assert_eq!(stats.instructor_count, 2);
        assert_eq!(stats.totals.lecture.planned, 25.5);
        assert_eq!(stats.totals.lab.planned, 11.25);
        assert_eq!(stats.grand_total.planned, 25.5 + 10.0 + 11.25);
        assert_eq!(stats.filters.academic_year, "All");
    }

    #[test]
    fn test_totals_additive_over_disjoint_filters() {
        let records = sample();
        let all = summary(&records, &TeachingFilter::default());

        let parts: Vec<TeachingSummary> = ["FIE1", "FIE3"]
            .iter()
            .map(|level| {
                let filter = TeachingFilter {
                    level: Some(level.to_string()),
                    ..Default::default()
                };
                let subset: Vec<_> = records.iter().filter(|r| r.matches(&filter)).cloned().collect();
                summary(&subset, &filter)
            })
            .collect();

        let planned: f64 = parts.iter().map(|p| p.grand_total.planned).sum();
        assert_eq!(planned, all.grand_total.planned);
        let units: usize = parts.iter().map(|p| p.unit_count).sum();
        assert_eq!(units, all.unit_count);
        for part in &parts {
            assert!(part.grand_total.planned <= all.grand_total.planned);
        }
    }

    #[test]
    fn test_graph_data_series() {
        let graph = graph_data(&sample());

        assert_eq!(graph.pie.labels, vec!["CM", "TD", "TP"]);
        assert_eq!(graph.pie.values, vec![25.5, 10.0, 11.25]);

        assert_eq!(graph.by_year.labels, vec!["2023-2024", "2024-2025"]);
        assert_eq!(graph.by_year.datasets[0].label, "CM");
        assert_eq!(graph.by_year.datasets[0].data, vec![17.5, 8.0]);

        assert_eq!(graph.by_level.labels, vec!["FIE1", "FIE3"]);
        assert_eq!(graph.by_semester.labels, vec!["S1", "S2"]);
        assert_eq!(graph.by_semester.datasets[2].data, vec![5.25, 6.0]);
    }

    #[test]
    fn test_empty_input() {
        let graph = graph_data(&[]);
        assert_eq!(graph.pie.values, vec![0.0, 0.0, 0.0]);
        assert!(graph.by_year.labels.is_empty());

        let stats = summary(&[], &TeachingFilter::default());
        assert_eq!(stats.unit_count, 0);
        assert_eq!(stats.grand_total, HourMeasures::default());
    }
}
