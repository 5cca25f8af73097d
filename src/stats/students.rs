//! Student enrollment statistics.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::{percentage, tally, Chart, Dataset, MultiSeries, Series};
use crate::errors::AppError;
use crate::models::{same_text, Student};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScholarshipStats {
    pub holders: usize,
    pub non_holders: usize,
    pub holder_rate: f64,
    pub non_holder_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LevelCounts {
    pub counts: BTreeMap<String, usize>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenderStats {
    pub male: usize,
    pub female: usize,
    pub male_rate: f64,
    pub female_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct ForeignShare {
    pub total: usize,
    pub foreign: usize,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ForeignStats {
    pub by_level: BTreeMap<String, ForeignShare>,
    pub total_foreign: usize,
    pub overall_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StudentStats {
    pub scholarship: ScholarshipStats,
    pub levels: LevelCounts,
    pub gender: GenderStats,
    pub foreign: ForeignStats,
    /// Enrollment per start year, one dataset per level
    pub evolution: MultiSeries,
    pub years: Vec<String>,
}

pub fn stats(records: &[Student]) -> StudentStats {
    let holders = records.iter().filter(|s| s.is_scholarship_holder()).count();
    let non_holders = records.len() - holders;
    let total = records.len() as f64;

    let gender = gender_stats(records);

    let years: BTreeSet<String> = records
        .iter()
        .filter_map(|s| s.year.as_deref().map(str::trim))
        .filter(|y| !y.is_empty())
        .map(str::to_string)
        .collect();

    StudentStats {
        scholarship: ScholarshipStats {
            holders,
            non_holders,
            holder_rate: percentage(holders as f64, total),
            non_holder_rate: percentage(non_holders as f64, total),
        },
        levels: LevelCounts {
            counts: level_counts(records),
            total: records.len(),
        },
        gender,
        foreign: foreign_stats(records),
        evolution: evolution(records),
        years: years.into_iter().collect(),
    }
}

/// A single chart by name. `year` only applies to the `levels` chart.
pub fn chart(records: &[Student], name: &str, year: Option<&str>) -> Result<Chart, AppError> {
    let chart = match name {
        "scholarship" => {
            let holders = records.iter().filter(|s| s.is_scholarship_holder()).count();
            Chart::Single(Series {
                labels: vec!["Scholarship holders".into(), "Non-holders".into()],
                values: vec![holders as f64, (records.len() - holders) as f64],
            })
        }
        "levels" => {
            let selected: Vec<Student> = records
                .iter()
                .filter(|s| year.map_or(true, |y| same_text(s.year.as_deref(), y)))
                .cloned()
                .collect();
            Chart::Single(Series::from_counts(&level_counts(&selected)))
        }
        "gender" => {
            let gender = gender_stats(records);
            Chart::Single(Series {
                labels: vec!["Male".into(), "Female".into()],
                values: vec![gender.male as f64, gender.female as f64],
            })
        }
        "foreign" => {
            let foreign = foreign_stats(records);
            Chart::Single(Series {
                labels: foreign.by_level.keys().cloned().collect(),
                values: foreign.by_level.values().map(|share| share.rate).collect(),
            })
        }
        "evolution" => Chart::Multi(evolution(records)),
        other => {
            return Err(AppError::BadRequest(format!(
                "Unknown student chart '{}'",
                other
            )))
        }
    };
    Ok(chart)
}

fn level_counts(records: &[Student]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for student in records {
        tally(&mut counts, student.level.as_deref());
    }
    counts
}

fn gender_stats(records: &[Student]) -> GenderStats {
    let (mut male, mut female) = (0, 0);
    for student in records {
        match student.gender.as_deref().map(|g| g.trim().to_lowercase()).as_deref() {
            Some("masculin") => male += 1,
            Some("féminin") => female += 1,
            _ => {}
        }
    }

    let known = (male + female) as f64;
    GenderStats {
        male,
        female,
        male_rate: percentage(male as f64, known),
        female_rate: percentage(female as f64, known),
    }
}

fn foreign_stats(records: &[Student]) -> ForeignStats {
    let mut by_level: BTreeMap<String, ForeignShare> = BTreeMap::new();
    let mut total_foreign = 0;

    for student in records {
        let foreign = student.is_foreign();
        if foreign {
            total_foreign += 1;
        }
        if let Some(level) = student.level.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            let share = by_level.entry(level.to_string()).or_default();
            share.total += 1;
            if foreign {
                share.foreign += 1;
            }
        }
    }

    for share in by_level.values_mut() {
        share.rate = percentage(share.foreign as f64, share.total as f64);
    }

    ForeignStats {
        by_level,
        total_foreign,
        overall_rate: percentage(total_foreign as f64, records.len() as f64),
    }
}

fn evolution(records: &[Student]) -> MultiSeries {
    let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
    let mut years = BTreeSet::new();
    let mut levels = BTreeSet::new();

    for student in records {
        let level = student.level.as_deref().map(str::trim).filter(|l| !l.is_empty());
        if let (Some(year), Some(level)) = (student.start_year(), level) {
            years.insert(year.clone());
            levels.insert(level.to_string());
            *counts.entry((year, level.to_string())).or_default() += 1;
        }
    }

    MultiSeries {
        labels: years.iter().cloned().collect(),
        datasets: levels
            .iter()
            .map(|level| Dataset {
                label: level.clone(),
                data: years
                    .iter()
                    .map(|year| {
                        counts
                            .get(&(year.clone(), level.clone()))
                            .copied()
                            .unwrap_or(0) as f64
                    })
                    .collect(),
            })
            .collect(),
    }
}
