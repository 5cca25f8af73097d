//! Teaching hours: units (UE) with their subjects and a 3×3 hours matrix.

use std::ops::AddAssign;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::record::{lenient, require_text, same_text, Entity, RecordMeta};
use crate::errors::AppError;
use crate::ingest::group::ParentGroup;
use crate::ingest::normalize::{Cell, ColumnSpec, NormalizedRow};
use crate::ingest::reader::BatchMetadata;

/// Levels offered by the school, listed even before any upload mentions them.
pub const LEVEL_CATALOGUE: [&str; 7] = ["FIE1", "FIE2", "FIE3", "FIE4", "FIE5", "FIA3", "FIA5"];

/// Label for a unit or subject uploaded with a blank `nom_matiere`.
pub const UNNAMED: &str = "Sans nom";

/// Session categories: lecture (CM), tutorial (TD), lab (TP).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Lecture,
    Tutorial,
    Lab,
}

impl SessionKind {
    pub const ALL: [SessionKind; 3] = [SessionKind::Lecture, SessionKind::Tutorial, SessionKind::Lab];

    pub fn label(&self) -> &'static str {
        match self {
            SessionKind::Lecture => "CM",
            SessionKind::Tutorial => "TD",
            SessionKind::Lab => "TP",
        }
    }

    fn column_prefix(&self) -> &'static str {
        match self {
            SessionKind::Lecture => "cm",
            SessionKind::Tutorial => "td",
            SessionKind::Lab => "tp",
        }
    }
}

/// Planned, actual and remaining hours for one session kind.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct HourMeasures {
    #[serde(default, deserialize_with = "lenient::number")]
    pub planned: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub actual: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub remaining: f64,
}

impl HourMeasures {
    pub fn rounded(&self) -> Self {
        Self {
            planned: round2(self.planned),
            actual: round2(self.actual),
            remaining: round2(self.remaining),
        }
    }
}

impl AddAssign for HourMeasures {
    fn add_assign(&mut self, other: Self) {
        self.planned += other.planned;
        self.actual += other.actual;
        self.remaining += other.remaining;
    }
}

/// Hours by session kind × measure.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct HoursMatrix {
    #[serde(default)]
    pub lecture: HourMeasures,
    #[serde(default)]
    pub tutorial: HourMeasures,
    #[serde(default)]
    pub lab: HourMeasures,
}

impl HoursMatrix {
    pub fn get(&self, kind: SessionKind) -> &HourMeasures {
        match kind {
            SessionKind::Lecture => &self.lecture,
            SessionKind::Tutorial => &self.tutorial,
            SessionKind::Lab => &self.lab,
        }
    }

    fn get_mut(&mut self, kind: SessionKind) -> &mut HourMeasures {
        match kind {
            SessionKind::Lecture => &mut self.lecture,
            SessionKind::Tutorial => &mut self.tutorial,
            SessionKind::Lab => &mut self.lab,
        }
    }

    /// Sum over session kinds.
    pub fn total(&self) -> HourMeasures {
        let mut total = self.lecture;
        total += self.tutorial;
        total += self.lab;
        total
    }

    pub fn rounded(&self) -> Self {
        Self {
            lecture: self.lecture.rounded(),
            tutorial: self.tutorial.rounded(),
            lab: self.lab.rounded(),
        }
    }
}

impl AddAssign for HoursMatrix {
    fn add_assign(&mut self, other: Self) {
        self.lecture += other.lecture;
        self.tutorial += other.tutorial;
        self.lab += other.lab;
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A subject (matière) taught inside a unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Subject {
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub ects: f64,
    #[serde(default, deserialize_with = "lenient::text")]
    pub instructor: String,
    #[serde(default)]
    pub hours: HoursMatrix,
}

/// A teaching unit (UE) and its subjects.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TeachingUnit {
    #[serde(default, deserialize_with = "lenient::text")]
    pub code: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

/// One unit as taught for a given year, level and semester.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TeachingUnitRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub academic_year: String,
    #[serde(default, deserialize_with = "lenient::year")]
    pub start_year: i32,
    #[serde(default, deserialize_with = "lenient::year")]
    pub end_year: i32,
    #[serde(default, deserialize_with = "lenient::text")]
    pub level: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub semester: String,
    #[serde(default)]
    pub unit: TeachingUnit,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

/// List filters for teaching hours.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeachingFilter {
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub level: Option<String>,
    pub semester: Option<String>,
    pub instructor: Option<String>,
}

impl Entity for TeachingUnitRecord {
    const COLLECTION: &'static str = "teaching_hours";
    const ID_PREFIX: &'static str = "ue";
    const LABEL: &'static str = "Teaching unit";
    const FIELDS: &'static [&'static str] = &[
        "academic_year",
        "start_year",
        "end_year",
        "level",
        "semester",
        "unit",
    ];

    type Filter = TeachingFilter;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn natural_key(&self) -> Option<String> {
        Some(format!(
            "{}|{}|{}|{}",
            self.academic_year, self.level, self.semester, self.unit.code
        ))
    }

    fn disambiguate(&mut self, suffix: &str) {
        self.unit.code = format!("{}_{}", self.unit.code, suffix);
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.start_year <= 0 || self.end_year <= self.start_year {
            return Err(AppError::Validation(
                "start_year and end_year must form an academic year such as 2024-2025".to_string(),
            ));
        }
        require_text(Some(&self.level), "level")?;
        require_text(Some(&self.semester), "semester")?;
        require_text(Some(&self.unit.code), "unit.code")?;
        require_text(Some(&self.unit.name), "unit.name")
    }

    fn finalize(&mut self) {
        self.level = self.level.trim().to_uppercase();
        self.semester = self.semester.trim().to_uppercase();
        if self.start_year > 0 && self.end_year > 0 {
            self.academic_year = format!("{}-{}", self.start_year, self.end_year);
        }
    }

    fn matches(&self, filter: &TeachingFilter) -> bool {
        let year_ok = match (filter.start_year, filter.end_year) {
            (Some(start), Some(end)) => self.start_year == start && self.end_year == end,
            (Some(start), None) => self.start_year == start,
            (None, Some(end)) => self.end_year == end,
            (None, None) => true,
        };

        year_ok
            && filter
                .level
                .as_deref()
                .map_or(true, |l| same_text(Some(&self.level), l))
            && filter
                .semester
                .as_deref()
                .map_or(true, |s| same_text(Some(&self.semester), s))
            && filter.instructor.as_deref().map_or(true, |i| {
                self.unit
                    .subjects
                    .iter()
                    .any(|s| same_text(Some(&s.instructor), i))
            })
    }
}

/// Academic year containing `today`; a new year starts in September.
pub fn current_academic_year(today: NaiveDate) -> (i32, i32) {
    if today.month() >= 9 {
        (today.year(), today.year() + 1)
    } else {
        (today.year() - 1, today.year())
    }
}

/// Columns of a teaching-hours upload; level and semester default to the
/// values detected for the batch.
pub fn teaching_columns(metadata: &BatchMetadata) -> ColumnSpec {
    let mut numeric = Vec::new();
    for kind in SessionKind::ALL {
        for measure in ["hm", "hp", "hr"] {
            numeric.push(format!("{}_{}", kind.column_prefix(), measure));
        }
    }
    let numeric_refs: Vec<&str> = numeric.iter().map(String::as_str).collect();

    let mut spec = ColumnSpec::new()
        .required(&["code_ue", "nom_matiere"])
        .optional(
            "niveau",
            Cell::text(metadata.level.as_deref().unwrap_or("FIE1")),
        )
        .optional(
            "semestre",
            Cell::text(metadata.semester.as_deref().unwrap_or("S1")),
        )
        .optional("intervenant", Cell::text(""))
        .optional("ects", Cell::Number(0.0))
        .numeric(&numeric_refs)
        .numeric(&["ects"]);
    for column in &numeric {
        spec = spec.optional(column, Cell::Number(0.0));
    }
    spec
}

fn subject_from_row(row: &NormalizedRow, unit_name: &str) -> Subject {
    let mut name = row
        .text("nom_matiere")
        .unwrap_or_else(|| UNNAMED.to_string());
    if name == unit_name {
        name = format!("{} (cours)", name);
    }

    let mut hours = HoursMatrix::default();
    for kind in SessionKind::ALL {
        let prefix = kind.column_prefix();
        *hours.get_mut(kind) = HourMeasures {
            planned: row.number(&format!("{}_hm", prefix)),
            actual: row.number(&format!("{}_hp", prefix)),
            remaining: row.number(&format!("{}_hr", prefix)),
        };
    }

    Subject {
        name,
        ects: row.number("ects"),
        instructor: row.text("intervenant").unwrap_or_default(),
        hours,
    }
}

impl TeachingUnitRecord {
    /// Build a record from a grouped unit. The unit takes its name from the
    /// row that carried the code.
    pub fn from_group(group: &ParentGroup<'_>, academic_year: (i32, i32)) -> Self {
        let unit_name = group
            .parent
            .text("nom_matiere")
            .unwrap_or_else(|| UNNAMED.to_string());
        let (level, semester) = match group.scope.as_slice() {
            [level, semester, ..] => (level.clone(), semester.clone()),
            _ => (String::new(), String::new()),
        };

        let mut record = Self {
            start_year: academic_year.0,
            end_year: academic_year.1,
            level,
            semester,
            unit: TeachingUnit {
                code: group.marker.clone(),
                subjects: group
                    .children
                    .iter()
                    .map(|row| subject_from_row(row, &unit_name))
                    .collect(),
                name: unit_name,
            },
            ..Default::default()
        };
        record.finalize();
        record
    }
}

/// Body of a scoped teaching-hours deletion.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TeachingScope {
    pub academic_year: String,
    pub level: String,
    pub semester: String,
    pub code: Option<String>,
}

impl TeachingScope {
    pub fn contains(&self, record: &TeachingUnitRecord) -> bool {
        record.academic_year == self.academic_year.trim()
            && same_text(Some(&record.level), &self.level)
            && same_text(Some(&record.semester), &self.semester)
            && self
                .code
                .as_deref()
                .map_or(true, |code| record.unit.code == code)
    }
}
