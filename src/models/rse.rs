//! RSE teaching activities and their two upload layouts.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record::{extra_from_row, lenient, require_text, same_text, Entity, RecordMeta};
use crate::errors::AppError;
use crate::ingest::normalize::{format_number, leading_year, ColumnSpec, NormalizedRow};

const STANDARD_COLUMNS: [&str; 7] = [
    "annee",
    "promotion",
    "semestre",
    "type_activite",
    "heures_cm",
    "heures_td",
    "heures_tp",
];

const MAQUETTE_COLUMNS: [&str; 11] = [
    "promotion_semestre",
    "activite",
    "cm_maquette",
    "td_maquette",
    "cm_hors_maquette",
    "td1",
    "td2",
    "td3",
    "td4",
    "td5",
    "total_heures",
];

/// Hours spent on one RSE activity for a promotion and semester.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RseActivity {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "annee", deserialize_with = "lenient::year")]
    pub year: i32,
    #[serde(default, deserialize_with = "lenient::text")]
    pub promotion: String,
    #[serde(default, alias = "semestre", deserialize_with = "lenient::text")]
    pub semester: String,
    #[serde(default, alias = "type_activite", deserialize_with = "lenient::text")]
    pub activity_type: String,
    #[serde(default, alias = "heures_cm", deserialize_with = "lenient::number")]
    pub lecture_hours: f64,
    #[serde(default, alias = "heures_td", deserialize_with = "lenient::number")]
    pub tutorial_hours: f64,
    #[serde(default, alias = "heures_tp", deserialize_with = "lenient::number")]
    pub lab_hours: f64,
    /// Always the sum of the three hour fields
    #[serde(default, alias = "total_heures", deserialize_with = "lenient::number")]
    pub total_hours: f64,
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RseFilter {
    pub year: Option<i32>,
    pub promotion: Option<String>,
    pub semester: Option<String>,
    pub activity_type: Option<String>,
}

impl Entity for RseActivity {
    const COLLECTION: &'static str = "rse";
    const ID_PREFIX: &'static str = "rse";
    const LABEL: &'static str = "RSE activity";
    const FIELDS: &'static [&'static str] = &[
        "year",
        "promotion",
        "semester",
        "activity_type",
        "lecture_hours",
        "tutorial_hours",
        "lab_hours",
        "total_hours",
    ];

    type Filter = RseFilter;

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
            self.year, self.promotion, self.semester, self.activity_type
        ))
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.year <= 0 {
            return Err(AppError::Validation("Field 'year' is required".to_string()));
        }
        require_text(Some(&self.promotion), "promotion")?;
        require_text(Some(&self.semester), "semester")?;
        require_text(Some(&self.activity_type), "activity_type")
    }

    fn finalize(&mut self) {
        self.total_hours = self.lecture_hours + self.tutorial_hours + self.lab_hours;
    }

    fn matches(&self, filter: &RseFilter) -> bool {
        filter.year.map_or(true, |y| self.year == y)
            && filter
                .promotion
                .as_deref()
                .map_or(true, |p| same_text(Some(&self.promotion), p))
            && filter
                .semester
                .as_deref()
                .map_or(true, |s| same_text(Some(&self.semester), s))
            && filter
                .activity_type
                .as_deref()
                .map_or(true, |t| same_text(Some(&self.activity_type), t))
    }

    fn sort(records: &mut [Self]) {
        records.sort_by(|a, b| b.year.cmp(&a.year));
    }
}

/// The two spreadsheet layouts accepted for RSE uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RseLayout {
    /// Curriculum export with per-group tutorial columns
    Maquette,
    /// One row per activity with explicit hour columns
    Standard,
}

impl RseLayout {
    pub fn columns(&self) -> ColumnSpec {
        match self {
            RseLayout::Maquette => ColumnSpec::new()
                .required(&MAQUETTE_COLUMNS)
                .numeric(&MAQUETTE_COLUMNS[2..]),
            RseLayout::Standard => ColumnSpec::new()
                .required(&STANDARD_COLUMNS)
                .numeric(&STANDARD_COLUMNS[4..]),
        }
    }

    fn mapped_columns(&self) -> &'static [&'static str] {
        match self {
            RseLayout::Maquette => &MAQUETTE_COLUMNS,
            RseLayout::Standard => &STANDARD_COLUMNS,
        }
    }

    /// Map one normalized row; a standard row whose `annee` has no leading
    /// four-digit year is rejected with its line number.
    pub fn record_from_row(&self, row: &NormalizedRow) -> Result<RseActivity, AppError> {
        let mut record = match self {
            RseLayout::Maquette => maquette_record(row),
            RseLayout::Standard => RseActivity {
                year: standard_year(row)?,
                promotion: row.text("promotion").unwrap_or_default(),
                semester: row.text("semestre").unwrap_or_default(),
                activity_type: row.text("type_activite").unwrap_or_default(),
                lecture_hours: row.number("heures_cm"),
                tutorial_hours: row.number("heures_td"),
                lab_hours: row.number("heures_tp"),
                ..Default::default()
            },
        };
        record
            .extra
            .extend(extra_from_row::<RseActivity>(row, self.mapped_columns()));
        record.finalize();
        Ok(record)
    }
}

fn standard_year(row: &NormalizedRow) -> Result<i32, AppError> {
    let raw = row.text("annee").unwrap_or_default();
    leading_year(&raw).ok_or_else(|| {
        AppError::Validation(format!("Line {}: invalid year '{}'", row.line, raw))
    })
}

fn maquette_record(row: &NormalizedRow) -> RseActivity {
    let promotion_semester = row.text("promotion_semestre").unwrap_or_default();
    let (promotion, semester) = match promotion_semester.split_once('-') {
        Some((p, s)) if !s.trim().is_empty() => (p.trim().to_string(), s.trim().to_string()),
        Some((p, _)) => (p.trim().to_string(), "S1".to_string()),
        None => (promotion_semester.trim().to_string(), "S1".to_string()),
    };

    let lecture = row.number("cm_maquette") + row.number("cm_hors_maquette");
    let tutorial = row.number("td_maquette") + row.number("td1") + row.number("td2");
    let lab = row.number("td3") + row.number("td4") + row.number("td5");

    let mut extra = Map::new();
    let declared = row.number("total_heures");
    if declared != 0.0 && (declared - (lecture + tutorial + lab)).abs() > f64::EPSILON {
        extra.insert(
            "declared_total_hours".to_string(),
            Value::String(format_number(declared)),
        );
    }

    RseActivity {
        year: Utc::now().year(),
        promotion,
        semester,
        activity_type: row.text("activite").unwrap_or_default(),
        lecture_hours: lecture,
        tutorial_hours: tutorial,
        lab_hours: lab,
        extra,
        ..Default::default()
    }
}
