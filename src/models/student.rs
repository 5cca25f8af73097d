//! Student enrollment records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record::{extra_from_row, lenient, require_text, same_text, Entity, RecordMeta};
use crate::errors::AppError;
use crate::ingest::normalize::{ColumnSpec, NormalizedRow};

const COL_LAST_NAME: &str = "Nom";
const COL_FIRST_NAME: &str = "Prénom";
const COL_GENDER: &str = "Genre";
const COL_LEVEL: &str = "niveau";
const COL_YEAR: &str = "annee";
const COL_SCHOLARSHIP: &str = "Boursier(ère)";
const COL_FOREIGN: &str = "Etranger(ère)";
const COL_NATIONALITY: &str = "Nationalité";

const MAPPED_COLUMNS: [&str; 8] = [
    COL_LAST_NAME,
    COL_FIRST_NAME,
    COL_GENDER,
    COL_LEVEL,
    COL_YEAR,
    COL_SCHOLARSHIP,
    COL_FOREIGN,
    COL_NATIONALITY,
];

/// An enrolled student. Unmodeled columns are kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Student {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "Nom", deserialize_with = "lenient::opt_text")]
    pub last_name: Option<String>,
    #[serde(default, alias = "Prénom", deserialize_with = "lenient::opt_text")]
    pub first_name: Option<String>,
    #[serde(default, alias = "Genre", deserialize_with = "lenient::opt_text")]
    pub gender: Option<String>,
    #[serde(default, alias = "niveau", deserialize_with = "lenient::opt_text")]
    pub level: Option<String>,
    /// Academic year such as `2023-2024`
    #[serde(default, alias = "annee", deserialize_with = "lenient::opt_text")]
    pub year: Option<String>,
    #[serde(default, alias = "Boursier(ère)", deserialize_with = "lenient::opt_text")]
    pub scholarship: Option<String>,
    #[serde(default, alias = "Etranger(ère)", deserialize_with = "lenient::opt_text")]
    pub foreign: Option<String>,
    #[serde(default, alias = "Nationalité", deserialize_with = "lenient::opt_text")]
    pub nationality: Option<String>,
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentFilter {
    pub year: Option<String>,
    pub level: Option<String>,
}

impl Entity for Student {
    const COLLECTION: &'static str = "students";
    const ID_PREFIX: &'static str = "student";
    const LABEL: &'static str = "Student";
    const FIELDS: &'static [&'static str] = &[
        "last_name",
        "first_name",
        "gender",
        "level",
        "year",
        "scholarship",
        "foreign",
        "nationality",
    ];

    type Filter = StudentFilter;

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
        let last = self.last_name.as_deref()?;
        let first = self.first_name.as_deref()?;
        Some(
            format!(
                "{}|{}|{}|{}",
                self.year.as_deref().unwrap_or_default(),
                self.level.as_deref().unwrap_or_default(),
                last,
                first
            )
            .to_lowercase(),
        )
    }

    fn validate(&self) -> Result<(), AppError> {
        require_text(self.last_name.as_deref(), "last_name")?;
        require_text(self.first_name.as_deref(), "first_name")?;
        require_text(self.gender.as_deref(), "gender")?;
        require_text(self.level.as_deref(), "level")?;
        require_text(self.year.as_deref(), "year")
    }

    fn matches(&self, filter: &StudentFilter) -> bool {
        filter
            .year
            .as_deref()
            .map_or(true, |y| same_text(self.year.as_deref(), y))
            && filter
                .level
                .as_deref()
                .map_or(true, |l| same_text(self.level.as_deref(), l))
    }
}

impl Student {
    pub fn columns() -> ColumnSpec {
        ColumnSpec::new().required(&[COL_LAST_NAME, COL_FIRST_NAME, COL_LEVEL, COL_YEAR])
    }

    pub fn from_row(row: &NormalizedRow) -> Self {
        Self {
            last_name: row.text(COL_LAST_NAME),
            first_name: row.text(COL_FIRST_NAME),
            gender: row.text(COL_GENDER),
            level: row.text(COL_LEVEL),
            year: row.text(COL_YEAR),
            scholarship: row.text(COL_SCHOLARSHIP),
            foreign: row.text(COL_FOREIGN),
            nationality: row.text(COL_NATIONALITY),
            extra: extra_from_row::<Student>(row, &MAPPED_COLUMNS),
            ..Default::default()
        }
    }

    /// First year of the academic year (`2023` for `2023-2024`).
    pub fn start_year(&self) -> Option<String> {
        let year = self.year.as_deref()?.trim();
        let start = year.split('-').next().unwrap_or(year).trim();
        (!start.is_empty()).then(|| start.to_string())
    }

    pub fn is_scholarship_holder(&self) -> bool {
        is_yes(self.scholarship.as_deref())
    }

    /// Explicit flag when present, otherwise any nationality other than French.
    pub fn is_foreign(&self) -> bool {
        match self.foreign.as_deref().map(str::trim) {
            Some(flag) if !flag.is_empty() => is_yes(Some(flag)),
            _ => self
                .nationality
                .as_deref()
                .map(str::trim)
                .is_some_and(|n| !n.is_empty() && !n.eq_ignore_ascii_case("française")),
        }
    }
}

fn is_yes(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_lowercase().as_str(),
            "oui" | "yes" | "o" | "y" | "1" | "true" | "vrai"
        )
    })
}
