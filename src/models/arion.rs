//! ARION training sessions run by external trainers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record::{extra_from_row, lenient, require_text, same_text, Entity, RecordMeta};
use crate::errors::AppError;
use crate::ingest::normalize::{Cell, ColumnSpec, NormalizedRow};

const REQUIRED_COLUMNS: [&str; 6] = ["activite", "groupe", "code_y", "niveau", "date", "duree"];
const OPTIONAL_COLUMNS: [&str; 5] = ["annee", "formateur", "statut", "lieu", "intervenant"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArionSession {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "annee", deserialize_with = "lenient::opt_text")]
    pub year: Option<String>,
    #[serde(default, alias = "formateur", deserialize_with = "lenient::opt_text")]
    pub trainer: Option<String>,
    #[serde(default, alias = "statut", deserialize_with = "lenient::opt_text")]
    pub status: Option<String>,
    #[serde(default, alias = "groupe", deserialize_with = "lenient::opt_text")]
    pub group: Option<String>,
    #[serde(default, alias = "activite", deserialize_with = "lenient::opt_text")]
    pub activity: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub code_y: Option<String>,
    #[serde(default, alias = "niveau", deserialize_with = "lenient::opt_text")]
    pub level: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub date: Option<String>,
    /// Duration in hours
    #[serde(default, alias = "duree", deserialize_with = "lenient::number")]
    pub duration: f64,
    #[serde(default, alias = "lieu", deserialize_with = "lenient::opt_text")]
    pub location: Option<String>,
    #[serde(default, alias = "intervenant", deserialize_with = "lenient::opt_text")]
    pub speaker: Option<String>,
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArionFilter {
    pub year: Option<String>,
    /// Case-insensitive substring of the trainer name
    pub trainer: Option<String>,
    pub status: Option<String>,
}

impl Entity for ArionSession {
    const COLLECTION: &'static str = "arion";
    const ID_PREFIX: &'static str = "arion";
    const LABEL: &'static str = "ARION session";
    const FIELDS: &'static [&'static str] = &[
        "year", "trainer", "status", "group", "activity", "code_y", "level", "date",
        "duration", "location", "speaker",
    ];

    type Filter = ArionFilter;

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

    fn validate(&self) -> Result<(), AppError> {
        require_text(self.year.as_deref(), "year")?;
        require_text(self.trainer.as_deref(), "trainer")?;
        require_text(self.status.as_deref(), "status")?;
        require_text(self.group.as_deref(), "group")?;
        require_text(self.activity.as_deref(), "activity")?;
        require_text(self.code_y.as_deref(), "code_y")?;
        require_text(self.level.as_deref(), "level")?;
        require_text(self.date.as_deref(), "date")?;
        if self.duration <= 0.0 {
            return Err(AppError::Validation(
                "Field 'duration' must be a positive number of hours".to_string(),
            ));
        }
        Ok(())
    }

    fn matches(&self, filter: &ArionFilter) -> bool {
        filter
            .year
            .as_deref()
            .map_or(true, |y| same_text(self.year.as_deref(), y))
            && filter
                .status
                .as_deref()
                .map_or(true, |s| same_text(self.status.as_deref(), s))
            && filter.trainer.as_deref().map_or(true, |t| {
                self.trainer
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&t.trim().to_lowercase()))
            })
    }

    fn sort(records: &mut [Self]) {
        records.sort_by(|a, b| {
            b.year
                .cmp(&a.year)
                .then_with(|| b.parsed_date().cmp(&a.parsed_date()))
        });
    }
}

/// Parse the date formats found in ARION exports.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date_part = value.split([' ', 'T']).next().unwrap_or(value);
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

impl ArionSession {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_date)
    }

    /// Upload columns; rows without a year take `default_year` when given.
    pub fn columns(default_year: Option<&str>) -> ColumnSpec {
        let mut spec = ColumnSpec::new()
            .required(&REQUIRED_COLUMNS)
            .numeric(&["duree"]);
        for column in OPTIONAL_COLUMNS {
            let default = match (column, default_year) {
                ("annee", Some(year)) => Cell::text(year),
                _ => Cell::Null,
            };
            spec = spec.optional(column, default);
        }
        spec
    }

    pub fn from_row(row: &NormalizedRow) -> Self {
        let mapped: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .chain(OPTIONAL_COLUMNS.iter())
            .copied()
            .collect();

        Self {
            year: row.text("annee"),
            trainer: row.text("formateur"),
            status: row.text("statut"),
            group: row.text("groupe"),
            activity: row.text("activite"),
            code_y: row.text("code_y"),
            level: row.text("niveau"),
            date: row.text("date"),
            duration: row.number("duree"),
            location: row.text("lieu"),
            speaker: row.text("intervenant"),
            extra: extra_from_row::<ArionSession>(row, &mapped),
            ..Default::default()
        }
    }
}
