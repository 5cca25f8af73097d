//! Special-category lists (vacataire contacts, conventions, misc).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record::{extra_from_row, lenient, Entity, RecordMeta};
use crate::ingest::normalize::{ColumnSpec, NormalizedRow};

const CONTACT_COLUMNS: [&str; 4] = ["Prénom", "Nom", "Etablissement", "Adresse mail"];

/// Kind of list, deduced from the uploaded file name.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpecialCategory {
    Vacataires,
    Convention,
    #[default]
    Other,
}

impl SpecialCategory {
    pub fn from_filename(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("vacataire") {
            SpecialCategory::Vacataires
        } else if lower.contains("convention") {
            SpecialCategory::Convention
        } else {
            SpecialCategory::Other
        }
    }

    pub fn columns(&self) -> ColumnSpec {
        match self {
            SpecialCategory::Vacataires | SpecialCategory::Convention => {
                ColumnSpec::new().required(&CONTACT_COLUMNS)
            }
            SpecialCategory::Other => ColumnSpec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpecialCategoryRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub category: SpecialCategory,
    #[serde(default, alias = "Prénom", deserialize_with = "lenient::opt_text")]
    pub first_name: Option<String>,
    #[serde(default, alias = "Nom", deserialize_with = "lenient::opt_text")]
    pub last_name: Option<String>,
    #[serde(default, alias = "Etablissement", deserialize_with = "lenient::opt_text")]
    pub institution: Option<String>,
    #[serde(default, alias = "Adresse mail", deserialize_with = "lenient::opt_text")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpecialCategoryFilter {
    pub category: Option<SpecialCategory>,
}

impl Entity for SpecialCategoryRecord {
    const COLLECTION: &'static str = "special_categories";
    const ID_PREFIX: &'static str = "cat";
    const LABEL: &'static str = "Special category record";
    const FIELDS: &'static [&'static str] = &[
        "category",
        "first_name",
        "last_name",
        "institution",
        "email",
        "source_file",
    ];

    type Filter = SpecialCategoryFilter;

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

    fn matches(&self, filter: &SpecialCategoryFilter) -> bool {
        filter.category.map_or(true, |c| self.category == c)
    }
}

impl SpecialCategoryRecord {
    pub fn from_row(row: &NormalizedRow, category: SpecialCategory, source_file: &str) -> Self {
        Self {
            category,
            first_name: row.text("Prénom"),
            last_name: row.text("Nom"),
            institution: row.text("Etablissement"),
            email: row.text("Adresse mail"),
            source_file: Some(source_file.to_string()),
            extra: extra_from_row::<SpecialCategoryRecord>(row, &CONTACT_COLUMNS),
            ..Default::default()
        }
    }
}
