//! Vacataires: part-time instructors and their recruitment state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record::{extra_from_row, lenient, require_text, same_text, Entity, RecordMeta};
use crate::errors::AppError;
use crate::ingest::normalize::{Cell, ColumnSpec, NormalizedRow};

const COL_LAST_NAME: &str = "Nom";
const COL_FIRST_NAME: &str = "Prénom";
const COL_EMAIL: &str = "Adresse mail";
const COL_EMAIL_ALT: &str = "Email";
const COL_PROFESSION: &str = "Type de profession";
const COL_COUNTRY: &str = "Pays";
const COL_RECRUITMENT: &str = "État recrutement";
const COL_HOURS: &str = "Nombre d'heures estimées";

const MAPPED_COLUMNS: [&str; 8] = [
    COL_LAST_NAME,
    COL_FIRST_NAME,
    COL_EMAIL,
    COL_EMAIL_ALT,
    COL_PROFESSION,
    COL_COUNTRY,
    COL_RECRUITMENT,
    COL_HOURS,
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Vacataire {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "Nom", deserialize_with = "lenient::opt_text")]
    pub last_name: Option<String>,
    #[serde(default, alias = "Prénom", deserialize_with = "lenient::opt_text")]
    pub first_name: Option<String>,
    #[serde(
        default,
        alias = "Adresse mail",
        alias = "Email",
        deserialize_with = "lenient::opt_text"
    )]
    pub email: Option<String>,
    #[serde(default, alias = "Type de profession", deserialize_with = "lenient::opt_text")]
    pub profession: Option<String>,
    #[serde(default, alias = "Pays", deserialize_with = "lenient::opt_text")]
    pub country: Option<String>,
    #[serde(default, alias = "État recrutement", deserialize_with = "lenient::opt_text")]
    pub recruitment_status: Option<String>,
    #[serde(
        default,
        alias = "Nombre d'heures estimées",
        deserialize_with = "lenient::opt_number"
    )]
    pub estimated_hours: Option<f64>,
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VacataireFilter {
    pub profession: Option<String>,
    pub country: Option<String>,
}

impl Entity for Vacataire {
    const COLLECTION: &'static str = "vacataires";
    const ID_PREFIX: &'static str = "vac";
    const LABEL: &'static str = "Vacataire";
    const FIELDS: &'static [&'static str] = &[
        "last_name",
        "first_name",
        "email",
        "profession",
        "country",
        "recruitment_status",
        "estimated_hours",
    ];

    type Filter = VacataireFilter;

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
        require_text(self.last_name.as_deref(), "last_name")?;
        require_text(self.first_name.as_deref(), "first_name")?;
        require_text(self.email.as_deref(), "email")
    }

    fn matches(&self, filter: &VacataireFilter) -> bool {
        filter
            .profession
            .as_deref()
            .map_or(true, |p| same_text(self.profession.as_deref(), p))
            && filter
                .country
                .as_deref()
                .map_or(true, |c| same_text(self.country.as_deref(), c))
    }
}

impl Vacataire {
    /// Vacataire exports vary a lot; every column is optional.
    pub fn columns() -> ColumnSpec {
        ColumnSpec::new().numeric(&[COL_HOURS])
    }

    pub fn from_row(row: &NormalizedRow) -> Self {
        let hours = match row.get(COL_HOURS) {
            Cell::Number(n) if *n > 0.0 => Some(*n),
            _ => None,
        };

        Self {
            last_name: row.text(COL_LAST_NAME),
            first_name: row.text(COL_FIRST_NAME),
            email: row.text(COL_EMAIL).or_else(|| row.text(COL_EMAIL_ALT)),
            profession: row.text(COL_PROFESSION),
            country: row.text(COL_COUNTRY),
            recruitment_status: row.text(COL_RECRUITMENT),
            estimated_hours: hours,
            extra: extra_from_row::<Vacataire>(row, &MAPPED_COLUMNS),
            ..Default::default()
        }
    }

    /// `First Last`, as shown on charts.
    pub fn display_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::normalize::normalize;
    use crate::ingest::reader::{read_table, FileFormat};

    #[test]
    fn test_row_mapping_keeps_unknown_columns() {
        let csv = "Nom;Prénom;Email;Pays;Nombre d'heures estimées;Statut contrat\n\
                   Martin;Paul;paul@example.org;France;24;CDD\n\
                   Durand;Lea;;Belgique;abc;\n";
        let table = read_table(csv.as_bytes(), FileFormat::Csv).unwrap();
        let rows = normalize(&table, &Vacataire::columns()).unwrap();

        let first = Vacataire::from_row(&rows.rows[0]);
        assert_eq!(first.email.as_deref(), Some("paul@example.org"));
        assert_eq!(first.estimated_hours, Some(24.0));
        assert_eq!(first.extra["Statut contrat"], "CDD");
        assert_eq!(first.display_name(), "Paul Martin");

        let second = Vacataire::from_row(&rows.rows[1]);
        assert!(second.email.is_none());
        assert!(second.estimated_hours.is_none());
        assert!(second.extra.is_empty());
    }

    #[test]
    fn test_validation() {
        let v = Vacataire {
            last_name: Some("Martin".into()),
            first_name: Some("Paul".into()),
            ..Default::default()
        };
        assert!(v.validate().is_err());
        assert!(Vacataire {
            email: Some("p@example.org".into()),
            ..v
        }
        .validate()
        .is_ok());
    }
}
