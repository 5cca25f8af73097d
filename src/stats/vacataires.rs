//! Vacataire counts and the top estimated workloads.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{round2, tally, Series};
use crate::models::Vacataire;

const TOP_HOURS: usize = 10;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VacataireStats {
    pub profession: Series,
    pub country: Series,
    pub recruitment_status: Series,
    /// Largest estimated hours, labeled `First Last`
    pub hours: Series,
}

pub fn stats(records: &[Vacataire]) -> VacataireStats {
    let mut professions = BTreeMap::new();
    let mut countries = BTreeMap::new();
    let mut statuses = BTreeMap::new();

    for vacataire in records {
        tally(&mut professions, vacataire.profession.as_deref());
        tally(&mut countries, vacataire.country.as_deref());
        tally(&mut statuses, vacataire.recruitment_status.as_deref());
    }

    let mut workloads: Vec<(String, f64)> = records
        .iter()
        .filter_map(|v| {
            v.estimated_hours
                .filter(|h| *h > 0.0)
                .map(|h| (v.display_name(), h))
        })
        .collect();
    workloads.sort_by(|a, b| b.1.total_cmp(&a.1));
    workloads.truncate(TOP_HOURS);

    VacataireStats {
        profession: Series::from_counts(&professions),
        country: Series::from_counts(&countries),
        recruitment_status: Series::from_counts(&statuses),
        hours: Series {
            labels: workloads.iter().map(|(name, _)| name.clone()).collect(),
            values: workloads.iter().map(|(_, h)| round2(*h)).collect(),
        },
    }
}
