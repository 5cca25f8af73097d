//! Upsert dispatcher: decides per record whether to insert, replace in place,
//! or insert under a disambiguated key.

use chrono::Utc;
use serde::Serialize;

use super::normalize::RowIssue;
use crate::db::{find_by_key_in, insert_document_in, key_exists_in, replace_document_in, Repository};
use crate::errors::AppError;
use crate::models::{generate_id, Entity, RecordMeta};

/// How an import treats records whose natural key is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Always insert; natural keys are ignored
    Append,
    /// Replace the stored record, keeping its id and creation metadata
    Upsert,
    /// Keep the stored record and insert the new one under a suffixed key
    NonDestructive,
}

/// A record stored under a different key than the one it arrived with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenamedKey {
    pub original: String,
    pub stored_as: String,
}

/// Outcome of an import, returned to the uploader.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub renamed: Vec<RenamedKey>,
    pub issues: Vec<RowIssue>,
}

impl ImportReport {
    pub fn with_issues(mut self, issues: Vec<RowIssue>) -> Self {
        self.issues.extend(issues);
        self
    }

    pub fn stored(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Persist `records` in a single transaction according to `mode`.
///
/// Records must already carry creation metadata; ids are (re)generated here.
pub async fn dispatch<T: Entity>(
    repo: &Repository,
    records: Vec<T>,
    mode: ImportMode,
) -> Result<ImportReport, AppError> {
    let mut report = ImportReport::default();
    let mut tx = repo.begin().await?;
    let suffix = Utc::now().format("%Y%m%d%H%M%S").to_string();

    for mut record in records {
        record.finalize();
        record.set_id(generate_id(T::ID_PREFIX));

        match (mode, record.natural_key()) {
            (ImportMode::Upsert, Some(key)) => match find_by_key_in::<T>(&mut *tx, &key).await? {
                Some(existing) => {
                    carry_over(&mut record, &existing);
                    replace_document_in(&mut *tx, &record).await?;
                    report.updated += 1;
                }
                None => {
                    insert_document_in(&mut *tx, &record).await?;
                    report.inserted += 1;
                }
            },
            (ImportMode::NonDestructive, Some(key)) => {
                if key_exists_in::<T>(&mut *tx, &key).await? {
                    let renamed = disambiguate(&mut *tx, &record, &suffix).await?;
                    if let Some(stored_key) = renamed.natural_key() {
                        tracing::info!("{} key {} exists, stored as {}", T::LABEL, key, stored_key);
                        report.renamed.push(RenamedKey {
                            original: key,
                            stored_as: stored_key,
                        });
                    }
                    record = renamed;
                }
                insert_document_in(&mut *tx, &record).await?;
                report.inserted += 1;
            }
            _ => {
                insert_document_in(&mut *tx, &record).await?;
                report.inserted += 1;
            }
        }
    }

    tx.commit().await?;

    tracing::info!(
        "Imported {}: {} inserted, {} updated, {} renamed",
        T::COLLECTION,
        report.inserted,
        report.updated,
        report.renamed.len()
    );

    Ok(report)
}

/// Keep the stored id and creation stamp when replacing in place.
fn carry_over<T: Entity>(record: &mut T, existing: &T) {
    record.set_id(existing.id().to_string());
    let incoming: RecordMeta = record.meta().clone();
    let meta = record.meta_mut();
    meta.created_by = existing.meta().created_by.clone();
    meta.created_at = existing.meta().created_at.clone();
    meta.updated_by = incoming.created_by;
    meta.updated_at = incoming.created_at;
}

/// Append `suffix`, then a counter, until the natural key is free.
async fn disambiguate<T: Entity>(
    conn: &mut sqlx::SqliteConnection,
    record: &T,
    suffix: &str,
) -> Result<T, AppError> {
    let mut attempt = 1;
    loop {
        let tag = if attempt == 1 {
            suffix.to_string()
        } else {
            format!("{}_{}", suffix, attempt)
        };

        let mut candidate = record.clone();
        candidate.disambiguate(&tag);

        match candidate.natural_key() {
            Some(key) if key_exists_in::<T>(conn, &key).await? => attempt += 1,
            _ => return Ok(candidate),
        }
    }
}
