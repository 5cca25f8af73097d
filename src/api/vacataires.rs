//! Vacataire endpoints beyond generic CRUD.

use axum::{
    extract::{Multipart, State},
    Extension,
};

use super::{read_upload, success, ApiResult};
use crate::auth::{require, Claims};
use crate::ingest::normalize::normalize;
use crate::ingest::{dispatch, ImportMode, ImportReport};
use crate::models::{Entity, Permission, RecordMeta, Vacataire};
use crate::stats::vacataires::{self, VacataireStats};
use crate::AppState;

/// POST /api/vacataires/upload - Append vacataires from a spreadsheet.
pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> ApiResult<ImportReport> {
    require(&claims, Permission::Upload)?;

    let form = read_upload(multipart).await?;
    let batch = form.batch()?;
    let table = normalize(&batch.table, &Vacataire::columns())?;

    let records: Vec<Vacataire> = table
        .rows
        .iter()
        .map(|row| {
            let mut vacataire = Vacataire::from_row(row);
            *vacataire.meta_mut() = RecordMeta::created(&claims.username);
            vacataire
        })
        .collect();

    let report = dispatch(&state.repo, records, ImportMode::Append)
        .await?
        .with_issues(table.issues);
    tracing::info!(
        "{} uploaded '{}': {} vacataires stored",
        claims.username,
        form.filename,
        report.stored()
    );

    success(report)
}

/// GET /api/vacataires/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<VacataireStats> {
    require(&claims, Permission::View)?;
    let records: Vec<Vacataire> = state.repo.list_documents().await?;
    success(vacataires::stats(&records))
}
