//! RSE endpoints beyond generic CRUD.

use axum::{
    extract::{Multipart, Path, State},
    Extension,
};

use super::{read_upload, success, ApiResult};
use crate::auth::{require, Claims};
use crate::errors::AppError;
use crate::ingest::normalize::{normalize, NormalizedTable};
use crate::ingest::reader::Table;
use crate::ingest::{dispatch, ImportMode, ImportReport};
use crate::models::{Entity, Permission, RecordMeta, RseActivity, RseLayout};
use crate::stats::rse::{self, RseStats};
use crate::stats::Chart;
use crate::AppState;

/// Normalize against the maquette layout, falling back to the standard one.
///
/// When neither fits, the error names the columns the maquette layout lacks.
fn detect_layout(table: &Table) -> Result<(RseLayout, NormalizedTable), AppError> {
    match normalize(table, &RseLayout::Maquette.columns()) {
        Ok(normalized) => Ok((RseLayout::Maquette, normalized)),
        Err(AppError::MissingColumns(maquette_missing)) => {
            match normalize(table, &RseLayout::Standard.columns()) {
                Ok(normalized) => Ok((RseLayout::Standard, normalized)),
                Err(AppError::MissingColumns(_)) => Err(AppError::MissingColumns(maquette_missing)),
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}

/// POST /api/rse/upload - Upsert activities from a maquette or standard spreadsheet.
pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> ApiResult<ImportReport> {
    require(&claims, Permission::Upload)?;

    let form = read_upload(multipart).await?;
    let batch = form.batch()?;
    let (layout, table) = detect_layout(&batch.table)?;
    tracing::debug!("RSE upload '{}' uses the {:?} layout", form.filename, layout);

    let records = table
        .rows
        .iter()
        .map(|row| {
            let mut record = layout.record_from_row(row)?;
            *record.meta_mut() = RecordMeta::created(&claims.username);
            Ok(record)
        })
        .collect::<Result<Vec<RseActivity>, AppError>>()?;

    let report = dispatch(&state.repo, records, ImportMode::Upsert)
        .await?
        .with_issues(table.issues);
    tracing::info!(
        "{} uploaded '{}': {} RSE activities stored",
        claims.username,
        form.filename,
        report.stored()
    );

    success(report)
}

/// GET /api/rse/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<RseStats> {
    require(&claims, Permission::View)?;
    let records: Vec<RseActivity> = state.repo.list_documents().await?;
    success(rse::stats(&records))
}

/// GET /api/rse/charts/{chart}
pub async fn chart(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(name): Path<String>,
) -> ApiResult<Chart> {
    require(&claims, Permission::View)?;
    let records: Vec<RseActivity> = state.repo.list_documents().await?;
    success(rse::chart(&records, &name)?)
}
