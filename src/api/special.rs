//! Special-category list uploads.

use axum::{
    extract::{Multipart, State},
    Extension,
};

use super::{read_upload, success, ApiResult};
use crate::auth::{require, Claims};
use crate::ingest::normalize::normalize;
use crate::ingest::{dispatch, ImportMode, ImportReport};
use crate::models::{Entity, Permission, RecordMeta, SpecialCategory, SpecialCategoryRecord};
use crate::AppState;

/// POST /api/special-categories/upload - The category is read from the file name.
pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> ApiResult<ImportReport> {
    require(&claims, Permission::Upload)?;

    let form = read_upload(multipart).await?;
    let batch = form.batch()?;
    let category = SpecialCategory::from_filename(&form.filename);
    let table = normalize(&batch.table, &category.columns())?;

    let records: Vec<SpecialCategoryRecord> = table
        .rows
        .iter()
        .map(|row| {
            let mut record = SpecialCategoryRecord::from_row(row, category, &form.filename);
            *record.meta_mut() = RecordMeta::created(&claims.username);
            record
        })
        .collect();

    let report = dispatch(&state.repo, records, ImportMode::Append)
        .await?
        .with_issues(table.issues);
    tracing::info!(
        "{} uploaded '{}' as {:?}: {} records stored",
        claims.username,
        form.filename,
        category,
        report.stored()
    );

    success(report)
}
