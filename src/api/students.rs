//! Student endpoints beyond generic CRUD: file upload, stats, charts, references.

use std::collections::BTreeSet;

use axum::{
    extract::{Multipart, Path, Query, State},
    Extension,
};
use serde::Deserialize;

use super::{read_upload, success, ApiResult};
use crate::auth::{require, Claims};
use crate::ingest::normalize::normalize;
use crate::ingest::{dispatch, ImportMode, ImportReport};
use crate::models::{Entity, Permission, RecordMeta, Student};
use crate::stats::students::{self, StudentStats};
use crate::stats::Chart;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    pub year: Option<String>,
}

/// POST /api/students/upload - Upsert students from a spreadsheet.
pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> ApiResult<ImportReport> {
    require(&claims, Permission::Upload)?;

    let form = read_upload(multipart).await?;
    let batch = form.batch()?;
    let table = normalize(&batch.table, &Student::columns())?;

    let records: Vec<Student> = table
        .rows
        .iter()
        .map(|row| {
            let mut student = Student::from_row(row);
            *student.meta_mut() = RecordMeta::created(&claims.username);
            student
        })
        .collect();

    let report = dispatch(&state.repo, records, ImportMode::Upsert)
        .await?
        .with_issues(table.issues);
    tracing::info!(
        "{} uploaded '{}': {} students stored",
        claims.username,
        form.filename,
        report.stored()
    );

    success(report)
}

/// GET /api/students/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StudentStats> {
    require(&claims, Permission::View)?;
    let records: Vec<Student> = state.repo.list_documents().await?;
    success(students::stats(&records))
}

/// GET /api/students/charts/{chart}
pub async fn chart(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(name): Path<String>,
    Query(query): Query<ChartQuery>,
) -> ApiResult<Chart> {
    require(&claims, Permission::View)?;
    let records: Vec<Student> = state.repo.list_documents().await?;
    success(students::chart(&records, &name, query.year.as_deref())?)
}

/// GET /api/students/years
pub async fn years(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Vec<String>> {
    require(&claims, Permission::View)?;
    let records: Vec<Student> = state.repo.list_documents().await?;
    success(distinct(records.into_iter().map(|s| s.year)))
}

/// GET /api/students/levels
pub async fn levels(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Vec<String>> {
    require(&claims, Permission::View)?;
    let records: Vec<Student> = state.repo.list_documents().await?;
    success(distinct(records.into_iter().map(|s| s.level)))
}

fn distinct(values: impl Iterator<Item = Option<String>>) -> Vec<String> {
    values
        .flatten()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
