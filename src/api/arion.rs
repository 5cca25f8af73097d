//! ARION endpoints beyond generic CRUD.

use axum::{
    extract::{Multipart, Query, State},
    Extension,
};
use serde::Deserialize;

use super::{read_upload, success, ApiResult};
use crate::auth::{require, Claims};
use crate::errors::AppError;
use crate::ingest::normalize::normalize;
use crate::ingest::{dispatch, ImportMode, ImportReport};
use crate::models::{ArionSession, Entity, Permission, RecordMeta};
use crate::stats::arion::{self, ArionStats};
use crate::stats::Series;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MonthlyQuery {
    pub year: Option<String>,
}

/// POST /api/arion/upload - Append sessions; `default_year` fills rows without a year.
pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> ApiResult<ImportReport> {
    require(&claims, Permission::Upload)?;

    let form = read_upload(multipart).await?;
    let batch = form.batch()?;
    let default_year = form.field("default_year");
    let table = normalize(&batch.table, &ArionSession::columns(default_year))?;

    let mut records = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        if row.text("annee").is_none() {
            return Err(AppError::Validation(format!(
                "Line {}: no year given and no default_year provided",
                row.line
            )));
        }
        let mut session = ArionSession::from_row(row);
        *session.meta_mut() = RecordMeta::created(&claims.username);
        records.push(session);
    }

    let report = dispatch(&state.repo, records, ImportMode::Append)
        .await?
        .with_issues(table.issues);
    tracing::info!(
        "{} uploaded '{}': {} ARION sessions stored",
        claims.username,
        form.filename,
        report.stored()
    );

    success(report)
}

/// GET /api/arion/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<ArionStats> {
    require(&claims, Permission::View)?;
    let records: Vec<ArionSession> = state.repo.list_documents().await?;
    success(arion::stats(&records))
}

/// GET /api/arion/status-stats
pub async fn status_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Series> {
    require(&claims, Permission::View)?;
    let records: Vec<ArionSession> = state.repo.list_documents().await?;
    success(arion::status_counts(&records))
}

/// GET /api/arion/monthly?year=
pub async fn monthly(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<MonthlyQuery>,
) -> ApiResult<Series> {
    require(&claims, Permission::View)?;
    let records: Vec<ArionSession> = state.repo.list_documents().await?;
    success(arion::monthly(&records, query.year.as_deref()))
}
