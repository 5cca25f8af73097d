//! Teaching hours endpoints: uploads, form entry, scoped deletion, stats and references.

use std::collections::BTreeSet;

use axum::{
    extract::{Multipart, Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde_json::Value;

use super::records::{filtered, record_from_body};
use super::{read_upload, success, ApiResponse, ApiResult, Deleted, UploadForm};
use crate::auth::{require, Claims};
use crate::errors::AppError;
use crate::ingest::group::{group_rows, GroupRule};
use crate::ingest::normalize::{normalize, RowIssue};
use crate::ingest::reader::BatchMetadata;
use crate::ingest::{dispatch, ImportMode, ImportReport};
use crate::models::{
    current_academic_year, teaching_columns, Entity, Permission, RecordMeta, TeachingFilter,
    TeachingScope, TeachingUnitRecord, LEVEL_CATALOGUE,
};
use crate::stats::teaching::{graph_data, summary, TeachingGraphData, TeachingSummary};
use crate::AppState;

const UNIT_RULE: GroupRule<'static> = GroupRule {
    scope: &["niveau", "semestre"],
    parent_marker: "code_ue",
};

/// Metadata given as form fields next to the file.
fn form_metadata(form: &UploadForm) -> Result<BatchMetadata, AppError> {
    let year = |name: &str| -> Result<Option<i32>, AppError> {
        form.field(name)
            .map(|v| {
                v.parse::<i32>()
                    .map_err(|_| AppError::Validation(format!("Invalid {}: {}", name, v)))
            })
            .transpose()
    };

    let out_of_range = || AppError::Validation("Academic year out of range".to_string());
    let academic_year = match (year("start_year")?, year("end_year")?) {
        (Some(start), Some(end)) => Some((start, end)),
        (Some(start), None) => Some((start, start.checked_add(1).ok_or_else(out_of_range)?)),
        (None, Some(end)) => Some((end.checked_sub(1).ok_or_else(out_of_range)?, end)),
        (None, None) => None,
    };
    if let Some((start, end)) = academic_year {
        if end <= start {
            return Err(AppError::Validation(format!(
                "end_year must follow start_year: {}-{}",
                start, end
            )));
        }
    }

    Ok(BatchMetadata {
        academic_year,
        level: form.field("level").map(str::to_string),
        semester: form.field("semester").map(str::to_string),
    })
}

/// POST /api/teaching-hours/upload - Import units without overwriting existing ones.
pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> ApiResult<ImportReport> {
    require(&claims, Permission::Upload)?;

    let form = read_upload(multipart).await?;
    let batch = form.batch()?;
    let metadata = batch.metadata.clone().override_with(form_metadata(&form)?);
    let academic_year = metadata
        .academic_year
        .unwrap_or_else(|| current_academic_year(Utc::now().date_naive()));

    let table = normalize(&batch.table, &teaching_columns(&metadata))?;
    let grouped = group_rows(&table.rows, UNIT_RULE, state.config.orphan_rows)?;

    let records: Vec<TeachingUnitRecord> = grouped
        .groups
        .iter()
        .map(|group| {
            let mut record = TeachingUnitRecord::from_group(group, academic_year);
            *record.meta_mut() = RecordMeta::created(&claims.username);
            record
        })
        .collect();

    let orphans: Vec<RowIssue> = grouped
        .orphans
        .iter()
        .map(|&line| RowIssue {
            line,
            column: Some(UNIT_RULE.parent_marker.to_string()),
            message: "Row precedes any teaching unit code and was skipped".to_string(),
        })
        .collect();

    let skipped = orphans.len();

    let mut report = dispatch(&state.repo, records, ImportMode::NonDestructive)
        .await?
        .with_issues(table.issues)
        .with_issues(orphans);
    report.skipped = skipped;

    tracing::info!(
        "{} uploaded '{}': {} units stored, {} rows skipped",
        claims.username,
        form.filename,
        report.stored(),
        report.skipped
    );

    success(report)
}

/// POST /api/teaching-hours - Add or replace one unit entered through the form.
pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<Value>,
) -> ApiResult<TeachingUnitRecord> {
    require(&claims, Permission::Edit)?;

    let mut record: TeachingUnitRecord = record_from_body(body)?;
    record.finalize();
    record.validate()?;
    *record.meta_mut() = RecordMeta::created(&claims.username);

    let key = record
        .natural_key()
        .ok_or_else(|| AppError::Validation("Teaching unit is incomplete".to_string()))?;

    dispatch(&state.repo, vec![record], ImportMode::Upsert).await?;

    let stored = state
        .repo
        .find_by_natural_key::<TeachingUnitRecord>(&key)
        .await?
        .ok_or_else(|| AppError::Internal(format!("Teaching unit {} vanished after save", key)))?;

    Ok(ApiResponse::created(stored))
}

/// DELETE /api/teaching-hours - Delete every unit of a year/level/semester, or one code in it.
pub async fn delete_scope(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(scope): Json<TeachingScope>,
) -> ApiResult<Deleted> {
    require(&claims, Permission::Delete)?;

    for (value, field) in [
        (&scope.academic_year, "academic_year"),
        (&scope.level, "level"),
        (&scope.semester, "semester"),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "Missing required field: {}",
                field
            )));
        }
    }

    let ids: Vec<String> = state
        .repo
        .list_documents::<TeachingUnitRecord>()
        .await?
        .into_iter()
        .filter(|record| scope.contains(record))
        .map(|record| record.id)
        .collect();

    if ids.is_empty() {
        return Err(AppError::NotFound(
            "No teaching hours match these criteria".to_string(),
        ));
    }

    let deleted = state
        .repo
        .delete_documents::<TeachingUnitRecord>(&ids)
        .await?;
    tracing::info!(
        "{} deleted {} teaching units for {} {} {}",
        claims.username,
        deleted,
        scope.academic_year,
        scope.level,
        scope.semester
    );

    success(Deleted { deleted })
}

/// GET /api/teaching-hours/stats
pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<TeachingFilter>,
) -> ApiResult<TeachingSummary> {
    require(&claims, Permission::View)?;
    let records = filtered::<TeachingUnitRecord>(&state.repo, &filter).await?;
    success(summary(&records, &filter))
}

/// GET /api/teaching-hours/graph-data
pub async fn graph(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<TeachingFilter>,
) -> ApiResult<TeachingGraphData> {
    require(&claims, Permission::View)?;
    let records = filtered::<TeachingUnitRecord>(&state.repo, &filter).await?;
    success(graph_data(&records))
}

/// GET /api/teaching-hours/academic-years
pub async fn academic_years(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Vec<String>> {
    require(&claims, Permission::View)?;
    let records: Vec<TeachingUnitRecord> = state.repo.list_documents().await?;
    let years: BTreeSet<String> = records
        .into_iter()
        .map(|r| r.academic_year)
        .filter(|y| !y.is_empty())
        .collect();
    success(years.into_iter().collect())
}

/// GET /api/teaching-hours/levels - Stored levels plus the school's catalogue.
pub async fn levels(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Vec<String>> {
    require(&claims, Permission::View)?;
    let records: Vec<TeachingUnitRecord> = state.repo.list_documents().await?;
    let mut levels: BTreeSet<String> = LEVEL_CATALOGUE.iter().map(|l| l.to_string()).collect();
    levels.extend(records.into_iter().map(|r| r.level).filter(|l| !l.is_empty()));
    success(levels.into_iter().collect())
}

/// GET /api/teaching-hours/instructors
pub async fn instructors(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Vec<String>> {
    require(&claims, Permission::View)?;
    let records: Vec<TeachingUnitRecord> = state.repo.list_documents().await?;
    let names: BTreeSet<String> = records
        .iter()
        .flat_map(|r| r.unit.subjects.iter())
        .map(|s| s.instructor.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    success(names.into_iter().collect())
}
