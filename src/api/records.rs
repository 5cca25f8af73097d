//! Generic list/get/create/update/delete handlers over any [`Entity`].
//!
//! Routes instantiate them per collection, e.g. `get(records::list::<Student>)`.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

use super::{success, ApiResponse, ApiResult, Message};
use crate::auth::{require, Claims};
use crate::db::Repository;
use crate::errors::AppError;
use crate::ingest::{dispatch, ImportMode, ImportReport};
use crate::models::{merge_patch, stamp_new, Entity, Permission, RecordMeta};
use crate::AppState;

/// Keys a client may not set on a record body.
const MANAGED_KEYS: [&str; 5] = ["id", "created_by", "created_at", "updated_by", "updated_at"];

/// Body of the JSON bulk import endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImportRequest {
    pub records: Vec<Value>,
}

/// Stored records matching `filter`, in the collection's list order.
pub async fn filtered<T: Entity>(repo: &Repository, filter: &T::Filter) -> Result<Vec<T>, AppError> {
    let mut records: Vec<T> = repo.list_documents().await?;
    records.retain(|record| record.matches(filter));
    T::sort(&mut records);
    Ok(records)
}

/// Deserialize a client body into `T`, ignoring any managed keys it carries.
pub fn record_from_body<T: Entity>(mut body: Value) -> Result<T, AppError> {
    let Value::Object(map) = &mut body else {
        return Err(AppError::Validation(format!(
            "{} body must be a JSON object",
            T::LABEL
        )));
    };
    for key in MANAGED_KEYS {
        map.remove(key);
    }

    serde_json::from_value(body)
        .map_err(|e| AppError::Validation(format!("Invalid {}: {}", T::LABEL, e)))
}

/// GET - List records, filtered by query parameters.
pub async fn list<T: Entity>(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<T::Filter>,
) -> ApiResult<Vec<T>> {
    require(&claims, Permission::View)?;
    success(filtered(&state.repo, &filter).await?)
}

/// GET /{id} - Get a single record.
pub async fn get<T: Entity>(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> ApiResult<T> {
    require(&claims, Permission::View)?;

    match state.repo.get_document::<T>(&id).await? {
        Some(record) => success(record),
        None => Err(AppError::NotFound(format!("{} {} not found", T::LABEL, id))),
    }
}

/// POST - Create a record from a JSON body.
pub async fn create<T: Entity>(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<Value>,
) -> ApiResult<T> {
    require(&claims, Permission::Edit)?;

    let mut record: T = record_from_body(body)?;
    stamp_new(&mut record, &claims.username);
    record.validate()?;

    state.repo.insert_document(&record).await?;
    tracing::info!("{} created {} {}", claims.username, T::LABEL, record.id());

    Ok(ApiResponse::created(record))
}

/// PUT /{id} - Merge the body into the stored record.
pub async fn update<T: Entity>(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(mut patch): Json<Value>,
) -> ApiResult<T> {
    require(&claims, Permission::Edit)?;

    let existing: T = state
        .repo
        .get_document(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {} not found", T::LABEL, id)))?;

    if let Value::Object(map) = &mut patch {
        for key in MANAGED_KEYS {
            map.remove(key);
        }
    } else {
        return Err(AppError::Validation(format!(
            "{} body must be a JSON object",
            T::LABEL
        )));
    }

    let meta: RecordMeta = existing.meta().clone();
    let mut merged = serde_json::to_value(&existing)?;
    merge_patch(&mut merged, &patch);

    let mut record: T = record_from_body(merged)?;
    record.set_id(id);
    *record.meta_mut() = meta;
    record.meta_mut().touch(&claims.username);
    record.finalize();

    state.repo.replace_document(&record).await?;
    tracing::info!("{} updated {} {}", claims.username, T::LABEL, record.id());

    success(record)
}

/// DELETE /{id} - Delete a record.
pub async fn delete<T: Entity>(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> ApiResult<Message> {
    require(&claims, Permission::Delete)?;

    state.repo.delete_document::<T>(&id).await?;
    tracing::info!("{} deleted {} {}", claims.username, T::LABEL, id);

    success(Message::new(format!("{} deleted", T::LABEL)))
}

/// POST /import - Upsert records given as JSON by natural key.
pub async fn import<T: Entity>(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<ImportReport> {
    require(&claims, Permission::Upload)?;

    if request.records.is_empty() {
        return Err(AppError::Validation("No records provided".to_string()));
    }

    let records = request
        .records
        .into_iter()
        .enumerate()
        .map(|(index, body)| {
            let mut record: T = record_from_body(body).map_err(|e| {
                AppError::Validation(format!("Record {}: {}", index + 1, e.message()))
            })?;
            *record.meta_mut() = RecordMeta::created(&claims.username);
            Ok(record)
        })
        .collect::<Result<Vec<T>, AppError>>()?;

    success(dispatch(&state.repo, records, ImportMode::Upsert).await?)
}
