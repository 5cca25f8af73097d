//! User administration endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{success, ApiResult};
use crate::auth::{require, Claims};
use crate::errors::AppError;
use crate::models::{ApprovalRequest, ApprovalStatus, Permission, UserAccount};
use crate::AppState;

/// GET /api/users - List accounts.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Vec<UserAccount>> {
    require(&claims, Permission::ManageUsers)?;
    success(state.repo.list_users().await?)
}

/// POST /api/users/{id}/approval - Approve or reject an account.
pub async fn set_approval(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(request): Json<ApprovalRequest>,
) -> ApiResult<UserAccount> {
    require(&claims, Permission::ManageUsers)?;

    let status = match ApprovalStatus::from_str(request.status.trim()) {
        Some(status @ (ApprovalStatus::Approved | ApprovalStatus::Rejected)) => status,
        _ => {
            return Err(AppError::Validation(
                "Status must be 'approved' or 'rejected'".to_string(),
            ))
        }
    };

    let user = state.repo.set_approval(&id, status, &claims.username).await?;
    tracing::info!(
        "{} set user {} to {}",
        claims.username,
        user.username,
        status.as_str()
    );

    success(user)
}
