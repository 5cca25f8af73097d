//! Registration, login and session endpoints.

use axum::{extract::State, Extension, Json};
use serde::Serialize;

use super::{success, ApiResponse, ApiResult, Message};
use crate::auth::{hash_password, verify_password, Claims};
use crate::errors::AppError;
use crate::models::{
    ApprovalStatus, LoginRequest, LoginResponse, NewUser, Permission, RegisterRequest, Role,
    UserAccount,
};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub authenticated: bool,
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: UserAccount,
    pub permissions: &'static [Permission],
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, AppError> {
    let value = value.trim();
    if value.is_empty() {
        Err(AppError::Validation(format!(
            "Missing required field: {}",
            field
        )))
    } else {
        Ok(value)
    }
}

/// PBKDF2 with hundreds of thousands of rounds; kept off the async workers.
async fn hash_blocking(password: String, rounds: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password, rounds))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

async fn verify_blocking(password: String, stored: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| AppError::Internal(format!("Password check failed: {}", e)))
}

/// POST /api/register - Create a pending account.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<UserAccount> {
    let username = required(&request.username, "username")?;
    let password = required(&request.password, "password")?;
    let email = required(&request.email, "email")?;
    let role_name = required(&request.role, "role")?;

    let role = Role::from_str(role_name)
        .ok_or_else(|| AppError::Validation(format!("Invalid role: {}", role_name)))?;

    if state.repo.find_user_by_username(username).await?.is_some() {
        return Err(AppError::Validation("Username already exists".to_string()));
    }
    if state.repo.email_taken(email).await? {
        return Err(AppError::Validation("Email already exists".to_string()));
    }

    let password_hash = hash_blocking(password.to_string(), state.config.password_rounds).await?;

    let user = state
        .repo
        .create_user(&NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            role,
            approval_status: ApprovalStatus::Pending,
            is_active: false,
        })
        .await?;

    tracing::info!(
        "Registered user {} as {}, awaiting approval",
        user.username,
        role.as_str()
    );

    Ok(ApiResponse::created(user))
}

/// POST /api/login - Exchange credentials for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let username = required(&request.username, "username")?;
    let password = required(&request.password, "password")?;

    let invalid = || AppError::Unauthorized("Invalid username or password".to_string());

    let user = state
        .repo
        .find_user_by_username(username)
        .await?
        .ok_or_else(invalid)?;

    if !verify_blocking(password.to_string(), user.password_hash.clone()).await? {
        tracing::warn!("Failed login for {}", username);
        return Err(invalid());
    }

    user.may_log_in()
        .map_err(|reason| AppError::Forbidden(reason.to_string()))?;

    state.repo.record_login(&user.id).await?;
    let user = state.repo.get_user(&user.id).await?.unwrap_or(user);
    let (token, expires_at) = state.jwt.issue(&user)?;

    tracing::info!("User {} logged in", user.username);

    success(LoginResponse {
        token,
        expires_at,
        user,
    })
}

/// GET /api/check-auth - Confirm the bearer token is valid.
pub async fn check_auth(Extension(claims): Extension<Claims>) -> ApiResult<SessionInfo> {
    success(SessionInfo {
        authenticated: true,
        user_id: claims.user_id,
        username: claims.username,
        role: claims.role,
    })
}

/// POST /api/logout - Tokens are stateless; the client discards its copy.
pub async fn logout(Extension(claims): Extension<Claims>) -> ApiResult<Message> {
    tracing::info!("User {} logged out", claims.username);
    success(Message::new("Logged out"))
}

/// GET /api/me - The caller's account and permissions.
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Profile> {
    let user = state
        .repo
        .get_user(&claims.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

    success(Profile {
        permissions: user.role.permissions(),
        user,
    })
}
