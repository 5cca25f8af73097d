//! JWT bearer authentication and permission checks.
//!
//! Tokens are HS256-signed and carry the user's id, name and role. The
//! middleware verifies them and places the [`Claims`] in request extensions
//! for handlers to pick up with `Extension<Claims>`.

mod password;

pub use password::{hash_password, verify_password};

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::{Permission, Role, UserAccount};

/// Claims embedded in every issued token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    pub exp: i64,
}

/// Signing and verification keys plus the token lifetime.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry: Duration::hours(expiry_hours),
        }
    }

    /// Issue a token for `user`, returning it with its expiry timestamp.
    pub fn issue(&self, user: &UserAccount) -> Result<(String, i64), AppError> {
        let exp = (Utc::now() + self.expiry).timestamp();
        let claims = Claims {
            user_id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))?;

        Ok((token, exp))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::new(Algorithm::HS256);

        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Unauthorized("Token expired".to_string()),
                _ => {
                    tracing::debug!("Rejected token: {}", e);
                    AppError::Unauthorized("Invalid token".to_string())
                }
            })
    }
}

/// Bearer authentication layer. Verified claims are inserted into the request extensions.
pub async fn jwt_auth_layer(keys: Arc<JwtKeys>, mut request: Request, next: Next) -> Response {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string());

    let Some(token) = bearer.filter(|t| !t.is_empty()) else {
        return AppError::Unauthorized("Missing bearer token".to_string()).into_response();
    };

    match keys.verify(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Fail with `Forbidden` unless the caller's role grants `permission`.
pub fn require(claims: &Claims, permission: Permission) -> Result<(), AppError> {
    if claims.role.has_permission(permission) {
        Ok(())
    } else {
        tracing::warn!(
            "User {} ({}) denied {:?}",
            claims.username,
            claims.role.as_str(),
            permission
        );
        Err(AppError::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ))
    }
}

/// Perform constant-time string comparison.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    // Constant-time comparison
    a_bytes.ct_eq(b_bytes).into()
}

/// A random signing secret for processes started without one.
pub fn random_secret() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}
