//! REST API module.
//!
//! Contains all API routes and handlers following the dashboard contract.

pub mod arion;
pub mod auth;
pub mod records;
pub mod rse;
pub mod special;
pub mod students;
pub mod teaching;
mod upload;
pub mod users;
pub mod vacataires;

pub use upload::{read_upload, UploadForm};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip)]
    status: StatusCode,
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            data,
        }
    }

    /// Same envelope, answered with 201.
    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, crate::errors::AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Acknowledgement body for operations without a payload.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Count of records removed by a delete.
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: u64,
}
