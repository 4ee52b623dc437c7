use axum::{
    Json,
    response::{IntoResponse, Response},
};
use dust_core::CoreError;
use http::StatusCode;
use serde_json::json;

use crate::map_core_error;

// Declare sub-modules within the application layer
pub mod authz;
pub mod commands;
pub mod middleware;
pub mod query;

/// Errors a handler can return; every variant renders as `{"error": "<message>"}`.
#[derive(thiserror::Error, Debug)]
pub enum ApplicationError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),
}

impl IntoResponse for ApplicationError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApplicationError::Core(err) => {
                let status = map_core_error(err);
                let message = if err.is_storage_fault() {
                    "Internal storage error".to_string()
                } else {
                    err.to_string()
                };
                (status, message)
            }
            ApplicationError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApplicationError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApplicationError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApplicationError>;
