use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::storage::StorageError;

/// Boundary error type. Every handler failure funnels through here and maps
/// to a status code plus a generic JSON message; storage detail is logged,
/// never returned to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Access denied")]
    Forbidden,
    #[error("{0}")]
    NotFound(&'static str),
    #[error("User already exists")]
    DuplicateEmail,
    #[error("storage failure")]
    Storage(#[source] StorageError),
    #[error("internal error")]
    Internal,
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateEmail => ApiError::DuplicateEmail,
            other => ApiError::Storage(other),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DuplicateEmail => StatusCode::CONFLICT,
            ApiError::Storage(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Storage(err) => {
                log::error!("storage error: {err}");
                "Internal server error".to_string()
            }
            ApiError::Internal => "Internal server error".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "message": message }))
    }
}
