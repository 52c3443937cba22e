// Shared service error type mapped onto JSON error responses
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found")]
    NotFound,

    #[error("Alias already exists")]
    AliasAlreadyExists,

    #[error("{0} already exists")]
    Conflict(String),

    #[error("Link expired")]
    Expired,

    #[error("Link inactive")]
    Inactive,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },

    #[error("Internal server error")]
    InternalError,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ServiceError::DatabaseError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ServiceError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            ServiceError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
            ServiceError::AliasAlreadyExists => {
                (StatusCode::CONFLICT, "Alias already exists".to_string())
            },
            ServiceError::Conflict(what) => {
                (StatusCode::CONFLICT, format!("{} already exists", what))
            },
            ServiceError::Expired => (StatusCode::GONE, "Link has expired".to_string()),
            ServiceError::Inactive => (StatusCode::GONE, "Link is inactive".to_string()),
            ServiceError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ServiceError::Forbidden => (
                StatusCode::FORBIDDEN,
                "You do not have permission to perform this action".to_string(),
            ),
            ServiceError::RateLimited { retry_after } => {
                let body = Json(json!({
                    "error": "Rate limit exceeded, please try again later",
                    "retry_after": retry_after,
                    "status": StatusCode::TOO_MANY_REQUESTS.as_u16()
                }));
                return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            },
            ServiceError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

// Conversion from various error types
impl From<diesel::result::Error> for ServiceError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => ServiceError::NotFound,
            _ => ServiceError::DatabaseError(error.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(error: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(error.to_string())
    }
}

impl From<crate::utils::password::PasswordError> for ServiceError {
    fn from(error: crate::utils::password::PasswordError) -> Self {
        ServiceError::DatabaseError(error.to_string())
    }
}

impl From<crate::services::jwt::JwtError> for ServiceError {
    fn from(_: crate::services::jwt::JwtError) -> Self {
        ServiceError::Unauthorized
    }
}
