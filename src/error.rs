use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// ApiError
///
/// The response-level error categories every handler converts its failures
/// into. Each variant carries exactly the information the JSON body needs;
/// nothing from the storage driver leaks past `Internal`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input. Carries one message per broken rule.
    #[error("Validation failed")]
    Validation(Vec<String>),
    /// Missing, invalid, or expired bearer token.
    #[error("{0}")]
    Unauthorized(&'static str),
    /// Valid token, insufficient role.
    #[error("Access denied")]
    Forbidden,
    /// Resource absent.
    #[error("{0}")]
    NotFound(&'static str),
    /// Identifier not in the store's expected shape.
    #[error("{0}")]
    InvalidId(&'static str),
    /// Duplicate username or email.
    #[error("{0}")]
    Conflict(&'static str),
    /// Unexpected store or runtime failure.
    #[error("Something went wrong!")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Validation(_) | ApiError::InvalidId(_) | ApiError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // A single broken rule reads as a plain message; several are
        // enumerated under "errors" alongside a generic message.
        let body = match &self {
            ApiError::Validation(rules) if rules.len() == 1 => {
                json!({ "message": rules[0] })
            }
            ApiError::Validation(rules) => {
                json!({ "message": "Validation failed", "errors": rules })
            }
            other => json!({ "message": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// RepositoryError
///
/// Failures surfaced by the persistence layer. Uniqueness violations are
/// recognized so the handlers can answer with a `Conflict` instead of a
/// generic 500; everything else stays an opaque database error.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("duplicate value for {0}")]
    Duplicate(&'static str),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Duplicate("email") => ApiError::Conflict("Email is already registered"),
            RepositoryError::Duplicate(_) => ApiError::Conflict("Username is already taken"),
            RepositoryError::Database(e) => {
                tracing::error!("repository error: {:?}", e);
                ApiError::Internal
            }
        }
    }
}
