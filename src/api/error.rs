use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::DbError;
use crate::error::Error;

/// API error codes for client handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    Unauthorized,
    Forbidden,
    Conflict,
    ValidationError,
    DatabaseError,
    InternalError,
}

/// Standard API error response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: String,
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code,
            details: None,
        }
    }
}

pub type ApiResult<T> = Result<T, AppError>;

/// Application error that converts to HTTP responses
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub body: ApiError,
}

impl AppError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiError::new(code, message),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::ValidationError, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, ErrorCode::NotFound, format!("{} not found", msg)),
            Error::Forbidden(msg) => Self::new(StatusCode::FORBIDDEN, ErrorCode::Forbidden, msg),
            Error::Validation(msg) => Self::validation(msg),
            Error::Conflict(msg) => Self::new(StatusCode::CONFLICT, ErrorCode::Conflict, msg),
            Error::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, "Internal server error")
            }
            Error::Store(err) => {
                tracing::error!("Database error: {}", err);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError, "Database error")
            }
        }
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        Error::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_for_each_kind() {
        let cases = [
            (Error::NotFound("Task 1".into()), StatusCode::NOT_FOUND, ErrorCode::NotFound),
            (Error::Forbidden("no".into()), StatusCode::FORBIDDEN, ErrorCode::Forbidden),
            (Error::Validation("bad".into()), StatusCode::BAD_REQUEST, ErrorCode::ValidationError),
            (Error::Conflict("dup".into()), StatusCode::CONFLICT, ErrorCode::Conflict),
            (Error::Store(DbError::Lock("poisoned".into())), StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError),
        ];
        for (err, status, code) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status, status);
            assert_eq!(app.body.code, code);
        }
    }

    #[test]
    fn error_body_shape() {
        let body = serde_json::to_value(ApiError::new(ErrorCode::ValidationError, "bad status")).unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"], "bad status");
        assert!(body.get("details").is_none());
    }
}
