use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use thiserror::Error;

use crate::api::response::{ApiResponse, ErrorDetail};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid student ID: {0}")]
    InvalidStudentId(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    ExpiredToken,

    #[error("Missing authentication token")]
    TokenNotFound,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed on {field:?}: {message}")]
    Validation {
        field: Option<String>,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: Some(field.to_string()),
            message: message.into(),
        }
    }

    /// Stable wire code from the closed error set.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "AUTH_001",
            AppError::InvalidEmail(_) => "AUTH_002",
            AppError::InvalidPassword(_) => "AUTH_003",
            AppError::InvalidStudentId(_) => "AUTH_004",
            AppError::InvalidToken(_) => "AUTH_005",
            AppError::ExpiredToken => "AUTH_006",
            AppError::TokenNotFound => "AUTH_007",
            AppError::Forbidden(_) => "AUTH_008",
            AppError::NotFound(_) => "RES_001",
            AppError::AlreadyExists(_) => "RES_002",
            AppError::Conflict(_) => "RES_004",
            AppError::Validation { .. } => "VAL_001",
            AppError::Config(_) | AppError::Internal(_) | AppError::Cancelled => "SRV_001",
            AppError::Database(_) => "SRV_002",
            AppError::ExternalService(_) => "SRV_003",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::InvalidToken(_)
            | AppError::ExpiredToken
            | AppError::TokenNotFound => StatusCode::UNAUTHORIZED,
            AppError::InvalidEmail(_)
            | AppError::InvalidPassword(_)
            | AppError::InvalidStudentId(_)
            | AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
            AppError::Config(_)
            | AppError::Internal(_)
            | AppError::Database(_)
            | AppError::ExternalService(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn severity(&self) -> &'static str {
        match self {
            AppError::Validation { .. }
            | AppError::InvalidEmail(_)
            | AppError::InvalidPassword(_)
            | AppError::InvalidStudentId(_) => "low",
            AppError::Cancelled => "medium",
            _ if self.is_server_error() => "high",
            _ => "medium",
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.code().starts_with("SRV_")
    }

    /// Message safe to show a client. Server-side failures never leak their detail.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Cancelled => "Request cancelled".to_string(),
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::ExternalService(_) => "An external service failed".to_string(),
            AppError::Config(_) | AppError::Internal(_) => {
                "An unexpected error occurred".to_string()
            }
            AppError::InvalidCredentials => "Invalid email or password".to_string(),
            AppError::InvalidToken(msg)
            | AppError::InvalidEmail(msg)
            | AppError::InvalidPassword(msg)
            | AppError::InvalidStudentId(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::ExpiredToken => "Token has expired".to_string(),
            AppError::TokenNotFound => "Missing authentication token".to_string(),
            AppError::NotFound(what) => format!("{} not found", what),
            AppError::AlreadyExists(what) => format!("{} already exists", what),
            AppError::Validation { message, .. } => message.clone(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

fn malformed_request(rejection: impl std::fmt::Display) -> AppError {
    AppError::Validation {
        field: None,
        message: rejection.to_string(),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        malformed_request(rejection)
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        malformed_request(rejection)
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        malformed_request(rejection)
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        malformed_request(rejection)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Background task failed: {}", err))
    }
}

// Axum IntoResponse implementation for HTTP errors
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        if self.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        } else {
            tracing::debug!(code = self.code(), "{}", self);
        }

        let field = match &self {
            AppError::Validation { field, .. } => field.clone(),
            _ => None,
        };
        let details = match &self {
            AppError::Cancelled => Some(serde_json::json!({ "reason": "Cancelled" })),
            _ => None,
        };

        let message = self.public_message();
        let body = ApiResponse::<()>::failure(ErrorDetail {
            code: self.code(),
            message,
            field,
            severity: self.severity(),
            details,
        });

        (self.status(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        assert_eq!(AppError::InvalidCredentials.code(), "AUTH_001");
        assert_eq!(AppError::ExpiredToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Conflict("x".into()).code(), "RES_004");
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::validation("content", "empty").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Cancelled.code(), "SRV_001");
    }

    #[test]
    fn test_server_errors_are_sanitized() {
        let err = AppError::Internal("disk at /var/secret is full".into());
        assert!(!err.public_message().contains("/var/secret"));
        assert!(err.is_server_error());

        let err = AppError::ExternalService("s3 bucket xyz".into());
        assert_eq!(err.code(), "SRV_003");
        assert!(!err.public_message().contains("xyz"));
    }
}
