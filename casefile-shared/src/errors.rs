use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{service}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E5xxx: Notification errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    Unauthorized,
    MethodNotAllowed,

    // Notification (E5xxx)
    PayloadMissing,
    PayloadMalformed,
    CronSecretInvalid,
    RecipientQueryFailed,
    ContentQueryFailed,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::Unauthorized => "E0004",
            Self::MethodNotAllowed => "E0005",

            // Notification
            Self::PayloadMissing => "E5001",
            Self::PayloadMalformed => "E5002",
            Self::CronSecretInvalid => "E5003",
            Self::RecipientQueryFailed => "E5004",
            Self::ContentQueryFailed => "E5005",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError | Self::RecipientQueryFailed | Self::ContentQueryFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::PayloadMissing | Self::PayloadMalformed => StatusCode::BAD_REQUEST,
            Self::Unauthorized | Self::CronSecretInvalid => StatusCode::UNAUTHORIZED,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known { code: ErrorCode, message: String },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("database pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MethodNotAllowed, message)
    }

    /// The HTTP status this error renders with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Known { code, .. } => code.status_code(),
            AppError::Internal(_) | AppError::Database(_) | AppError::Pool(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let internal = ErrorCode::InternalError.code();
        let error_response = match &self {
            AppError::Known { code, message } => ApiErrorResponse::new(code.code(), message),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                ApiErrorResponse::new(internal, "internal server error")
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                ApiErrorResponse::new(internal, "database error")
            }
            AppError::Pool(err) => {
                tracing::error!(error = %err, "failed to get db connection");
                ApiErrorResponse::new(internal, "database connection error")
            }
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
