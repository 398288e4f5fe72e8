use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::analysis::ParamError;
use crate::auth::password::PasswordError;
use crate::services::accounts::VerifyError;
use crate::services::mail::MailError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid {param}: {reason}")]
    InvalidParam { param: String, reason: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),
}

impl AppError {
    #[must_use]
    pub fn invalid(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            param: param.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidParam { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal(_) | Self::Config(_) | Self::Mail(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ParamError> for AppError {
    fn from(err: ParamError) -> Self {
        Self::InvalidParam {
            param: err.param.to_string(),
            reason: err.reason,
        }
    }
}

impl From<VerifyError> for AppError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Database(e) => Self::Database(e),
            VerifyError::Hashing(msg) => Self::Internal(msg),
            VerifyError::InvalidCredentials => {
                Self::Unauthorized(VerifyError::InvalidCredentials.to_string())
            }
            VerifyError::Inactive => Self::Forbidden(VerifyError::Inactive.to_string()),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::InvalidParam { param, .. } => json!({
                "success": false,
                "error": self.to_string(),
                "param": param,
            }),
            Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::ServiceUnavailable(msg) => json!({
                "success": false,
                "error": msg,
            }),
            Self::Database(e) => {
                tracing::error!("Database error: {e:?}");
                json!({ "success": false, "error": "Database error" })
            }
            Self::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                json!({ "success": false, "error": "Internal server error" })
            }
            Self::Config(e) => {
                tracing::error!("Config error: {e:?}");
                json!({ "success": false, "error": "Configuration error" })
            }
            Self::Mail(e) => {
                tracing::error!("Mail error: {e}");
                json!({ "success": false, "error": "Failed to send email" })
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
