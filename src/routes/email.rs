//! SMTP self-test endpoints for operators.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::AuthUser;
use crate::common::AppState;
use crate::error::{AppError, AppResult};
use crate::services::mail::{self, SmtpConfig};

/// Per-request SMTP settings; absent fields fall back to the server's.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SmtpOverride {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
}

impl SmtpOverride {
    #[must_use]
    pub fn apply(self, base: &SmtpConfig) -> SmtpConfig {
        SmtpConfig {
            host: self.host.unwrap_or_else(|| base.host.clone()),
            port: self.port.unwrap_or(base.port),
            username: self.username.unwrap_or_else(|| base.username.clone()),
            password: self.password.unwrap_or_else(|| base.password.clone()),
            from: self.from.unwrap_or_else(|| base.from.clone()),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TestEmailRequest {
    pub email: Option<String>,
    pub email_config: Option<SmtpOverride>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TestMultipleRequest {
    pub email: Option<String>,
    pub email_host: Option<String>,
    pub email_port: Option<u16>,
    pub email_host_user: Option<String>,
    pub email_host_password: Option<String>,
    pub default_from_email: Option<String>,
}

impl TestMultipleRequest {
    /// # Errors
    ///
    /// `BadRequest` when the account user or password is missing.
    pub fn smtp_config(&self) -> AppResult<SmtpConfig> {
        let (Some(username), Some(password)) = (
            self.email_host_user.as_deref().filter(|s| !s.trim().is_empty()),
            self.email_host_password.as_deref().filter(|s| !s.is_empty()),
        ) else {
            return Err(AppError::BadRequest(
                "email_host_user and email_host_password are required".to_string(),
            ));
        };
        let defaults = SmtpConfig::default();
        Ok(SmtpConfig {
            host: self
                .email_host
                .clone()
                .unwrap_or_else(|| "smtp.gmail.com".to_string()),
            port: self.email_port.unwrap_or(defaults.port),
            username: username.to_string(),
            password: password.to_string(),
            from: self.default_from_email.clone().unwrap_or(defaults.from),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TestEmailResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_account: Option<String>,
}

fn recipient(email: Option<&str>) -> AppResult<&str> {
    email
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::BadRequest("Email is required".to_string()))
}

/// Send a test email
#[utoipa::path(
    post,
    path = "/api/email/test/",
    request_body = TestEmailRequest,
    responses(
        (status = 200, description = "Delivered", body = TestEmailResponse),
        (status = 400, description = "Missing recipient"),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Delivery failed"),
    ),
    security(("bearer" = [])),
    tag = "email"
)]
pub async fn test_email(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(body): Json<TestEmailRequest>,
) -> AppResult<Json<TestEmailResponse>> {
    let to = recipient(body.email.as_deref())?;
    let config = body
        .email_config
        .unwrap_or_default()
        .apply(state.mailer.config());
    mail::send_with(&config, to, &mail::test_email(None)).await?;
    tracing::info!(to = %to, "test_email_sent");

    Ok(Json(TestEmailResponse {
        success: true,
        message: "Test email sent successfully".to_string(),
        used_account: None,
    }))
}

/// Send a test email through another account
#[utoipa::path(
    post,
    path = "/api/email/test-multiple/",
    request_body = TestMultipleRequest,
    responses(
        (status = 200, description = "Delivered", body = TestEmailResponse),
        (status = 400, description = "Missing recipient or credentials"),
        (status = 401, description = "Missing or invalid token"),
        (status = 500, description = "Delivery failed"),
    ),
    security(("bearer" = [])),
    tag = "email"
)]
pub async fn test_multiple(
    _user: AuthUser,
    Json(body): Json<TestMultipleRequest>,
) -> AppResult<Json<TestEmailResponse>> {
    let to = recipient(body.email.as_deref())?;
    let config = body.smtp_config()?;
    mail::send_with(&config, to, &mail::test_email(Some(&config.username))).await?;
    tracing::info!(to = %to, account = %config.username, "test_email_sent");

    Ok(Json(TestEmailResponse {
        success: true,
        message: "Test email sent successfully".to_string(),
        used_account: Some(config.username),
    }))
}
