use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;

use crate::auth::{AuthUser, AuthenticatedUser};
use crate::common::AppState;
use crate::error::AppResult;
use crate::services::accounts::{self, IssuedCode};
use crate::services::mail;

use super::types::{
    LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RegisterResponse,
    ResendCodeRequest, ResendCodeResponse, UserResponse, UserWrapper, VerifyEmailRequest,
};

/// Mails a verification code. Delivery failures are logged, never raised.
async fn send_code(state: &AppState, to: &str, issued: &IssuedCode, is_resend: bool) -> bool {
    let content = mail::verification_email(
        &issued.code,
        issued.expires_at,
        state.config.verification_code_ttl_minutes,
        is_resend,
    );
    match state.mailer.send(to, &content).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(to = %to, error = %e, "verification_email_failed");
            false
        }
    }
}

/// Register a new account
///
/// Creates an inactive account and mails a 6-digit code valid for 10 minutes.
#[utoipa::path(
    post,
    path = "/api/auth/register/",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Malformed email, blank password or duplicate account"),
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let (user, issued) = accounts::register(
        &state.db,
        &body.email,
        &body.password,
        state.config.verification_code_ttl_minutes,
    )
    .await?;
    let email_sent = send_code(&state, &user.email, &issued, false).await;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "User created successfully. Please check your email for the verification code."
                .to_string(),
            user_id: user.id,
            email: user.email,
            email_sent,
        }),
    ))
}

/// Verify an email address
#[utoipa::path(
    post,
    path = "/api/auth/verify-email/",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Account activated", body = MessageResponse),
        (status = 400, description = "Unknown email, wrong or expired code"),
    ),
    tag = "auth"
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(body): Json<VerifyEmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    accounts::verify(&state.db, &body.email, &body.code, Utc::now()).await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

/// Send a new verification code
///
/// Any earlier code stops working.
#[utoipa::path(
    post,
    path = "/api/auth/resend-code/",
    request_body = ResendCodeRequest,
    responses(
        (status = 200, description = "New code issued", body = ResendCodeResponse),
        (status = 400, description = "Unknown or already verified email"),
    ),
    tag = "auth"
)]
pub async fn resend_code(
    State(state): State<AppState>,
    Json(body): Json<ResendCodeRequest>,
) -> AppResult<Json<ResendCodeResponse>> {
    let (user, issued) = accounts::reissue(
        &state.db,
        &body.email,
        state.config.verification_code_ttl_minutes,
    )
    .await?;
    let email_sent = send_code(&state, &user.email, &issued, true).await;

    let message = if email_sent {
        "New verification code sent to your email"
    } else {
        "New verification code generated but the email could not be sent"
    };
    Ok(Json(ResendCodeResponse {
        success: true,
        message: message.to_string(),
        email_sent,
    }))
}

/// Log in
///
/// Returns a bearer token for the `Authorization` header.
#[utoipa::path(
    post,
    path = "/api/auth/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = LoginResponse),
        (status = 401, description = "Wrong email or password"),
        (status = 403, description = "Email not verified"),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = accounts::authenticate(&state.db, &body.email, &body.password).await?;
    let (token, expires_at) = state
        .auth
        .issue(AuthenticatedUser {
            id: user.id,
            email: user.email.clone(),
            is_staff: user.is_staff,
        })
        .await;
    tracing::info!(user_id = %user.id, "user_logged_in");

    Ok(Json(LoginResponse {
        success: true,
        token,
        token_type: "Bearer",
        expires_at,
        user: UserResponse::from(&user),
    }))
}

/// Current user
#[utoipa::path(
    get,
    path = "/api/auth/me/",
    responses(
        (status = 200, description = "Logged-in user", body = UserWrapper),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(auth: AuthUser) -> Json<UserWrapper> {
    Json(UserWrapper {
        success: true,
        user: auth.user.into(),
    })
}

/// Log out
#[utoipa::path(
    post,
    path = "/api/auth/logout/",
    responses(
        (status = 200, description = "Session closed", body = MessageResponse),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> Json<MessageResponse> {
    state.auth.revoke(&auth.token).await;
    tracing::info!(user_id = %auth.user.id, "user_logged_out");
    Json(MessageResponse::new("Logged out"))
}

/// Staff dashboard
#[utoipa::path(
    get,
    path = "/api/admin/dashboard/",
    responses(
        (status = 200, description = "Staff greeting", body = MessageResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not a staff account"),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn admin_dashboard(auth: AuthUser) -> AppResult<Json<MessageResponse>> {
    auth.require_staff()?;
    Ok(Json(MessageResponse::new("Welcome, Admin!")))
}
