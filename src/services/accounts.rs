//! Account registration, email verification and login.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::auth::password::{self, PasswordError};
use crate::entity::{users, verification_requests};

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Email already registered.")]
    EmailTaken,
    #[error("Enter a valid email address.")]
    MalformedEmail,
    #[error("Password cannot be blank")]
    BlankPassword,
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Incorrect verification code")]
    IncorrectCode,
    #[error("Verification code expired")]
    Expired,
    #[error("User not found")]
    UserNotFound,
    #[error("Email is already verified")]
    AlreadyVerified,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account is not active. Verify your email first.")]
    Inactive,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl From<PasswordError> for VerifyError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::Blank => Self::BlankPassword,
            other => Self::Hashing(other.to_string()),
        }
    }
}

/// A freshly issued verification code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCode {
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedCode {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>, ttl_minutes: i64) -> Self {
        Self {
            code: rng.gen_range(100_000..=999_999).to_string(),
            issued_at: now,
            expires_at: now + ChronoDuration::minutes(ttl_minutes),
        }
    }
}

fn issue_code(ttl_minutes: i64) -> IssuedCode {
    IssuedCode::generate(&mut rand::thread_rng(), Utc::now(), ttl_minutes)
}

/// Lowercased, trimmed address.
#[must_use]
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// `local@domain.tld` with no whitespace; deliverability is the mail server's problem.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Checks a submitted code against the stored request. A wrong code is
/// reported as incorrect even when the stored one has also expired.
///
/// # Errors
///
/// Returns [`VerifyError::IncorrectCode`] or [`VerifyError::Expired`].
pub fn check_code(
    request: &verification_requests::Model,
    submitted: &str,
    now: DateTime<Utc>,
) -> Result<(), VerifyError> {
    let Some(stored) = request.code.as_deref() else {
        return Err(VerifyError::IncorrectCode);
    };
    if stored != submitted.trim() {
        return Err(VerifyError::IncorrectCode);
    }
    match request.expires_at {
        Some(expires_at) if now <= expires_at => Ok(()),
        _ => Err(VerifyError::Expired),
    }
}

async fn find_user(db: &DatabaseConnection, email: &str) -> Result<Option<users::Model>, DbErr> {
    users::Entity::find()
        .filter(users::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await
}

async fn hash_blocking(raw: String) -> Result<String, VerifyError> {
    tokio::task::spawn_blocking(move || password::hash_password(&raw))
        .await
        .map_err(|e| VerifyError::Hashing(e.to_string()))?
        .map_err(VerifyError::from)
}

async fn verify_blocking(raw: String, hash: String) -> Result<bool, VerifyError> {
    tokio::task::spawn_blocking(move || password::verify_password(&raw, &hash))
        .await
        .map_err(|e| VerifyError::Hashing(e.to_string()))
}

/// Creates an inactive account and its first verification code in one transaction.
///
/// # Errors
///
/// Fails on malformed or duplicate emails, blank passwords and database errors.
pub async fn register(
    db: &DatabaseConnection,
    email: &str,
    raw_password: &str,
    ttl_minutes: i64,
) -> Result<(users::Model, IssuedCode), VerifyError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(VerifyError::MalformedEmail);
    }
    if raw_password.trim().is_empty() {
        return Err(VerifyError::BlankPassword);
    }
    if find_user(db, &email).await?.is_some() {
        return Err(VerifyError::EmailTaken);
    }

    let password_hash = hash_blocking(raw_password.to_string()).await?;
    let issued = issue_code(ttl_minutes);

    let txn = db.begin().await?;
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(password_hash),
        is_active: Set(false),
        is_staff: Set(false),
        email_verified: Set(false),
        created_at: Set(issued.issued_at.into()),
        last_login_at: Set(None),
    }
    .insert(&txn)
    .await?;

    verification_requests::ActiveModel {
        user_id: Set(user.id),
        code: Set(Some(issued.code.clone())),
        expires_at: Set(Some(issued.expires_at.into())),
        verified: Set(false),
        issued_at: Set(issued.issued_at.into()),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(user_id = %user.id, "user_registered");
    Ok((user, issued))
}

/// Activates the account when `code` matches and is still valid, then clears it.
///
/// # Errors
///
/// See [`VerifyError`]; unknown addresses report `InvalidEmail`.
pub async fn verify(
    db: &DatabaseConnection,
    email: &str,
    code: &str,
    now: DateTime<Utc>,
) -> Result<users::Model, VerifyError> {
    let user = find_user(db, email).await?.ok_or(VerifyError::InvalidEmail)?;
    let request = verification_requests::Entity::find_by_id(user.id)
        .one(db)
        .await?
        .ok_or(VerifyError::IncorrectCode)?;
    check_code(&request, code, now)?;

    let txn = db.begin().await?;
    let mut active_user = user.into_active_model();
    active_user.is_active = Set(true);
    active_user.email_verified = Set(true);
    let user = active_user.update(&txn).await?;

    let mut active_request = request.into_active_model();
    active_request.code = Set(None);
    active_request.expires_at = Set(None);
    active_request.verified = Set(true);
    active_request.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(user_id = %user.id, "email_verified");
    Ok(user)
}

/// Replaces any outstanding code with a new one.
///
/// # Errors
///
/// `UserNotFound` for unknown addresses, `AlreadyVerified` for verified accounts.
pub async fn reissue(
    db: &DatabaseConnection,
    email: &str,
    ttl_minutes: i64,
) -> Result<(users::Model, IssuedCode), VerifyError> {
    let user = find_user(db, email).await?.ok_or(VerifyError::UserNotFound)?;
    if user.email_verified {
        return Err(VerifyError::AlreadyVerified);
    }

    let issued = issue_code(ttl_minutes);
    let row = verification_requests::ActiveModel {
        user_id: Set(user.id),
        code: Set(Some(issued.code.clone())),
        expires_at: Set(Some(issued.expires_at.into())),
        verified: Set(false),
        issued_at: Set(issued.issued_at.into()),
    };
    verification_requests::Entity::insert(row)
        .on_conflict(
            OnConflict::column(verification_requests::Column::UserId)
                .update_columns([
                    verification_requests::Column::Code,
                    verification_requests::Column::ExpiresAt,
                    verification_requests::Column::Verified,
                    verification_requests::Column::IssuedAt,
                ])
                .to_owned(),
        )
        .exec(db)
        .await?;

    tracing::info!(user_id = %user.id, "verification_code_reissued");
    Ok((user, issued))
}

/// Checks credentials and stamps `last_login_at`.
///
/// # Errors
///
/// `InvalidCredentials` for unknown users or wrong passwords, `Inactive` for
/// accounts that never verified their email.
pub async fn authenticate(
    db: &DatabaseConnection,
    email: &str,
    raw_password: &str,
) -> Result<users::Model, VerifyError> {
    let user = find_user(db, email)
        .await?
        .ok_or(VerifyError::InvalidCredentials)?;
    if !verify_blocking(raw_password.to_string(), user.password_hash.clone()).await? {
        return Err(VerifyError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(VerifyError::Inactive);
    }

    let mut active = user.into_active_model();
    active.last_login_at = Set(Some(Utc::now().into()));
    Ok(active.update(db).await?)
}
