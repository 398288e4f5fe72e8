//! Bearer-token sessions and the request extractor that enforces them.

pub mod password;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub use password::{hash_password, verify_password};

/// Snapshot of the account taken at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
    pub is_staff: bool,
}

#[derive(Debug)]
struct SessionEntry {
    user: AuthenticatedUser,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct AuthManager {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    ttl: ChronoDuration,
}

impl AuthManager {
    #[must_use]
    pub fn new(token_ttl_hours: i64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: ChronoDuration::hours(token_ttl_hours),
        }
    }

    /// Opens a session and returns its opaque token.
    pub async fn issue(&self, user: AuthenticatedUser) -> (String, DateTime<Utc>) {
        let mut buf = [0u8; 32];
        OsRng.fill_bytes(&mut buf);
        let token = URL_SAFE_NO_PAD.encode(buf);
        let expires_at = Utc::now() + self.ttl;
        let mut sessions = self.sessions.write().await;
        sessions.insert(token.clone(), SessionEntry { user, expires_at });
        (token, expires_at)
    }

    pub async fn resolve(&self, token: &str) -> Option<AuthenticatedUser> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get(token)?;
        if entry.expires_at <= Utc::now() {
            sessions.remove(token);
            return None;
        }
        Some(entry.user.clone())
    }

    /// Returns whether a session was removed.
    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    pub async fn prune_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.expires_at > now);
        before - sessions.len()
    }
}

/// Extractor for routes that require a logged-in user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: AuthenticatedUser,
    pub token: String,
}

impl AuthUser {
    /// # Errors
    ///
    /// Returns `Forbidden` when the account is not staff.
    pub fn require_staff(&self) -> AppResult<()> {
        if self.user.is_staff {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You do not have permission to perform this action.".to_string(),
            ))
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AuthManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let manager = Arc::<AuthManager>::from_ref(state);
        let token = bearer_token(parts).ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided.".to_string())
        })?;
        let user = manager
            .resolve(&token)
            .await
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token.".to_string()))?;
        Ok(Self { user, token })
    }
}
