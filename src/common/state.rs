use axum::extract::FromRef;
use moka::future::Cache;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::auth::AuthManager;
use crate::config::Config;
use crate::services::mail::Mailer;

/// Cached response with the sensor-table watermark it was computed against.
#[derive(Clone)]
pub struct CachedResponse {
    pub data: Arc<Vec<u8>>,
    /// `MAX(id)` of `environmental_data` when the entry was stored.
    pub max_id: Option<i32>,
}

/// Cache for API responses. Key is request params, value is serialized response + metadata.
/// Weighted by byte size to enforce memory limit.
pub type ResponseCache = Cache<String, CachedResponse>;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub auth: Arc<AuthManager>,
    pub mailer: Arc<Mailer>,
    pub response_cache: ResponseCache,
    /// Permits for concurrent bulk downloads.
    pub bulk_permits: Arc<Semaphore>,
}

impl AppState {
    #[must_use]
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        // Cache weighted by byte size, not entry count
        let cache: ResponseCache = Cache::builder()
            .weigher(|_key: &String, value: &CachedResponse| -> u32 {
                value.data.len().try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(config.cache_max_bytes)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();

        Self {
            db,
            auth: Arc::new(AuthManager::new(config.session_ttl_hours)),
            mailer: Arc::new(Mailer::new(config.smtp.clone())),
            bulk_permits: Arc::new(Semaphore::new(config.bulk_concurrent_limit)),
            config: Arc::new(config),
            response_cache: cache,
        }
    }
}

impl FromRef<AppState> for Arc<AuthManager> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}
