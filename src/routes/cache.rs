//! Response caching for data endpoints.
//!
//! Entries are keyed by endpoint and canonical query string and stamped with
//! `MAX(id)` of `environmental_data` at computation time.
//!
//! | Window | Invalidation |
//! |--------|--------------|
//! | Closed (end date or year before today) | TTL only |
//! | Open | TTL + watermark check via `MAX(id)` |

use axum::{
    http::{HeaderValue, header},
    response::Response,
};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

use crate::analysis::window::TimeWindow;
use crate::common::{AppState, CachedResponse};
use crate::error::{AppError, AppResult};
use crate::services::series;

/// Build a cache key from a prefix and components.
///
/// Components are joined with `:`. Empty components are kept so that
/// different queries produce different keys.
#[must_use]
pub fn cache_key(prefix: &str, components: &[&str]) -> String {
    let mut key = prefix.to_string();
    for c in components {
        key.push(':');
        key.push_str(c);
    }
    key
}

/// Whether a cached entry stamped with `cached_max_id` may still be served.
#[must_use]
pub fn is_fresh(window: &TimeWindow, cached_max_id: Option<i32>, latest_max_id: Option<i32>) -> bool {
    window.is_closed(Utc::now().date_naive()) || cached_max_id == latest_max_id
}

/// Cached bytes for `cache_key`, dropping the entry when new rows have arrived
/// for an open window.
pub async fn get_cached(
    state: &AppState,
    cache_key: &str,
    window: &TimeWindow,
) -> Option<Arc<Vec<u8>>> {
    let cached = state.response_cache.get(cache_key).await?;

    if !window.is_closed(Utc::now().date_naive())
        && let Ok(latest) = series::latest_id(&state.db).await
        && !is_fresh(window, cached.max_id, latest)
    {
        tracing::debug!(
            cache_key = %cache_key,
            cached_max_id = ?cached.max_id,
            latest_max_id = ?latest,
            "cache_stale"
        );
        state.response_cache.invalidate(cache_key).await;
        return None;
    }

    tracing::debug!(cache_key = %cache_key, "cache_hit");
    Some(cached.data.clone())
}

pub async fn store_cached(state: &AppState, cache_key: String, data: Vec<u8>, max_id: Option<i32>) {
    let size = data.len();
    state
        .response_cache
        .insert(
            cache_key.clone(),
            CachedResponse {
                data: Arc::new(data),
                max_id,
            },
        )
        .await;

    tracing::debug!(cache_key = %cache_key, size_bytes = size, max_id = ?max_id, "cache_stored");
}

/// Build a JSON response with an `X-Cache` header.
///
/// # Errors
///
/// Returns `AppError::Internal` if the response cannot be assembled.
pub fn json_response(data: Vec<u8>, cache_hit: bool) -> AppResult<Response> {
    let cache_header = if cache_hit { "HIT" } else { "MISS" };
    Response::builder()
        .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .header("X-Cache", HeaderValue::from_static(cache_header))
        .body(axum::body::Body::from(data))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Serialize and cache a response, then return it.
///
/// # Errors
///
/// Returns `AppError::Internal` if serialization fails.
pub async fn cache_and_respond<T: Serialize>(
    state: &AppState,
    cache_key: String,
    response: &T,
    max_id: Option<i32>,
) -> AppResult<Response> {
    let json_bytes = serde_json::to_vec(response).map_err(|e| AppError::Internal(e.to_string()))?;
    store_cached(state, cache_key, json_bytes.clone(), max_id).await;
    json_response(json_bytes, false)
}

/// Serves `cache_key` from cache or computes, stores and returns a fresh response.
///
/// The watermark is read before computing, so rows that land mid-computation
/// make the entry stale rather than hiding them.
///
/// # Errors
///
/// Propagates errors from `compute` and the watermark query.
pub async fn cached_json<T, F, Fut>(
    state: &AppState,
    cache_key: String,
    window: &TimeWindow,
    compute: F,
) -> AppResult<Response>
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    if let Some(cached) = get_cached(state, &cache_key, window).await {
        return json_response((*cached).clone(), true);
    }
    let max_id = series::latest_id(&state.db).await?;
    let response = compute().await?;
    cache_and_respond(state, cache_key, &response, max_id).await
}
