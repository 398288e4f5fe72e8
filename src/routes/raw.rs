use axum::{
    extract::{Path, State},
    response::Response,
};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::averaged::path_metric;
use super::cache;
use super::params::{MetricsQuery, RawQuery, RequestParams, WindowQuery};
use crate::analysis::grouping::Observation;
use crate::analysis::window::FiltersApplied;
use crate::auth::AuthUser;
use crate::common::AppState;
use crate::error::AppResult;
use crate::metrics::{MULTI_METRIC_DEFAULTS, Metric, MetricInfo};
use crate::services::series;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SeriesPoint {
    /// `YYYY-MM-DD HH:MM:SS` as stored.
    pub timestamp: String,
    pub value: f64,
}

impl From<&Observation> for SeriesPoint {
    fn from(obs: &Observation) -> Self {
        Self {
            timestamp: format!("{:04}-{:02}-{:02} {}", obs.year, obs.month, obs.day, obs.time),
            value: obs.value,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RawDataResponse {
    pub success: bool,
    pub metrics: Vec<MetricInfo>,
    /// Points keyed by metric key, in time order.
    pub data: BTreeMap<String, Vec<SeriesPoint>>,
    /// Records read before splitting into per-metric series.
    pub total_records: usize,
    pub limit: u64,
    pub filters_applied: FiltersApplied,
}

/// Raw points for one metric
#[utoipa::path(
    get,
    path = "/api/raw-data/{metric}/",
    params(
        ("metric" = String, Path, description = "Metric key or slug"),
        WindowQuery,
        RawQuery,
    ),
    responses(
        (status = 200, description = "Raw points", body = RawDataResponse),
        (status = 400, description = "Invalid metric, window or limit"),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer" = [])),
    tag = "raw"
)]
pub async fn get_raw_metric(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(segment): Path<String>,
    params: RequestParams,
) -> AppResult<Response> {
    let metric = path_metric(&segment, &params)?;
    let limit = params.limit(state.config.raw_default_limit, state.config.raw_max_limit)?;
    let window = series::resolve_window(&state.db, params.window()?).await?;

    let key = cache::cache_key(
        "raw",
        &[
            metric.key(),
            &limit.to_string(),
            &params.canonical(),
            &window.cache_components().join(","),
        ],
    );
    let db = &state.db;
    cache::cached_json(&state, key, &window, move || async move {
        let observations = series::load_series(db, &window, metric, Some(limit)).await?;
        let points: Vec<SeriesPoint> = observations.iter().map(SeriesPoint::from).collect();
        Ok(RawDataResponse {
            success: true,
            metrics: vec![metric.info()],
            total_records: points.len(),
            data: BTreeMap::from([(metric.key().to_string(), points)]),
            limit,
            filters_applied: window.filters_applied(),
        })
    })
    .await
}

/// Raw points for several metrics
///
/// Reads up to `limit` records that carry at least one requested metric and
/// splits them into one series per metric.
#[utoipa::path(
    get,
    path = "/api/raw-data/multi-metric/",
    params(WindowQuery, MetricsQuery, RawQuery),
    responses(
        (status = 200, description = "Raw points keyed by metric", body = RawDataResponse),
        (status = 400, description = "Invalid metrics, window or limit"),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer" = [])),
    tag = "raw"
)]
pub async fn get_raw_multi_metric(
    State(state): State<AppState>,
    _user: AuthUser,
    params: RequestParams,
) -> AppResult<Response> {
    let metrics: Vec<Metric> = params
        .metrics("metrics")?
        .unwrap_or_else(|| MULTI_METRIC_DEFAULTS.to_vec());
    let limit = params.limit(state.config.raw_default_limit, state.config.raw_max_limit)?;
    let window = series::resolve_window(&state.db, params.window()?).await?;

    let metric_keys: Vec<&str> = metrics.iter().map(|m| m.key()).collect();
    let key = cache::cache_key(
        "raw-multi",
        &[
            &metric_keys.join(","),
            &limit.to_string(),
            &params.canonical(),
            &window.cache_components().join(","),
        ],
    );
    let db = &state.db;
    cache::cached_json(&state, key, &window, move || async move {
        let records = series::load_records(db, &window, &metrics, limit).await?;
        let mut data: BTreeMap<String, Vec<SeriesPoint>> = metrics
            .iter()
            .map(|m| (m.key().to_string(), Vec::new()))
            .collect();
        for record in &records {
            for metric in &metrics {
                if let Some(value) = metric.value(record)
                    && let Some(points) = data.get_mut(metric.key())
                {
                    points.push(SeriesPoint {
                        timestamp: record.timestamp_label(),
                        value,
                    });
                }
            }
        }
        Ok(RawDataResponse {
            success: true,
            metrics: metrics.iter().map(|m| m.info()).collect(),
            data,
            total_records: records.len(),
            limit,
            filters_applied: window.filters_applied(),
        })
    })
    .await
}
