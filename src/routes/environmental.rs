use axum::{extract::State, response::Response};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::cache;
use super::params::{RawQuery, RequestParams, WindowQuery};
use crate::analysis::grouping::{Accumulator, GroupBy, Observation, PeriodKey, group, month_name};
use crate::analysis::round2;
use crate::analysis::window::{FiltersApplied, TimeWindow};
use crate::auth::AuthUser;
use crate::common::AppState;
use crate::entity::environmental_data;
use crate::error::AppResult;
use crate::metrics::{Metric, SoilDepth};
use crate::services::series::{self, MonthCount};

/// Metrics reported per month by the monthly summary.
pub const MONTHLY_SUMMARY_METRICS: [Metric; 8] = [
    Metric::AirTemperature,
    Metric::RelativeHumidity,
    Metric::ShortwaveRadiation,
    Metric::SoilTemperature(SoilDepth::Cm5),
    Metric::WindSpeed,
    Metric::SnowDepth,
    Metric::AtmosphericPressure,
    Metric::Rainfall,
];

#[derive(Debug, Serialize, ToSchema)]
pub struct RecordsResponse {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<environmental_data::Model>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters_applied: Option<FiltersApplied>,
}

/// max/min/mean/std of one metric over one month. Accumulating metrics
/// report `total` in place of `min`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlyMetricStats {
    pub max: Option<f64>,
    /// Absent for accumulating metrics; null for empty months.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<f64>)]
    pub min: Option<Option<f64>>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

impl MonthlyMetricStats {
    fn from_accumulator(acc: Option<&Accumulator>, accumulates: bool) -> Self {
        let acc = acc.filter(|a| !a.is_empty());
        Self {
            max: acc.map(|a| round2(a.max)),
            min: (!accumulates).then(|| acc.map(|a| round2(a.min))),
            mean: acc.and_then(Accumulator::mean).map(round2),
            std: acc.and_then(Accumulator::std_dev).map(round2),
            total: acc.filter(|_| accumulates).map(|a| round2(a.sum)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: i32,
    pub month_name: String,
    pub record_count: i64,
    /// Keyed by metric key.
    pub metrics: BTreeMap<String, MonthlyMetricStats>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlySummaryResponse {
    pub success: bool,
    pub data: Vec<MonthlySummary>,
    pub total_months: usize,
    pub filters_applied: FiltersApplied,
}

/// Joins per-month record counts with per-metric monthly accumulators.
#[must_use]
pub fn monthly_summary(counts: &[MonthCount], series: &[(Metric, Vec<Observation>)]) -> Vec<MonthlySummary> {
    let grouped: Vec<(Metric, BTreeMap<PeriodKey, Accumulator>)> = series
        .iter()
        .map(|(metric, observations)| (*metric, group(observations, GroupBy::Month)))
        .collect();

    counts
        .iter()
        .map(|count| {
            let key = PeriodKey::Month {
                year: count.year,
                month: count.month,
            };
            let metrics = grouped
                .iter()
                .map(|(metric, buckets)| {
                    (
                        metric.key().to_string(),
                        MonthlyMetricStats::from_accumulator(buckets.get(&key), metric.accumulates()),
                    )
                })
                .collect();
            MonthlySummary {
                year: count.year,
                month: count.month,
                month_name: month_name(count.month).unwrap_or_default().to_string(),
                record_count: count.record_count,
                metrics,
            }
        })
        .collect()
}

/// Latest records
///
/// Full rows inside the window, most recent first, bounded by `limit`.
#[utoipa::path(
    get,
    path = "/api/environmental/",
    params(WindowQuery, RawQuery),
    responses(
        (status = 200, description = "Latest records", body = RecordsResponse),
        (status = 400, description = "Invalid window or limit"),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer" = [])),
    tag = "environmental"
)]
pub async fn list_records(
    State(state): State<AppState>,
    _user: AuthUser,
    params: RequestParams,
) -> AppResult<Response> {
    let limit = params.limit(state.config.raw_default_limit, state.config.raw_max_limit)?;
    let window = series::resolve_window(&state.db, params.window()?).await?;

    let key = cache::cache_key(
        "records",
        &[&limit.to_string(), &window.cache_components().join(",")],
    );
    let db = &state.db;
    cache::cached_json(&state, key, &window, move || async move {
        let data = series::latest_records(db, &window, limit).await?;
        Ok(RecordsResponse {
            success: true,
            count: data.len(),
            data,
            limit: Some(limit),
            filters_applied: Some(window.filters_applied()),
        })
    })
    .await
}

/// Public sample
///
/// The 40 most recent records with snow depth, humidity, rainfall and 5 cm
/// soil temperature all present. No authentication required.
#[utoipa::path(
    get,
    path = "/api/environmental/sample/",
    responses(
        (status = 200, description = "Sample records", body = RecordsResponse),
    ),
    tag = "environmental"
)]
pub async fn sample_records(State(state): State<AppState>) -> AppResult<Response> {
    let window = TimeWindow::default();
    let db = &state.db;
    cache::cached_json(&state, "sample".to_string(), &window, move || async move {
        let data = series::sample_records(db).await?;
        Ok(RecordsResponse {
            success: true,
            count: data.len(),
            data,
            limit: None,
            filters_applied: None,
        })
    })
    .await
}

/// Monthly summary
///
/// Record counts and per-metric statistics for every month in the window.
#[utoipa::path(
    get,
    path = "/api/environmental/monthly-summary/",
    params(WindowQuery),
    responses(
        (status = 200, description = "One entry per month", body = MonthlySummaryResponse),
        (status = 400, description = "Invalid window"),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer" = [])),
    tag = "environmental"
)]
pub async fn monthly_summary_handler(
    State(state): State<AppState>,
    _user: AuthUser,
    params: RequestParams,
) -> AppResult<Response> {
    let window = series::resolve_window(&state.db, params.window()?).await?;

    let key = cache::cache_key("monthly-summary", &[&window.cache_components().join(",")]);
    let db = &state.db;
    cache::cached_json(&state, key, &window, move || async move {
        let (counts, loaded) = tokio::try_join!(
            series::monthly_counts(db, &window),
            series::load_many(db, &window, &MONTHLY_SUMMARY_METRICS),
        )?;
        let data = monthly_summary(&counts, &loaded);
        Ok(MonthlySummaryResponse {
            success: true,
            total_months: data.len(),
            data,
            filters_applied: window.filters_applied(),
        })
    })
    .await
}
