//! Boxplot, histogram and correlation endpoints.
//!
//! Statistics always run over the full filtered set; only the histogram and
//! correlation sample, and both say so in their output.

use axum::{extract::State, response::Response};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::cache;
use super::params::{
    BoxplotQuery, CorrelationQuery, HistogramQuery, MetricsQuery, RequestParams, WindowQuery,
};
use crate::analysis::grouping::{GroupBy, MonthFormat, Observation};
use crate::analysis::stats::boxplot::{BoxplotSummary, PeriodBoxplot, boxplot, boxplot_by_period};
use crate::analysis::stats::correlation::{
    CorrelationMethod, CorrelationReport, correlation_report, parse_sample_size,
};
use crate::analysis::stats::histogram::{Histogram, histogram, parse_bins};
use crate::analysis::window::{FiltersApplied, TimeWindow};
use crate::auth::AuthUser;
use crate::common::AppState;
use crate::error::{AppError, AppResult};
use crate::metrics::{Metric, MetricInfo, STATISTICAL_DEFAULTS};
use crate::services::series;

#[derive(Debug, Serialize, ToSchema)]
pub struct BoxplotResponse {
    pub success: bool,
    pub metrics: Vec<MetricInfo>,
    pub include_outliers: bool,
    /// Overall summary per metric key; null when the metric has no values in the window.
    #[schema(value_type = Object)]
    pub data: BTreeMap<String, Option<BoxplotSummary>>,
    pub filters_applied: FiltersApplied,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PeriodBoxplotResponse {
    pub success: bool,
    pub metrics: Vec<MetricInfo>,
    pub group_by: GroupBy,
    pub include_outliers: bool,
    pub data: BTreeMap<String, Vec<PeriodBoxplot>>,
    pub filters_applied: FiltersApplied,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistogramResponse {
    pub success: bool,
    pub metrics: Vec<MetricInfo>,
    pub bins: usize,
    /// Histogram per metric key; null when the metric has no values in the window.
    #[schema(value_type = Object)]
    pub data: BTreeMap<String, Option<Histogram>>,
    pub filters_applied: FiltersApplied,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CorrelationResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: CorrelationReport,
    pub sample_size: usize,
    pub filters_applied: FiltersApplied,
}

fn requested_metrics(params: &RequestParams) -> AppResult<Vec<Metric>> {
    let named = match params.metrics("metrics")? {
        Some(metrics) => Some(metrics),
        None => params.metrics("metric")?,
    };
    Ok(named.unwrap_or_else(|| STATISTICAL_DEFAULTS.to_vec()))
}

fn values(observations: &[Observation]) -> Vec<f64> {
    observations.iter().map(|o| o.value).collect()
}

fn infos(metrics: &[Metric]) -> Vec<MetricInfo> {
    metrics.iter().map(|m| m.info()).collect()
}

fn stat_key(prefix: &str, params: &RequestParams, window: &TimeWindow) -> String {
    cache::cache_key(prefix, &[&params.canonical(), &window.cache_components().join(",")])
}

/// Runs the statistics math on the blocking pool; rank and sort work grows
/// with the sample and must not hold an async worker.
async fn compute_blocking<T, F>(task: F) -> AppResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| AppError::Internal(format!("statistics task failed: {e}")))
}

fn boxplots(
    loaded: &[(Metric, Vec<Observation>)],
    include_outliers: bool,
    warn_rows: usize,
) -> BTreeMap<String, Option<BoxplotSummary>> {
    loaded
        .iter()
        .map(|(metric, observations)| {
            if observations.len() > warn_rows {
                tracing::warn!(
                    metric = metric.key(),
                    rows = observations.len(),
                    "large_boxplot_input"
                );
            }
            (metric.key().to_string(), boxplot(&values(observations), include_outliers))
        })
        .collect()
}

fn period_boxplots(
    loaded: &[(Metric, Vec<Observation>)],
    group_by: GroupBy,
    month_format: MonthFormat,
    include_outliers: bool,
) -> BTreeMap<String, Vec<PeriodBoxplot>> {
    loaded
        .iter()
        .map(|(metric, observations)| {
            (
                metric.key().to_string(),
                boxplot_by_period(observations, group_by, month_format, include_outliers),
            )
        })
        .collect()
}

fn histograms(
    loaded: &[(Metric, Vec<Observation>)],
    bins: usize,
    sample_cap: usize,
) -> BTreeMap<String, Option<Histogram>> {
    let mut rng = rand::thread_rng();
    loaded
        .iter()
        .map(|(metric, observations)| {
            (
                metric.key().to_string(),
                histogram(&values(observations), bins, sample_cap, &mut rng),
            )
        })
        .collect()
}

fn correlations(
    loaded: Vec<(Metric, Vec<Observation>)>,
    method: CorrelationMethod,
    sample_size: usize,
    include_p_values: bool,
) -> CorrelationReport {
    let series = loaded
        .into_iter()
        .map(|(metric, observations)| (metric.key().to_string(), values(&observations)))
        .collect();
    correlation_report(series, method, sample_size, include_p_values, &mut rand::thread_rng())
}

/// Overall boxplot
///
/// One five-number summary per metric over the whole window. No period grouping.
#[utoipa::path(
    get,
    path = "/api/charts/statistical/boxplot/",
    params(WindowQuery, MetricsQuery, BoxplotQuery),
    responses(
        (status = 200, description = "Summary per metric", body = BoxplotResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer" = [])),
    tag = "statistics"
)]
pub async fn get_boxplot(
    State(state): State<AppState>,
    _user: AuthUser,
    params: RequestParams,
) -> AppResult<Response> {
    let metrics = requested_metrics(&params)?;
    let include_outliers = params.flag("include_outliers", true)?;
    let window = series::resolve_window(&state.db, params.window()?).await?;

    let key = stat_key("boxplot", &params, &window);
    let db = &state.db;
    let warn_rows = state.config.large_input_warn_rows;
    cache::cached_json(&state, key, &window, move || async move {
        let loaded = series::load_many(db, &window, &metrics).await?;
        let data =
            compute_blocking(move || boxplots(&loaded, include_outliers, warn_rows)).await?;
        Ok(BoxplotResponse {
            success: true,
            metrics: infos(&metrics),
            include_outliers,
            data,
            filters_applied: window.filters_applied(),
        })
    })
    .await
}

/// Boxplot per period
#[utoipa::path(
    get,
    path = "/api/charts/statistical/boxplot/periods/",
    params(WindowQuery, MetricsQuery, BoxplotQuery),
    responses(
        (status = 200, description = "Summaries per metric and period", body = PeriodBoxplotResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer" = [])),
    tag = "statistics"
)]
pub async fn get_boxplot_periods(
    State(state): State<AppState>,
    _user: AuthUser,
    params: RequestParams,
) -> AppResult<Response> {
    let metrics = requested_metrics(&params)?;
    let include_outliers = params.flag("include_outliers", true)?;
    let group_by = params.group_by(GroupBy::Month)?;
    let month_format = params.month_format()?;
    let window = series::resolve_window(&state.db, params.window()?).await?;

    let key = stat_key("boxplot-periods", &params, &window);
    let db = &state.db;
    cache::cached_json(&state, key, &window, move || async move {
        let loaded = series::load_many(db, &window, &metrics).await?;
        let data = compute_blocking(move || {
            period_boxplots(&loaded, group_by, month_format, include_outliers)
        })
        .await?;
        Ok(PeriodBoxplotResponse {
            success: true,
            metrics: infos(&metrics),
            group_by,
            include_outliers,
            data,
            filters_applied: window.filters_applied(),
        })
    })
    .await
}

/// Histogram
///
/// Equal-width bins over `[min, max]` per metric. Inputs above the sample cap
/// are sampled uniformly first and flagged `sampled: true`.
#[utoipa::path(
    get,
    path = "/api/charts/statistical/histogram/",
    params(WindowQuery, MetricsQuery, HistogramQuery),
    responses(
        (status = 200, description = "Histogram per metric", body = HistogramResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer" = [])),
    tag = "statistics"
)]
pub async fn get_histogram(
    State(state): State<AppState>,
    _user: AuthUser,
    params: RequestParams,
) -> AppResult<Response> {
    let metrics = requested_metrics(&params)?;
    let bins = parse_bins(params.get("bins"))?;
    let window = series::resolve_window(&state.db, params.window()?).await?;

    let key = stat_key("histogram", &params, &window);
    let db = &state.db;
    let sample_cap = state.config.histogram_sample_cap;
    cache::cached_json(&state, key, &window, move || async move {
        let loaded = series::load_many(db, &window, &metrics).await?;
        let data = compute_blocking(move || histograms(&loaded, bins, sample_cap)).await?;
        Ok(HistogramResponse {
            success: true,
            metrics: infos(&metrics),
            bins,
            data,
            filters_applied: window.filters_applied(),
        })
    })
    .await
}

/// Correlation matrix
///
/// Needs at least two metrics. When fewer than two carry data in the window
/// the response is successful with `insufficient_data: true`.
#[utoipa::path(
    get,
    path = "/api/charts/statistical/correlation/",
    params(WindowQuery, MetricsQuery, CorrelationQuery),
    responses(
        (status = 200, description = "Correlation report", body = CorrelationResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer" = [])),
    tag = "statistics"
)]
pub async fn get_correlation(
    State(state): State<AppState>,
    _user: AuthUser,
    params: RequestParams,
) -> AppResult<Response> {
    let metrics = requested_metrics(&params)?;
    if metrics.len() < 2 {
        return Err(AppError::invalid(
            "metrics",
            "at least two metrics are required for correlation",
        ));
    }
    let method = params
        .get("correlation_method")
        .map_or(Ok(CorrelationMethod::default()), CorrelationMethod::parse)?;
    let sample_size = parse_sample_size(params.get("sample_size"))?;
    let include_p_values = params.flag("include_p_values", true)?;
    let window = series::resolve_window(&state.db, params.window()?).await?;

    let key = stat_key("correlation", &params, &window);
    let db = &state.db;
    cache::cached_json(&state, key, &window, move || async move {
        let loaded = series::load_many(db, &window, &metrics).await?;
        let report = compute_blocking(move || {
            correlations(loaded, method, sample_size, include_p_values)
        })
        .await?;
        Ok(CorrelationResponse {
            success: true,
            report,
            sample_size,
            filters_applied: window.filters_applied(),
        })
    })
    .await
}
