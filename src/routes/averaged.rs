use axum::{
    extract::{Path, State},
    response::Response,
};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::cache;
use super::params::{AveragedQuery, RequestParams, WindowQuery};
use crate::analysis::grouping::{self, GroupBy, PeriodSummary};
use crate::analysis::window::FiltersApplied;
use crate::auth::AuthUser;
use crate::common::AppState;
use crate::error::{AppError, AppResult};
use crate::metrics::{Metric, MetricInfo};
use crate::services::series;

#[derive(Debug, Serialize, ToSchema)]
pub struct AveragedResponse {
    pub success: bool,
    pub metric: MetricInfo,
    pub group_by: GroupBy,
    pub aggregation: &'static str,
    /// Period summaries keyed by metric key.
    pub data: BTreeMap<String, Vec<PeriodSummary>>,
    pub total_periods: usize,
    pub filters_applied: FiltersApplied,
}

/// Resolves a `{metric}` path segment, honouring `depth` for soil temperature.
pub(crate) fn path_metric(segment: &str, params: &RequestParams) -> AppResult<Metric> {
    let depth = params.depth()?;
    Metric::from_path(segment, depth)
        .ok_or_else(|| AppError::invalid("metric", format!("unknown metric '{segment}'")))
}

/// Averaged chart series
///
/// Groups one metric by hour, day, week or month and returns avg/min/max/count
/// per period (plus `sum` for rainfall-like metrics), oldest first.
#[utoipa::path(
    get,
    path = "/api/charts/averaged/{metric}/",
    params(
        ("metric" = String, Path, description = "Metric key or slug, e.g. snow-depth, rainfall, soil-temperature"),
        WindowQuery,
        AveragedQuery,
    ),
    responses(
        (status = 200, description = "Grouped series", body = AveragedResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer" = [])),
    tag = "charts"
)]
pub async fn get_averaged(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(segment): Path<String>,
    params: RequestParams,
) -> AppResult<Response> {
    let metric = path_metric(&segment, &params)?;
    let group_by = params.group_by(GroupBy::Day)?;
    let month_format = params.month_format()?;
    let window = series::resolve_window(&state.db, params.window()?).await?;

    let key = cache::cache_key(
        "averaged",
        &[
            metric.key(),
            group_by.as_str(),
            &params.canonical(),
            &window.cache_components().join(","),
        ],
    );
    let db = &state.db;
    cache::cached_json(&state, key, &window, move || async move {
        let observations = series::load_series(db, &window, metric, None).await?;
        let periods = grouping::aggregate(&observations, group_by, month_format, metric.accumulates());
        Ok(AveragedResponse {
            success: true,
            metric: metric.info(),
            group_by,
            aggregation: "average",
            total_periods: periods.len(),
            data: BTreeMap::from([(metric.key().to_string(), periods)]),
            filters_applied: window.filters_applied(),
        })
    })
    .await
}
