//! Query-string handling shared by the data endpoints.
//!
//! The raw pairs are kept so that list parameters can arrive repeated
//! (`metrics=a&metrics=b`), bracketed (`metrics[]=a`) or comma-separated.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::analysis::ParamError;
use crate::analysis::grouping::{GroupBy, MonthFormat};
use crate::analysis::window::TimeWindow;
use crate::error::AppError;
use crate::metrics::{Metric, SoilDepth};

#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl<S: Send + Sync> FromRequestParts<S> for RequestParams {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(Self { pairs })
    }
}

fn parse_bool(param: &'static str, raw: &str) -> Result<bool, ParamError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ParamError::new(param, format!("'{other}' is not a boolean"))),
    }
}

impl RequestParams {
    #[must_use]
    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// First non-blank value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.trim())
            .find(|v| !v.is_empty())
    }

    /// Every value of `name` or `name[]`, in request order.
    #[must_use]
    pub fn all(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == name || k.strip_suffix("[]") == Some(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// # Errors
    ///
    /// Propagates window validation failures.
    pub fn window(&self) -> Result<TimeWindow, ParamError> {
        TimeWindow::parse(
            self.get("year"),
            self.get("month"),
            self.get("start_date"),
            self.get("end_date"),
        )
    }

    /// Metrics named under `name`; `None` when the parameter is absent or blank.
    /// Bare soil temperature resolves to the sensor depth named by `depth`.
    ///
    /// # Errors
    ///
    /// Returns a [`ParamError`] on `name` for unknown metric names, or on
    /// `depth` for unsupported sensor depths.
    pub fn metrics(&self, name: &'static str) -> Result<Option<Vec<Metric>>, ParamError> {
        let depth = self.depth()?;
        let raw = self.all(name);
        let metrics =
            Metric::parse_list(&raw, depth).map_err(|e| ParamError::new(name, e.to_string()))?;
        Ok((!metrics.is_empty()).then_some(metrics))
    }

    /// # Errors
    ///
    /// Returns a [`ParamError`] on `depth` for unsupported sensor depths.
    pub fn depth(&self) -> Result<Option<SoilDepth>, ParamError> {
        self.get("depth")
            .map(|raw| {
                SoilDepth::parse(raw).ok_or_else(|| {
                    ParamError::new("depth", format!("'{raw}' must be one of 5cm, 10cm, 20cm, 25cm, 50cm"))
                })
            })
            .transpose()
    }

    /// # Errors
    ///
    /// Returns a [`ParamError`] on `group_by`.
    pub fn group_by(&self, default: GroupBy) -> Result<GroupBy, ParamError> {
        self.get("group_by").map_or(Ok(default), GroupBy::parse)
    }

    /// # Errors
    ///
    /// Returns a [`ParamError`] on `month_format`.
    pub fn month_format(&self) -> Result<MonthFormat, ParamError> {
        self.get("month_format").map_or(Ok(MonthFormat::default()), MonthFormat::parse)
    }

    /// Row limit for raw endpoints.
    ///
    /// # Errors
    ///
    /// Returns a [`ParamError`] on `limit` when it is not a positive integer or exceeds `max`.
    pub fn limit(&self, default: u64, max: u64) -> Result<u64, ParamError> {
        let Some(raw) = self.get("limit") else {
            return Ok(default);
        };
        let limit: u64 = raw
            .parse()
            .map_err(|_| ParamError::new("limit", "must be a number"))?;
        if limit == 0 {
            return Err(ParamError::new("limit", "must be at least 1"));
        }
        if limit > max {
            return Err(ParamError::new(
                "limit",
                format!(
                    "cannot exceed {max} points for performance reasons. Use start_date and end_date to reduce data size"
                ),
            ));
        }
        Ok(limit)
    }

    /// # Errors
    ///
    /// Returns a [`ParamError`] on `name` for values that are not booleans.
    pub fn flag(&self, name: &'static str, default: bool) -> Result<bool, ParamError> {
        self.get(name).map_or(Ok(default), |raw| parse_bool(name, raw))
    }

    /// Sorted `key=value` list, stable across parameter order, for cache keys.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut pairs: Vec<String> = self
            .pairs
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| format!("{}={}", k.trim_end_matches("[]"), v.trim()))
            .collect();
        pairs.sort();
        pairs.join("&")
    }
}

// Documentation-only parameter sets; handlers read [`RequestParams`].

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WindowQuery {
    /// Calendar year. Without any window parameter the latest year in the table is used.
    pub year: Option<i32>,
    /// Month 1-12.
    pub month: Option<u32>,
    /// Inclusive lower bound, YYYY-MM-DD.
    pub start_date: Option<String>,
    /// Inclusive upper bound, YYYY-MM-DD.
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AveragedQuery {
    /// hour, day (default), week or month.
    pub group_by: Option<String>,
    /// Soil sensor depth for soil temperature: 5cm, 10cm, 20cm, 25cm, 50cm.
    pub depth: Option<String>,
    /// `numeric` (2024-03, default) or `abbr` (2024-Mar).
    pub month_format: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RawQuery {
    /// Maximum points returned (default 1000, at most 10000).
    pub limit: Option<u64>,
    /// Soil sensor depth for soil temperature.
    pub depth: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MetricsQuery {
    /// Metric keys, comma-separated or repeated.
    pub metrics: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BoxplotQuery {
    /// Report values beyond 1.5 IQR (default true). When false, min/max exclude them.
    pub include_outliers: Option<bool>,
    /// Bucket size for the per-period variant (default month).
    pub group_by: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistogramQuery {
    /// Number of equal-width bins, 1-100 (default 20).
    pub bins: Option<usize>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CorrelationQuery {
    /// pearson (default), spearman or kendall.
    pub correlation_method: Option<String>,
    /// Per-metric sample bound, 10-100000 (default 5000).
    pub sample_size: Option<usize>,
    /// Include the p-value matrix (default true).
    pub include_p_values: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    /// Metric keys to export, comma-separated (default: all).
    pub fields: Option<String>,
    /// json (default) or csv.
    pub format: Option<String>,
    /// Maximum rows (default 1000, at most 10000).
    pub limit: Option<u64>,
}
