use serde::Serialize;
use utoipa::ToSchema;

use super::{mean, quantile_sorted, sorted_finite};
use crate::analysis::grouping::{GroupBy, MonthFormat, Observation, group_values};
use crate::analysis::round2;

/// Five-number summary with Tukey fences.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BoxplotSummary {
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub mean: f64,
    pub iqr: f64,
    pub lower_fence: f64,
    pub upper_fence: f64,
    /// Values outside the fences; empty when outliers are excluded.
    pub outliers: Vec<f64>,
    pub outlier_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PeriodBoxplot {
    pub period: String,
    #[serde(flatten)]
    pub summary: BoxplotSummary,
}

/// Boxplot over every finite value in `values`.
///
/// With `include_outliers` false the reported min/max are taken over the
/// values inside the fences. Returns `None` for an empty input.
#[must_use]
pub fn boxplot(values: &[f64], include_outliers: bool) -> Option<BoxplotSummary> {
    let sorted = sorted_finite(values);
    let q1 = quantile_sorted(&sorted, 0.25)?;
    let median = quantile_sorted(&sorted, 0.5)?;
    let q3 = quantile_sorted(&sorted, 0.75)?;
    let iqr = q3 - q1;
    let lower_fence = q1 - 1.5 * iqr;
    let upper_fence = q3 + 1.5 * iqr;

    let (inside, outside): (Vec<f64>, Vec<f64>) = sorted
        .iter()
        .copied()
        .partition(|v| *v >= lower_fence && *v <= upper_fence);

    let (min, max) = if include_outliers {
        (sorted[0], sorted[sorted.len() - 1])
    } else {
        // The median is always inside the fences, so `inside` is non-empty.
        (
            inside.first().copied().unwrap_or(median),
            inside.last().copied().unwrap_or(median),
        )
    };

    let outlier_count = outside.len();
    let outliers = if include_outliers {
        outside.into_iter().map(round2).collect()
    } else {
        Vec::new()
    };

    Some(BoxplotSummary {
        count: sorted.len(),
        min: round2(min),
        q1: round2(q1),
        median: round2(median),
        q3: round2(q3),
        max: round2(max),
        mean: round2(mean(&sorted)?),
        iqr: round2(iqr),
        lower_fence: round2(lower_fence),
        upper_fence: round2(upper_fence),
        outliers,
        outlier_count,
    })
}

/// One boxplot per period bucket, chronological.
#[must_use]
pub fn boxplot_by_period(
    observations: &[Observation],
    group_by: GroupBy,
    month_format: MonthFormat,
    include_outliers: bool,
) -> Vec<PeriodBoxplot> {
    group_values(observations, group_by)
        .into_iter()
        .filter_map(|(key, values)| {
            boxplot(&values, include_outliers).map(|summary| PeriodBoxplot {
                period: key.label(month_format),
                summary,
            })
        })
        .collect()
}
