use rand::Rng;
use serde::Serialize;
use utoipa::ToSchema;

use super::{mean, median_sorted, sample_in_order, sorted_finite, std_dev};
use crate::analysis::{ParamError, round2};

pub const DEFAULT_BINS: usize = 20;
pub const MAX_BINS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HistogramBin {
    pub bin_start: f64,
    pub bin_end: f64,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HistogramStats {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Histogram {
    pub bins: Vec<HistogramBin>,
    pub statistics: HistogramStats,
    /// True when the input exceeded the sample cap and was sampled down.
    pub sampled: bool,
    /// Number of values actually binned.
    pub sample_size: usize,
    /// Number of finite values before sampling.
    pub population_size: usize,
}

/// `bins` must lie in 1..=100; absent means 20.
///
/// # Errors
///
/// Returns a [`ParamError`] on `bins` for non-integers or out-of-range counts.
pub fn parse_bins(raw: Option<&str>) -> Result<usize, ParamError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(DEFAULT_BINS);
    };
    match raw.parse::<usize>() {
        Ok(n) if (1..=MAX_BINS).contains(&n) => Ok(n),
        _ => Err(ParamError::new(
            "bins",
            format!("'{raw}' must be an integer between 1 and {MAX_BINS}"),
        )),
    }
}

/// Histogram of `values`, sampling uniformly down to `sample_cap` first when larger.
#[must_use]
pub fn histogram<R: Rng + ?Sized>(
    values: &[f64],
    bins: usize,
    sample_cap: usize,
    rng: &mut R,
) -> Option<Histogram> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let population_size = finite.len();
    if population_size > sample_cap {
        tracing::debug!(population_size, sample_cap, "histogram_sampled");
        let sample = sample_in_order(rng, &finite, sample_cap);
        binned(&sample, bins, population_size)
    } else {
        binned(&finite, bins, population_size)
    }
}

/// Equal-width bins spanning exactly `[min, max]` of `sample`. The last bin is closed.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn binned(sample: &[f64], bins: usize, population_size: usize) -> Option<Histogram> {
    let bins = bins.clamp(1, MAX_BINS);
    let sorted = sorted_finite(sample);
    let (&min, &max) = (sorted.first()?, sorted.last()?);
    let total = sorted.len();
    let width = (max - min) / bins as f64;

    let mut counts = vec![0usize; bins];
    for v in &sorted {
        let index = if width > 0.0 {
            (((v - min) / width).floor() as usize).min(bins - 1)
        } else {
            0
        };
        counts[index] += 1;
    }

    let edge = |i: usize| if i == bins { max } else { min + width * i as f64 };
    let bins_out = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            bin_start: edge(i),
            bin_end: edge(i + 1),
            count,
            percentage: round2(count as f64 * 100.0 / total as f64),
        })
        .collect();

    Some(Histogram {
        bins: bins_out,
        statistics: HistogramStats {
            mean: round2(mean(&sorted)?),
            median: round2(median_sorted(&sorted)?),
            std_dev: round2(std_dev(&sorted)?),
            min: round2(min),
            max: round2(max),
            total_count: total,
        },
        sampled: total < population_size,
        sample_size: total,
        population_size,
    })
}
