//! Pairwise correlation matrices (Pearson, Spearman, Kendall tau-b) with p-values.

use rand::Rng;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use utoipa::ToSchema;

use super::sample_in_order;
use crate::analysis::{ParamError, round_to};

pub const DEFAULT_SAMPLE_SIZE: usize = 5000;
pub const MAX_SAMPLE_SIZE: usize = 100_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
    Kendall,
}

impl CorrelationMethod {
    /// # Errors
    ///
    /// Returns a [`ParamError`] on `correlation_method` for unknown methods.
    pub fn parse(raw: &str) -> Result<Self, ParamError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "pearson" => Ok(Self::Pearson),
            "spearman" => Ok(Self::Spearman),
            "kendall" => Ok(Self::Kendall),
            other => Err(ParamError::new(
                "correlation_method",
                format!("'{other}' must be one of pearson, spearman, kendall"),
            )),
        }
    }

    #[must_use]
    pub fn coefficient(self, x: &[f64], y: &[f64]) -> Option<f64> {
        match self {
            Self::Pearson => pearson(x, y),
            Self::Spearman => spearman(x, y),
            Self::Kendall => kendall(x, y),
        }
    }
}

/// `sample_size` must be between 10 and 100 000; absent means 5000.
///
/// # Errors
///
/// Returns a [`ParamError`] on `sample_size` otherwise.
pub fn parse_sample_size(raw: Option<&str>) -> Result<usize, ParamError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(DEFAULT_SAMPLE_SIZE);
    };
    match raw.parse::<usize>() {
        Ok(n) if (10..=MAX_SAMPLE_SIZE).contains(&n) => Ok(n),
        _ => Err(ParamError::new(
            "sample_size",
            format!("'{raw}' must be an integer between 10 and {MAX_SAMPLE_SIZE}"),
        )),
    }
}

/// Pearson product-moment coefficient. `None` when either side is constant or too short.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mx = x.iter().sum::<f64>() / n as f64;
    let my = y.iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// 1-based ranks, ties sharing their average rank.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end (0-based) share ranks start+1..=end.
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

#[must_use]
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    pearson(&average_ranks(&x[..n]), &average_ranks(&y[..n]))
}

/// Pairs tied under `same` among neighbours of an already sorted slice.
fn tied_pairs<T>(sorted: &[T], same: impl Fn(&T, &T) -> bool) -> u64 {
    let mut total = 0u64;
    let mut run = 1u64;
    for w in sorted.windows(2) {
        if same(&w[0], &w[1]) {
            run += 1;
        } else {
            total += run * (run - 1) / 2;
            run = 1;
        }
    }
    total + run * (run - 1) / 2
}

/// Merge sort that returns the number of strict inversions it removed.
fn sort_counting_inversions(values: &mut [f64], scratch: &mut Vec<f64>) -> u64 {
    let n = values.len();
    if n < 2 {
        return 0;
    }
    let mid = n / 2;
    let mut swaps = sort_counting_inversions(&mut values[..mid], scratch)
        + sort_counting_inversions(&mut values[mid..], scratch);

    scratch.clear();
    let (mut i, mut j) = (0, mid);
    while i < mid && j < n {
        if values[j] < values[i] {
            scratch.push(values[j]);
            swaps += (mid - i) as u64;
            j += 1;
        } else {
            scratch.push(values[i]);
            i += 1;
        }
    }
    scratch.extend_from_slice(&values[i..mid]);
    scratch.extend_from_slice(&values[j..n]);
    values.copy_from_slice(&scratch[..]);
    swaps
}

/// Kendall tau-b, which corrects for ties on either side.
///
/// Knight's O(n log n) method: sort by `(x, y)`, then count the inversions a
/// merge sort of `y` removes; each one is a discordant pair.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn kendall(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    // -0.0 and 0.0 must land in the same tie run.
    let canonical = |v: f64| if v == 0.0 { 0.0 } else { v };
    let mut pairs: Vec<(f64, f64)> = x[..n]
        .iter()
        .zip(&y[..n])
        .map(|(&a, &b)| (canonical(a), canonical(b)))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let ties_x = tied_pairs(&pairs, |a, b| a.0 == b.0);
    let ties_xy = tied_pairs(&pairs, |a, b| a.0 == b.0 && a.1 == b.1);

    let mut ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    let discordant = sort_counting_inversions(&mut ys, &mut Vec::with_capacity(n));
    let ties_y = tied_pairs(&ys, |a, b| a == b);

    let total = (n * (n - 1) / 2) as f64;
    let (ties_x, ties_y) = (ties_x as f64, ties_y as f64);
    let denom = ((total - ties_x) * (total - ties_y)).sqrt();
    if denom <= 0.0 {
        return None;
    }
    let score = total - ties_x - ties_y + ties_xy as f64 - 2.0 * discordant as f64;
    Some((score / denom).clamp(-1.0, 1.0))
}

/// Two-sided p-value for coefficient `r` over `n` pairs.
///
/// Pearson and Spearman use Student's t with n - 2 degrees of freedom;
/// Kendall uses the normal approximation.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn p_value(method: CorrelationMethod, r: f64, n: usize) -> Option<f64> {
    if n < 3 || !r.is_finite() {
        return None;
    }
    if r.abs() >= 1.0 {
        return Some(0.0);
    }
    let nf = n as f64;
    let p = match method {
        CorrelationMethod::Pearson | CorrelationMethod::Spearman => {
            let df = nf - 2.0;
            let t = r * (df / (1.0 - r * r)).sqrt();
            let dist = StudentsT::new(0.0, 1.0, df).ok()?;
            2.0 * (1.0 - dist.cdf(t.abs()))
        }
        CorrelationMethod::Kendall => {
            let z = 3.0 * r * (nf * (nf - 1.0)).sqrt() / (2.0 * (2.0 * nf + 5.0)).sqrt();
            let dist = Normal::new(0.0, 1.0).ok()?;
            2.0 * (1.0 - dist.cdf(z.abs()))
        }
    };
    Some(p.clamp(0.0, 1.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Strong,
    Moderate,
    Weak,
}

impl Strength {
    #[must_use]
    pub fn of(r: f64) -> Self {
        let r = r.abs();
        if r >= 0.7 {
            Self::Strong
        } else if r >= 0.3 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PairwiseCorrelation {
    pub metric1: String,
    pub metric2: String,
    pub correlation: Option<f64>,
    pub p_value: Option<f64>,
    pub sample_size: usize,
    pub strength: Option<Strength>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct CorrelationStatistics {
    /// Aligned series length every pair was computed over.
    pub total_records: usize,
    pub valid_pairs: usize,
    pub strong: usize,
    pub moderate: usize,
    pub weak: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CorrelationReport {
    pub method: CorrelationMethod,
    /// Row and column order of both matrices.
    pub metric_names: Vec<String>,
    pub correlation_matrix: Vec<Vec<Option<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value_matrix: Option<Vec<Vec<Option<f64>>>>,
    /// Sorted by descending absolute correlation; undefined pairs last.
    pub pairwise: Vec<PairwiseCorrelation>,
    pub statistics: CorrelationStatistics,
    pub insufficient_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Full correlation report over named series.
///
/// Series without finite values are dropped. Each remaining series is sampled
/// down to `sample_size` (order preserved) and all are truncated to the
/// shortest before any coefficient is computed.
pub fn correlation_report<R: Rng + ?Sized>(
    series: Vec<(String, Vec<f64>)>,
    method: CorrelationMethod,
    sample_size: usize,
    include_p_values: bool,
    rng: &mut R,
) -> CorrelationReport {
    let usable: Vec<(String, Vec<f64>)> = series
        .into_iter()
        .map(|(name, values)| {
            let finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
            (name, finite)
        })
        .filter(|(_, values)| !values.is_empty())
        .collect();

    let metric_names: Vec<String> = usable.iter().map(|(name, _)| name.clone()).collect();

    if usable.len() < 2 {
        return CorrelationReport {
            method,
            metric_names,
            correlation_matrix: Vec::new(),
            p_value_matrix: include_p_values.then(Vec::new),
            pairwise: Vec::new(),
            statistics: CorrelationStatistics::default(),
            insufficient_data: true,
            message: Some(
                "Insufficient data: at least two metrics with values are required".to_string(),
            ),
        };
    }

    let sampled: Vec<Vec<f64>> = usable
        .iter()
        .map(|(_, values)| sample_in_order(rng, values, sample_size))
        .collect();
    let n = sampled.iter().map(Vec::len).min().unwrap_or(0);
    let aligned: Vec<&[f64]> = sampled.iter().map(|v| &v[..n]).collect();

    let k = aligned.len();
    let mut matrix = vec![vec![None; k]; k];
    let mut p_matrix = vec![vec![None; k]; k];
    let mut pairwise = Vec::with_capacity(k * (k - 1) / 2);
    let mut statistics = CorrelationStatistics {
        total_records: n,
        ..CorrelationStatistics::default()
    };

    for i in 0..k {
        let own = method.coefficient(aligned[i], aligned[i]);
        matrix[i][i] = own.map(|r| round_to(r, 4));
        p_matrix[i][i] = own.map(|_| 0.0);

        for j in (i + 1)..k {
            let r = method.coefficient(aligned[i], aligned[j]);
            let p = r.and_then(|r| p_value(method, r, n));
            let rounded = r.map(|r| round_to(r, 4));
            let p_rounded = p.map(|p| round_to(p, 6));
            matrix[i][j] = rounded;
            matrix[j][i] = rounded;
            p_matrix[i][j] = p_rounded;
            p_matrix[j][i] = p_rounded;

            let strength = r.map(Strength::of);
            if let Some(s) = strength {
                statistics.valid_pairs += 1;
                match s {
                    Strength::Strong => statistics.strong += 1,
                    Strength::Moderate => statistics.moderate += 1,
                    Strength::Weak => statistics.weak += 1,
                }
            }
            pairwise.push(PairwiseCorrelation {
                metric1: metric_names[i].clone(),
                metric2: metric_names[j].clone(),
                correlation: rounded,
                p_value: if include_p_values { p_rounded } else { None },
                sample_size: n,
                strength,
            });
        }
    }

    pairwise.sort_by(|a, b| {
        let key = |p: &PairwiseCorrelation| p.correlation.map_or(-1.0, f64::abs);
        key(b).total_cmp(&key(a))
    });

    CorrelationReport {
        method,
        metric_names,
        correlation_matrix: matrix,
        p_value_matrix: include_p_values.then_some(p_matrix),
        pairwise,
        statistics,
        insufficient_data: false,
        message: None,
    }
}
