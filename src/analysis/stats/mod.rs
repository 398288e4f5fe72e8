//! Descriptive statistics shared by the boxplot, histogram and correlation endpoints.

pub mod boxplot;
pub mod correlation;
pub mod histogram;

use rand::Rng;

/// Finite values only, ascending.
#[must_use]
pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    out.sort_by(f64::total_cmp);
    out
}

/// Quantile of ascending `sorted` by linear interpolation between closest ranks.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

#[must_use]
pub fn median_sorted(sorted: &[f64]) -> Option<f64> {
    quantile_sorted(sorted, 0.5)
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (ddof = 0).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Uniform sample of at most `amount` values, keeping their original order.
pub fn sample_in_order<T: Copy, R: Rng + ?Sized>(rng: &mut R, values: &[T], amount: usize) -> Vec<T> {
    if values.len() <= amount {
        return values.to_vec();
    }
    let mut indices = rand::seq::index::sample(rng, values.len(), amount).into_vec();
    indices.sort_unstable();
    indices.into_iter().map(|i| values[i]).collect()
}
