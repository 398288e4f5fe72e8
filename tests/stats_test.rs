//! Boxplot, histogram and correlation properties.
//!
//! Run with: cargo test --test stats_test

use farm_data_api::analysis::grouping::{GroupBy, MonthFormat, Observation};
use farm_data_api::analysis::stats::boxplot::{boxplot, boxplot_by_period};
use farm_data_api::analysis::stats::correlation::{
    CorrelationMethod, Strength, correlation_report, kendall, p_value, parse_sample_size, pearson,
    spearman,
};
use farm_data_api::analysis::stats::histogram::{binned, histogram, parse_bins};
use farm_data_api::analysis::stats::{quantile_sorted, sample_in_order};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn rng() -> StdRng {
    StdRng::seed_from_u64(7)
}

#[test]
fn quartiles_are_ordered() {
    let inputs: [&[f64]; 4] = [
        &[5.0],
        &[3.0, 1.0],
        &[9.0, -2.0, 4.5, 4.5, 0.0, 13.25, 7.0],
        &[1.0, 1.0, 1.0, 50.0, -50.0],
    ];
    for xs in inputs {
        let summary = boxplot(xs, true).unwrap();
        assert!(summary.q1 <= summary.median, "{xs:?}");
        assert!(summary.median <= summary.q3, "{xs:?}");
        assert!(summary.min <= summary.q1 && summary.q3 <= summary.max, "{xs:?}");
    }
}

#[test]
fn quantiles_interpolate_linearly() {
    let sorted = [1.0, 2.0, 3.0, 4.0];
    assert_eq!(quantile_sorted(&sorted, 0.25), Some(1.75));
    assert_eq!(quantile_sorted(&sorted, 0.5), Some(2.5));
    assert_eq!(quantile_sorted(&[], 0.5), None);
}

#[test]
fn boxplot_flags_tukey_outliers() {
    let xs = [1.0, 2.0, 3.0, 4.0, 100.0];
    let with = boxplot(&xs, true).unwrap();
    assert_eq!((with.q1, with.median, with.q3), (2.0, 3.0, 4.0));
    assert_eq!(with.iqr, 2.0);
    assert_eq!(with.upper_fence, 7.0);
    assert_eq!(with.outliers, vec![100.0]);
    assert_eq!(with.max, 100.0);

    let without = boxplot(&xs, false).unwrap();
    assert!(without.outliers.is_empty());
    assert_eq!(without.outlier_count, 1);
    assert_eq!(without.max, 4.0);
    assert_eq!(without.min, 1.0);
    assert_eq!(without.count, 5);
}

#[test]
fn boxplot_of_nothing_is_none() {
    assert!(boxplot(&[], true).is_none());
    assert!(boxplot(&[f64::NAN], true).is_none());
}

#[test]
fn boxplot_per_period_is_separate_from_overall() {
    let observations = vec![
        Observation::new(2024, 1, 3, "00:00:00", 1.0),
        Observation::new(2024, 1, 9, "00:00:00", 3.0),
        Observation::new(2024, 2, 1, "00:00:00", 10.0),
    ];
    let periods = boxplot_by_period(&observations, GroupBy::Month, MonthFormat::Numeric, true);
    assert_eq!(periods.len(), 2);
    assert_eq!(periods[0].period, "2024-01");
    assert_eq!(periods[0].summary.median, 2.0);
    assert_eq!(periods[1].summary.count, 1);
}

#[test]
fn histogram_bins_cover_min_to_max() {
    let xs: Vec<f64> = (0..37_i32).map(|i| f64::from(i) * 1.3 - 7.0).collect();
    for bins in [1, 5, 20, 100] {
        let h = binned(&xs, bins, xs.len()).unwrap();
        assert_eq!(h.bins.len(), bins);
        assert_eq!(h.bins[0].bin_start, -7.0);
        assert_eq!(h.bins[bins - 1].bin_end, xs[36]);
        for pair in h.bins.windows(2) {
            assert_eq!(pair[0].bin_end, pair[1].bin_start);
        }
        assert_eq!(h.bins.iter().map(|b| b.count).sum::<usize>(), xs.len());
        assert!(!h.sampled);
    }
}

#[test]
fn histogram_of_constant_values_uses_first_bin() {
    let h = binned(&[4.0, 4.0, 4.0], 3, 3).unwrap();
    assert_eq!(h.bins[0].count, 3);
    assert_eq!(h.bins[0].percentage, 100.0);
    assert_eq!(h.statistics.std_dev, 0.0);
}

#[test]
fn histogram_samples_large_inputs() {
    let xs: Vec<f64> = (0..1000_i32).map(f64::from).collect();
    let h = histogram(&xs, 10, 100, &mut rng()).unwrap();
    assert!(h.sampled);
    assert_eq!(h.sample_size, 100);
    assert_eq!(h.population_size, 1000);
    assert_eq!(h.statistics.total_count, 100);
    assert_eq!(h.bins.iter().map(|b| b.count).sum::<usize>(), 100);

    let small = histogram(&xs[..50], 10, 100, &mut rng()).unwrap();
    assert!(!small.sampled);
    assert_eq!(small.sample_size, 50);
}

#[test]
fn sampling_preserves_order() {
    let xs: Vec<u32> = (0..500).collect();
    let sample = sample_in_order(&mut rng(), &xs, 40);
    assert_eq!(sample.len(), 40);
    assert!(sample.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn bins_and_sample_size_are_validated() {
    assert_eq!(parse_bins(None).unwrap(), 20);
    assert_eq!(parse_bins(Some("100")).unwrap(), 100);
    assert_eq!(parse_bins(Some("0")).unwrap_err().param, "bins");
    assert_eq!(parse_bins(Some("101")).unwrap_err().param, "bins");
    assert_eq!(parse_sample_size(None).unwrap(), 5000);
    assert_eq!(parse_sample_size(Some("9")).unwrap_err().param, "sample_size");
}

#[test]
fn self_correlation_is_one_for_every_method() {
    let x = [3.0, 1.0, 4.0, 1.5, 5.0, 9.0, 2.0, 6.0];
    for method in [
        CorrelationMethod::Pearson,
        CorrelationMethod::Spearman,
        CorrelationMethod::Kendall,
    ] {
        let r = method.coefficient(&x, &x).unwrap();
        assert!((r - 1.0).abs() < 1e-12, "{method:?} gave {r}");
    }
}

#[test]
fn constant_series_have_no_coefficient() {
    let x = [1.0, 2.0, 3.0];
    let flat = [5.0, 5.0, 5.0];
    assert!(pearson(&x, &flat).is_none());
    assert!(spearman(&x, &flat).is_none());
    assert!(kendall(&x, &flat).is_none());
}

#[test]
fn reversed_series_correlate_negatively() {
    let x = [1.0, 2.0, 3.0, 4.0, 5.0];
    let y = [10.0, 8.0, 6.0, 4.0, 2.0];
    assert!((pearson(&x, &y).unwrap() + 1.0).abs() < 1e-12);
    assert!((kendall(&x, &y).unwrap() + 1.0).abs() < 1e-12);
}

/// Pair-by-pair tau-b, used as the reference for the merge-sort version.
fn kendall_by_pairs(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    let (mut score, mut ties_x, mut ties_y) = (0i64, 0i64, 0i64);
    for i in 0..n {
        for j in (i + 1)..n {
            let (dx, dy) = (x[i] - x[j], y[i] - y[j]);
            if dx == 0.0 {
                ties_x += 1;
            }
            if dy == 0.0 {
                ties_y += 1;
            }
            if dx != 0.0 && dy != 0.0 {
                score += if (dx > 0.0) == (dy > 0.0) { 1 } else { -1 };
            }
        }
    }
    let pairs = (n * (n - 1) / 2) as f64;
    let denom = ((pairs - ties_x as f64) * (pairs - ties_y as f64)).sqrt();
    (denom > 0.0).then(|| score as f64 / denom)
}

#[test]
fn kendall_matches_pairwise_counting_with_ties() {
    use rand::Rng;
    let mut rng = rng();
    for _ in 0..20 {
        // Small integer ranges force many ties on both sides.
        let x: Vec<f64> = (0..200).map(|_| f64::from(rng.gen_range(0..12_i32))).collect();
        let y: Vec<f64> = (0..200)
            .map(|i| f64::from(rng.gen_range(0..8_i32)) + x[i] * 0.5)
            .collect();
        let fast = kendall(&x, &y).unwrap();
        let slow = kendall_by_pairs(&x, &y).unwrap();
        assert!((fast - slow).abs() < 1e-12, "{fast} vs {slow}");
    }

    let x = [0.0, -0.0, 1.0, 2.0];
    let y = [1.0, 1.0, 0.0, 3.0];
    assert!((kendall(&x, &y).unwrap() - kendall_by_pairs(&x, &y).unwrap()).abs() < 1e-12);
}

#[test]
fn kendall_handles_the_largest_sample() {
    let x: Vec<f64> = (0..100_000_i32).map(f64::from).collect();
    let y: Vec<f64> = x.iter().map(|v| v * 2.0 + 1.0).collect();
    let reversed: Vec<f64> = x.iter().rev().copied().collect();
    assert!((kendall(&x, &y).unwrap() - 1.0).abs() < 1e-12);
    assert!((kendall(&x, &reversed).unwrap() + 1.0).abs() < 1e-12);
}

#[test]
fn p_values() {
    assert_eq!(p_value(CorrelationMethod::Pearson, 0.0, 10), Some(1.0));
    assert_eq!(p_value(CorrelationMethod::Pearson, 1.0, 10), Some(0.0));
    assert_eq!(p_value(CorrelationMethod::Kendall, 0.5, 2), None);
    let p = p_value(CorrelationMethod::Spearman, 0.8, 30).unwrap();
    assert!(p > 0.0 && p < 0.001);
}

#[test]
fn strength_buckets() {
    assert_eq!(Strength::of(-0.7), Strength::Strong);
    assert_eq!(Strength::of(0.3), Strength::Moderate);
    assert_eq!(Strength::of(0.29), Strength::Weak);
}

#[test]
fn report_needs_two_series_with_data() {
    let report = correlation_report(
        vec![
            ("air_temperature".to_string(), vec![1.0, 2.0, 3.0]),
            ("rainfall".to_string(), vec![]),
        ],
        CorrelationMethod::Pearson,
        5000,
        true,
        &mut rng(),
    );
    assert!(report.insufficient_data);
    assert!(report.message.is_some());
    assert!(report.pairwise.is_empty());
}

#[test]
fn report_truncates_to_shortest_series() {
    let a: Vec<f64> = (0..20_i32).map(f64::from).collect();
    let b: Vec<f64> = (0..20_i32).map(|i| f64::from(i) * 2.0 + 1.0).collect();
    let c: Vec<f64> = [4.0, 1.0, 3.0, 5.0, 2.0, 7.0, 6.0, 9.0, 8.0, 0.0].to_vec();
    let report = correlation_report(
        vec![
            ("a".to_string(), a),
            ("b".to_string(), b),
            ("c".to_string(), c),
        ],
        CorrelationMethod::Pearson,
        5000,
        true,
        &mut rng(),
    );

    assert!(!report.insufficient_data);
    assert_eq!(report.metric_names, ["a", "b", "c"]);
    assert_eq!(report.statistics.total_records, 10);
    assert_eq!(report.correlation_matrix[0][1], Some(1.0));
    for i in 0..3 {
        assert_eq!(report.correlation_matrix[i][i], Some(1.0));
        for j in 0..3 {
            assert_eq!(report.correlation_matrix[i][j], report.correlation_matrix[j][i]);
        }
    }
    assert_eq!(report.pairwise.len(), 3);
    assert_eq!(report.pairwise[0].metric1, "a");
    assert_eq!(report.pairwise[0].metric2, "b");
    let magnitudes: Vec<f64> = report
        .pairwise
        .iter()
        .map(|p| p.correlation.unwrap().abs())
        .collect();
    assert!(magnitudes.windows(2).all(|w| w[0] >= w[1]));
    assert!(report.p_value_matrix.is_some());
}
