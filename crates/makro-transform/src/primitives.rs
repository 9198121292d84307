//! Numeric building blocks of the rolling-baseline standardizer.
//!
//! Every function works on one date-ordered group of values. Rolling windows
//! are trailing windows of `window` positions; a window yields a value only
//! when it holds at least `min_periods` non-missing points.

use makro_traits::stats::{
    MAD_SCALE, average_ranks, clip, inverse_normal_cdf, nan_mean, nan_median, nan_quantile,
    nan_std,
};
use tracing::warn;

/// Apply `f` to the non-missing values of every trailing window.
fn rolling_apply(
    values: &[f64],
    window: usize,
    min_periods: usize,
    f: impl Fn(&[f64]) -> f64,
) -> Vec<f64> {
    let window = window.max(1);
    let mut buf = Vec::with_capacity(window);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            buf.clear();
            buf.extend(values[start..=i].iter().copied().filter(|v| !v.is_nan()));
            if buf.len() < min_periods.max(1) {
                f64::NAN
            } else {
                f(&buf)
            }
        })
        .collect()
}

/// Trailing rolling median.
pub fn rolling_median(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling_apply(values, window, min_periods, nan_median)
}

/// Trailing rolling mean.
pub fn rolling_mean(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    rolling_apply(values, window, min_periods, nan_mean)
}

/// Rolling median baseline and the deviation of each value from it.
///
/// The deviation is NaN wherever the baseline is.
pub fn rolling_baseline(values: &[f64], window: usize, min_periods: usize) -> (Vec<f64>, Vec<f64>) {
    let baseline = rolling_median(values, window, min_periods);
    let deviation = values.iter().zip(&baseline).map(|(v, b)| v - b).collect();
    (baseline, deviation)
}

/// Rolling MAD scaled by [`MAD_SCALE`]: the rolling median of the absolute
/// deviation from the rolling median.
pub fn rolling_mad(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    let (_, deviation) = rolling_baseline(values, window, min_periods);
    let abs_dev: Vec<f64> = deviation.iter().map(|d| d.abs()).collect();
    rolling_median(&abs_dev, window, min_periods)
        .into_iter()
        .map(|m| m * MAD_SCALE)
        .collect()
}

/// Back-fill then forward-fill missing values.
pub fn fill_nan_both_ways(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    let mut next = f64::NAN;
    for v in out.iter_mut().rev() {
        if v.is_nan() {
            *v = next;
        } else {
            next = *v;
        }
    }
    let mut prev = f64::NAN;
    for v in &mut out {
        if v.is_nan() {
            *v = prev;
        } else {
            prev = *v;
        }
    }
    out
}

/// Clip values to the `lower` and `upper` quantiles of the group.
///
/// An all-missing group is returned unchanged.
pub fn winsorize(values: &[f64], lower: f64, upper: f64) -> Vec<f64> {
    let lo = nan_quantile(values, lower);
    let hi = nan_quantile(values, upper);
    if lo.is_nan() || hi.is_nan() {
        return values.to_vec();
    }
    clip(values, lo, hi)
}

/// Scale used by [`robust_zscore`].
#[derive(Debug, Clone, Copy)]
pub enum RobustScale<'a> {
    /// One scale for the whole group: the scaled MAD, or the population std
    /// when the MAD is zero.
    Global,
    /// A precomputed scale per value (rolling MAD).
    PerRow(&'a [f64]),
}

/// Robust z-score around the group median.
///
/// Points whose scale is zero or NaN, and missing inputs, come out as 0.0.
pub fn robust_zscore(values: &[f64], scale: RobustScale<'_>) -> Vec<f64> {
    let center = nan_median(values);
    let scales: Vec<f64> = match scale {
        RobustScale::Global => {
            let abs_dev: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
            let mad = nan_median(&abs_dev);
            let s = if mad > 0.0 {
                mad * MAD_SCALE
            } else {
                nan_std(values, 0)
            };
            vec![s; values.len()]
        }
        RobustScale::PerRow(row_scale) => (0..values.len())
            .map(|i| row_scale.get(i).copied().unwrap_or(f64::NAN))
            .collect(),
    };

    let mut degenerate = 0usize;
    let out = values
        .iter()
        .zip(&scales)
        .map(|(v, &s)| {
            if s == 0.0 || s.is_nan() {
                degenerate += 1;
                return 0.0;
            }
            let z = (v - center) / s;
            if z.is_nan() { 0.0 } else { z }
        })
        .collect();
    if degenerate > 0 {
        warn!(
            points = degenerate,
            total = values.len(),
            "robust z-score scale is zero or NaN, emitting 0.0"
        );
    }
    out
}

/// Classic z-score with population std. A zero or undefined std divides by 1.
pub fn classic_zscore(values: &[f64]) -> Vec<f64> {
    let mu = nan_mean(values);
    let sd = nan_std(values, 0);
    let denom = if sd > 0.0 {
        sd
    } else {
        warn!(n = values.len(), "zero variance group, z-score divides by 1");
        1.0
    };
    values.iter().map(|v| (v - mu) / denom).collect()
}

/// Rank normalization: `(average_rank - 0.5) / count` clipped away from 0 and
/// 1, mapped through the inverse normal CDF. Missing inputs stay missing.
pub fn rank_norm(values: &[f64]) -> Vec<f64> {
    let ranks = average_ranks(values);
    let count = ranks.iter().filter(|r| !r.is_nan()).count() as f64;
    ranks
        .iter()
        .map(|&r| {
            if r.is_nan() {
                return f64::NAN;
            }
            let u = ((r - 0.5) / count).clamp(f64::EPSILON, 1.0 - f64::EPSILON);
            inverse_normal_cdf(u)
        })
        .collect()
}
