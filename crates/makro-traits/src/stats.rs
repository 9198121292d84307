//! Statistical utility functions shared by standardization, scoring, and
//! allocation.
//!
//! All `nan_*` functions skip NaN inputs the way numpy's nan-aware reductions
//! do and return NaN when nothing is left to reduce.

/// Scale factor converting a median absolute deviation into a normal-consistent
/// standard deviation estimate.
pub const MAD_SCALE: f64 = 1.4826;

/// Z-score standardization result containing computed statistics.
#[derive(Debug, Clone, Copy)]
pub struct StandardizeResult {
    /// The centre subtracted from every value.
    pub center: f64,
    /// The scale the deviations were divided by.
    pub scale: f64,
    /// Whether a non-degenerate scale was used (false means division by 1).
    pub applied: bool,
}

/// Collect the non-NaN values of a slice.
pub fn non_nan(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

/// Mean of the non-NaN values.
pub fn nan_mean(values: &[f64]) -> f64 {
    let valid = non_nan(values);
    if valid.is_empty() {
        return f64::NAN;
    }
    valid.iter().sum::<f64>() / valid.len() as f64
}

/// Standard deviation of the non-NaN values with `ddof` delta degrees of
/// freedom. NaN when fewer than `ddof + 1` values remain.
pub fn nan_std(values: &[f64], ddof: usize) -> f64 {
    let valid = non_nan(values);
    if valid.len() <= ddof {
        return f64::NAN;
    }
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    let ss: f64 = valid.iter().map(|x| (x - mean).powi(2)).sum();
    (ss / (valid.len() - ddof) as f64).sqrt()
}

/// Median of the non-NaN values.
pub fn nan_median(values: &[f64]) -> f64 {
    nan_quantile(values, 0.5)
}

/// Quantile of the non-NaN values using linear interpolation between order
/// statistics.
///
/// # Arguments
///
/// * `values` - The input values, NaN allowed
/// * `q` - The quantile level, clamped to `[0, 1]`
///
/// # Returns
///
/// The value at position `q * (n - 1)` of the sorted non-NaN values,
/// interpolated between the two neighbouring order statistics.
///
/// # Edge Cases
///
/// - Empty or all-NaN input: NaN
/// - Single value: that value for every `q`
///
/// # Examples
///
/// ```
/// use makro_traits::stats::nan_quantile;
///
/// let values = [4.0, f64::NAN, 1.0, 3.0, 2.0];
/// assert!((nan_quantile(&values, 0.25) - 1.75).abs() < 1e-12);
/// assert!(nan_quantile(&[f64::NAN], 0.5).is_nan());
/// ```
pub fn nan_quantile(values: &[f64], q: f64) -> f64 {
    let mut valid = non_nan(values);
    if valid.is_empty() {
        return f64::NAN;
    }
    valid.sort_by(f64::total_cmp);
    quantile_sorted(&valid, q)
}

/// Linear-interpolation quantile of an already sorted, NaN-free slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Median absolute deviation from `center`, unscaled.
pub fn nan_mad(values: &[f64], center: f64) -> f64 {
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    nan_median(&deviations)
}

/// Clip every value into `[lower, upper]`. NaN stays NaN.
pub fn clip(values: &[f64], lower: f64, upper: f64) -> Vec<f64> {
    values
        .iter()
        .map(|&v| if v.is_nan() { v } else { v.max(lower).min(upper) })
        .collect()
}

/// Mirror of numpy's `isclose` with default tolerances.
pub fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

/// Z-score with population standard deviation.
///
/// A zero or undefined standard deviation divides by 1 instead, so constant
/// input maps to zeros.
pub fn zscore(values: &[f64]) -> (Vec<f64>, StandardizeResult) {
    let center = nan_mean(values);
    let sd = nan_std(values, 0);
    let applied = sd > 0.0;
    let scale = if applied { sd } else { 1.0 };
    let out = values.iter().map(|v| (v - center) / scale).collect();
    (
        out,
        StandardizeResult {
            center,
            scale,
            applied,
        },
    )
}

/// Robust z-score: deviation from the median over `MAD_SCALE` times the MAD.
///
/// A zero MAD divides by 1 instead.
pub fn robust_zscore(values: &[f64]) -> (Vec<f64>, StandardizeResult) {
    let center = nan_median(values);
    let mad = nan_mad(values, center) * MAD_SCALE;
    let applied = mad > 0.0;
    let scale = if applied { mad } else { 1.0 };
    let out = values.iter().map(|v| (v - center) / scale).collect();
    (
        out,
        StandardizeResult {
            center,
            scale,
            applied,
        },
    )
}

/// Average ranks (1-based) of the non-NaN values. Ties share the mean of the
/// positions they span. NaN inputs rank as NaN.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut idx: Vec<usize> = (0..values.len()).filter(|&i| !values[i].is_nan()).collect();
    idx.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![f64::NAN; values.len()];
    let mut i = 0;
    while i < idx.len() {
        let mut j = i;
        while j + 1 < idx.len() && values[idx[j + 1]] == values[idx[i]] {
            j += 1;
        }
        // positions i..=j are 0-based, ranks are 1-based
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &k in &idx[i..=j] {
            ranks[k] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Descending "min" ranks of the valid values.
///
/// # Arguments
///
/// * `values` - The scores to rank, higher is better
///
/// # Returns
///
/// For each input, 1 plus the number of strictly greater valid values, so
/// the best value ranks 1 and ties share the lowest rank of their group.
///
/// # Edge Cases
///
/// - NaN inputs: `None`, and they do not push other ranks down
/// - Ties: `[2, 2, 1]` ranks as `[1, 1, 3]`
///
/// # Examples
///
/// ```
/// use makro_traits::stats::min_ranks_descending;
///
/// let ranks = min_ranks_descending(&[2.0, f64::NAN, 2.0, 1.0]);
/// assert_eq!(ranks, vec![Some(1), None, Some(1), Some(3)]);
/// ```
pub fn min_ranks_descending(values: &[f64]) -> Vec<Option<usize>> {
    let mut valid: Vec<f64> = non_nan(values);
    valid.sort_by(|a, b| b.total_cmp(a));
    values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                None
            } else {
                Some(1 + valid.partition_point(|&x| x > v))
            }
        })
        .collect()
}

/// Pearson correlation over the pairs where both values are present.
///
/// NaN with fewer than two pairs or when either side is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(a, b)| (*a, *b))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in &pairs {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    let denom = (sxx * syy).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    sxy / denom
}

/// Spearman rank correlation over the pairs where both values are present.
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(a, b)| (*a, *b))
        .unzip();
    pearson(&average_ranks(&xs), &average_ranks(&ys))
}

// Rational approximation coefficients for the inverse normal CDF (Acklam).
const A: [f64; 6] = [
    -3.969_683_028_665_376e1,
    2.209_460_984_245_205e2,
    -2.759_285_104_469_687e2,
    1.383_577_518_672_69e2,
    -3.066_479_806_614_716e1,
    2.506_628_277_459_239,
];
const B: [f64; 5] = [
    -5.447_609_879_822_406e1,
    1.615_858_368_580_409e2,
    -1.556_989_798_598_866e2,
    6.680_131_188_771_972e1,
    -1.328_068_155_288_572e1,
];
const C: [f64; 6] = [
    -7.784_894_002_430_293e-3,
    -3.223_964_580_411_365e-1,
    -2.400_758_277_161_838,
    -2.549_732_539_343_734,
    4.374_664_141_464_968,
    2.938_163_982_698_783,
];
const D: [f64; 4] = [
    7.784_695_709_041_462e-3,
    3.224_671_290_700_398e-1,
    2.445_134_137_142_996,
    3.754_408_661_907_416,
];
const P_LOW: f64 = 0.024_25;

fn tail(q: f64) -> f64 {
    (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
        / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
}

/// Acklam's rational approximation for `p` in `(0, 0.5]`.
fn acklam_lower(p: f64) -> f64 {
    if p < P_LOW {
        return tail((-2.0 * p.ln()).sqrt());
    }
    let q = p - 0.5;
    let r = q * q;
    (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
        / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
}

/// Standard normal CDF.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * libm::erfc(-x / std::f64::consts::SQRT_2)
}

/// Inverse of the standard normal CDF.
///
/// Acklam's rational approximation followed by one Halley step against the
/// `erfc`-based CDF. The upper half is solved through `1 - p`, which is exact
/// there, so both tails keep full precision.
///
/// # Arguments
///
/// * `p` - A probability
///
/// # Returns
///
/// The `x` with `normal_cdf(x) == p`, to about 1e-9 absolute error or better
/// across `(0, 1)`.
///
/// # Edge Cases
///
/// - `p <= 0`: negative infinity
/// - `p >= 1`: positive infinity
/// - NaN: NaN
///
/// # Examples
///
/// ```
/// use makro_traits::stats::inverse_normal_cdf;
///
/// assert!((inverse_normal_cdf(0.975) - 1.959_963_984_540_054).abs() < 1e-9);
/// assert_eq!(inverse_normal_cdf(0.5), 0.0);
/// assert_eq!(inverse_normal_cdf(1.0), f64::INFINITY);
/// ```
pub fn inverse_normal_cdf(p: f64) -> f64 {
    if p.is_nan() {
        return f64::NAN;
    }
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if p > 0.5 {
        return -lower_quantile(1.0 - p);
    }
    lower_quantile(p)
}

/// Quantile for `p` in `(0, 0.5]`, refined by one Halley step.
fn lower_quantile(p: f64) -> f64 {
    let x = acklam_lower(p);
    let e = normal_cdf(x) - p;
    let u = e * (2.0 * std::f64::consts::PI).sqrt() * (0.5 * x * x).exp();
    x - u / (1.0 + 0.5 * x * u)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_nan_reductions() {
        let values = [1.0, f64::NAN, 3.0, 2.0];
        assert_relative_eq!(nan_mean(&values), 2.0);
        assert_relative_eq!(nan_median(&values), 2.0);
        assert_relative_eq!(nan_std(&values, 0), (2.0f64 / 3.0).sqrt());
        assert_relative_eq!(nan_std(&values, 1), 1.0);
        assert!(nan_mean(&[f64::NAN]).is_nan());
        assert!(nan_std(&[1.0], 1).is_nan());
    }

    #[test]
    fn test_nan_quantile_linear() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(nan_quantile(&values, 0.25), 1.75);
        assert_relative_eq!(nan_quantile(&values, 0.5), 2.5);
        assert_relative_eq!(nan_quantile(&values, 1.0), 4.0);
        assert!(nan_quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_zscore_population() {
        let (z, result) = zscore(&[1.0, 2.0, 3.0]);
        assert!(result.applied);
        assert_relative_eq!(result.scale, (2.0f64 / 3.0).sqrt());
        assert_relative_eq!(z[0], -z[2]);
        assert_relative_eq!(z[1], 0.0);
    }

    #[test]
    fn test_zscore_constant_divides_by_one() {
        let (z, result) = zscore(&[5.0, 5.0, 5.0]);
        assert!(!result.applied);
        assert!(z.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_robust_zscore() {
        let (z, result) = robust_zscore(&[1.0, 2.0, 3.0, 4.0, 100.0]);
        assert_relative_eq!(result.center, 3.0);
        assert_relative_eq!(result.scale, MAD_SCALE);
        assert_relative_eq!(z[2], 0.0);
        assert_relative_eq!(z[3], 1.0 / MAD_SCALE);
    }

    #[test]
    fn test_average_ranks_ties_and_nan() {
        let ranks = average_ranks(&[3.0, 1.0, f64::NAN, 3.0, 2.0]);
        assert_relative_eq!(ranks[0], 3.5);
        assert_relative_eq!(ranks[1], 1.0);
        assert!(ranks[2].is_nan());
        assert_relative_eq!(ranks[3], 3.5);
        assert_relative_eq!(ranks[4], 2.0);
    }

    #[test]
    fn test_min_ranks_descending() {
        let ranks = min_ranks_descending(&[0.5, 2.0, f64::NAN, 2.0, -1.0]);
        assert_eq!(ranks, vec![Some(3), Some(1), None, Some(1), Some(4)]);
    }

    #[test]
    fn test_spearman() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(spearman(&x, &[10.0, 20.0, 30.0, 1000.0]), 1.0);
        assert_relative_eq!(spearman(&x, &[4.0, 3.0, 2.0, 1.0]), -1.0);
        assert!(spearman(&x, &[1.0, 1.0, 1.0, 1.0]).is_nan());
        assert!(spearman(&[1.0, f64::NAN], &[2.0, 3.0]).is_nan());
    }

    #[test]
    fn test_inverse_normal_cdf() {
        assert_relative_eq!(inverse_normal_cdf(0.5), 0.0);
        assert_relative_eq!(inverse_normal_cdf(0.975), 1.959_963_984_540_054, epsilon = 1e-9);
        assert_relative_eq!(inverse_normal_cdf(0.999), 3.090_232_306_167_813, epsilon = 1e-9);
        assert_relative_eq!(inverse_normal_cdf(0.01), -2.326_347_874_040_841, epsilon = 1e-9);
        assert_relative_eq!(inverse_normal_cdf(0.02), -2.053_748_910_631_823, epsilon = 1e-9);
        assert_relative_eq!(inverse_normal_cdf(1e-4), -3.719_016_485_455_68, epsilon = 1e-9);
        assert_relative_eq!(inverse_normal_cdf(1e-10), -6.361_340_902_404_056, epsilon = 1e-9);
        assert_relative_eq!(
            inverse_normal_cdf(0.3),
            -inverse_normal_cdf(0.7),
            epsilon = 1e-9
        );
        assert_eq!(inverse_normal_cdf(0.0), f64::NEG_INFINITY);
        assert_eq!(inverse_normal_cdf(1.0), f64::INFINITY);
        assert!(inverse_normal_cdf(f64::NAN).is_nan());
    }

    #[test]
    fn test_inverse_normal_cdf_tails_invert_cdf() {
        for p in [f64::EPSILON, 1e-12, 1e-8, 1e-4, 0.02, 0.024_25, 0.3] {
            let x = inverse_normal_cdf(p);
            assert_relative_eq!(normal_cdf(x), p, max_relative = 1e-12);
        }
        // 1 - p is only exact to about 1e-16, so keep to where that is negligible.
        for p in [1e-4, 0.02, 0.024_25, 0.3] {
            let upper = inverse_normal_cdf(1.0 - p);
            assert_relative_eq!(upper, -inverse_normal_cdf(p), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_is_close() {
        assert!(is_close(0.0, 1e-9));
        assert!(!is_close(0.0, 1e-7));
    }
}
