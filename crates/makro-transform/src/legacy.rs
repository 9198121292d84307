//! Per-series standardization without a rolling baseline.
//!
//! Operates on the raw values of one series and keeps its own degenerate-case
//! rules (divide by 1 on zero scale) which differ from the pipeline form.

use std::fmt;
use std::str::FromStr;

use makro_traits::stats::{
    MAD_SCALE, average_ranks, clip, inverse_normal_cdf, nan_mad, nan_median, nan_quantile,
    robust_zscore, zscore,
};
use makro_traits::{MakroError, Result};
use tracing::warn;

/// Per-series standardization methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyMethod {
    /// Mean / population std.
    ZScore,
    /// Median / scaled MAD over the whole series.
    RobustZScore,
    /// Rolling median / rolling scaled MAD over a trailing window.
    RollingRobustZScore {
        /// Window length; `<= 1` means the global form.
        window: usize,
    },
    /// Clip at the 1% / 99% quantiles, then z-score.
    WinsorizedZScore,
    /// Blom normal scores.
    RankNormalization,
    /// Rescale to `[0, 1]`.
    MinMax,
    /// Clip at the 5% / 95% quantiles.
    Winsorize,
}

impl LegacyMethod {
    /// Method names accepted by [`FromStr`].
    pub const NAMES: [&'static str; 7] = [
        "zscore",
        "robust_zscore",
        "robust_zscore(window=N)",
        "winsorized_zscore",
        "rank_normalization",
        "minmax",
        "winsorize",
    ];
}

impl fmt::Display for LegacyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZScore => f.write_str("zscore"),
            Self::RobustZScore => f.write_str("robust_zscore"),
            Self::RollingRobustZScore { window } => write!(f, "robust_zscore(window={window})"),
            Self::WinsorizedZScore => f.write_str("winsorized_zscore"),
            Self::RankNormalization => f.write_str("rank_normalization"),
            Self::MinMax => f.write_str("minmax"),
            Self::Winsorize => f.write_str("winsorize"),
        }
    }
}

impl FromStr for LegacyMethod {
    type Err = MakroError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "zscore" => return Ok(Self::ZScore),
            "robust_zscore" => return Ok(Self::RobustZScore),
            "winsorized_zscore" => return Ok(Self::WinsorizedZScore),
            "rank_normalization" => return Ok(Self::RankNormalization),
            "minmax" => return Ok(Self::MinMax),
            "winsorize" => return Ok(Self::Winsorize),
            _ => {}
        }

        let args = s
            .strip_prefix("robust_zscore(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| MakroError::UnknownMethod(s.to_string()))?;

        // e.g. "window=40,p=0.99"; only `window` is used
        let mut window = 0usize;
        for part in args.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| MakroError::UnknownMethod(s.to_string()))?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| MakroError::UnknownMethod(s.to_string()))?;
            if key.trim() == "window" {
                window = value.max(0.0) as usize;
            }
        }
        Ok(Self::RollingRobustZScore { window })
    }
}

/// Result of [`standardize_series`].
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyOutput {
    /// Series values after any clipping the method performs.
    pub values: Vec<f64>,
    /// Standardized values.
    pub std_values: Vec<f64>,
}

/// Standardize one series with a per-series method.
///
/// For the rolling form, `values` must be in date order.
pub fn standardize_series(values: &[f64], method: LegacyMethod) -> LegacyOutput {
    let plain = |std_values: Vec<f64>| LegacyOutput {
        values: values.to_vec(),
        std_values,
    };

    match method {
        LegacyMethod::ZScore => plain(zscore(values).0),
        LegacyMethod::RobustZScore => plain(robust_zscore(values).0),
        LegacyMethod::RollingRobustZScore { window } if window <= 1 => {
            plain(robust_zscore(values).0)
        }
        LegacyMethod::RollingRobustZScore { window } => plain(rolling_robust(values, window)),
        LegacyMethod::WinsorizedZScore => {
            let clipped = clip_quantiles(values, 0.01, 0.99);
            let std_values = zscore(&clipped).0;
            LegacyOutput {
                values: clipped,
                std_values,
            }
        }
        LegacyMethod::RankNormalization => plain(blom_scores(values)),
        LegacyMethod::MinMax => plain(min_max(values)),
        LegacyMethod::Winsorize => {
            let clipped = clip_quantiles(values, 0.05, 0.95);
            LegacyOutput {
                values: clipped.clone(),
                std_values: clipped,
            }
        }
    }
}

fn clip_quantiles(values: &[f64], lower: f64, upper: f64) -> Vec<f64> {
    clip(values, nan_quantile(values, lower), nan_quantile(values, upper))
}

fn rolling_robust(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut zero_scale = 0usize;
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let win = &values[start..=i];
        let med = nan_median(win);
        let mut scale = nan_mad(win, med) * MAD_SCALE;
        if scale == 0.0 {
            zero_scale += 1;
            scale = 1.0;
        }
        out.push((values[i] - med) / scale);
    }
    if zero_scale > 0 {
        warn!(points = zero_scale, window, "rolling MAD is zero, dividing by 1");
    }
    out
}

fn blom_scores(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n <= 1 {
        return vec![0.0; n];
    }
    average_ranks(values)
        .into_iter()
        .map(|r| inverse_normal_cdf((r - 0.375) / (n as f64 + 0.25)))
        .collect()
}

fn min_max(values: &[f64]) -> Vec<f64> {
    let finite = values.iter().copied().filter(|v| !v.is_nan());
    let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let range = hi - lo;
    let denom = if range != 0.0 && range.is_finite() {
        range
    } else {
        1.0
    };
    values.iter().map(|v| (v - lo) / denom).collect()
}
