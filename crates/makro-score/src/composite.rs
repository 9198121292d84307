//! Coverage ratios and the weighted composite score.

use std::collections::BTreeMap;

use makro_traits::stats::{is_close, nan_median, nan_quantile};
use makro_traits::{CountrySeries, IndicatorId, Pivot};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::scorer::Scorer;

/// Indicator weights. They need not sum to one.
pub type IndicatorWeights = BTreeMap<IndicatorId, f64>;

/// Configuration for the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    /// Multiply scores by the coverage penalty.
    pub apply_coverage_penalty: bool,
    /// IQR multiple below the median coverage at which the penalty reaches 0.
    pub coverage_k: f64,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            apply_coverage_penalty: false,
            coverage_k: 1.0,
        }
    }
}

/// Fraction of pivot columns with a value, per country.
///
/// A pivot without columns has zero coverage everywhere.
pub fn compute_coverage(pivot: &Pivot) -> CountrySeries {
    let n_cols = pivot.n_indicators();
    CountrySeries::from_pairs(pivot.countries().iter().enumerate().map(|(i, c)| {
        let present = pivot.row(i).iter().filter(|v| !v.is_nan()).count();
        let ratio = if n_cols == 0 {
            0.0
        } else {
            present as f64 / n_cols as f64
        };
        (c.clone(), ratio)
    }))
}

/// Weighted mean of the present values in one row.
///
/// `weights[j]` belongs to `row[j]`. NaN when no weight is present.
pub(crate) fn weighted_row(row: ArrayView1<'_, f64>, weights: &[f64]) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (v, w) in row.iter().zip(weights) {
        if !v.is_nan() && !w.is_nan() {
            numerator += v * w;
            denominator += w;
        }
    }
    if denominator == 0.0 {
        f64::NAN
    } else {
        numerator / denominator
    }
}

/// Composite score per country over the weighted indicators.
///
/// Pivot columns without a weight are ignored and weighted indicators absent
/// from the pivot count as missing. With `apply_coverage_penalty` the score is
/// multiplied by [`coverage_penalty`] of the pivot's coverage.
pub fn compute_composite(
    pivot: &Pivot,
    weights: &IndicatorWeights,
    config: &CompositeConfig,
) -> CountrySeries {
    let column_weights: Vec<f64> = pivot
        .indicators()
        .iter()
        .map(|ind| weights.get(ind).copied().unwrap_or(f64::NAN))
        .collect();
    let missing: Vec<&IndicatorId> = weights
        .keys()
        .filter(|k| !pivot.indicators().contains(k))
        .collect();
    if !missing.is_empty() {
        debug!(?missing, "weighted indicators absent from pivot");
    }

    let mut scores = CountrySeries::from_pairs(
        pivot
            .countries()
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), weighted_row(pivot.row(i), &column_weights))),
    );

    if config.apply_coverage_penalty {
        let multiplier = coverage_penalty(&compute_coverage(pivot), config.coverage_k);
        scores = CountrySeries::from_pairs(
            scores
                .iter()
                .map(|(c, s)| (c, s * multiplier.get(c).unwrap_or(0.0))),
        );
    }
    scores
}

/// Coverage-based score multiplier in `[0, 1]`.
///
/// With `med` the median coverage and `iqr` its interquartile range, the
/// threshold is `clamp(med - k * iqr, 0, 1)`. Coverage at or above `med` maps
/// to 1, at or below the threshold to 0, linear in between. When the spread
/// is degenerate the multiplier is the coverage itself, clamped to `[0, 1]`.
/// Missing coverage maps to 0.
pub fn coverage_penalty(coverage: &CountrySeries, k: f64) -> CountrySeries {
    let values = coverage.values();
    let med = nan_median(values);
    let iqr = nan_quantile(values, 0.75) - nan_quantile(values, 0.25);
    let threshold = (med - k * iqr).clamp(0.0, 1.0);

    if is_close(iqr, 0.0) || is_close(med, threshold) {
        warn!(
            median = med,
            iqr, "coverage spread is degenerate, using coverage as multiplier"
        );
        return coverage.map_values(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) });
    }

    coverage.map_values(|v| {
        if v.is_nan() {
            0.0
        } else if v >= med {
            1.0
        } else if v <= threshold {
            0.0
        } else {
            ((v - threshold) / (med - threshold)).clamp(0.0, 1.0)
        }
    })
}

/// Composite scorer using configured indicator weights.
///
/// # Examples
///
/// ```rust
/// use makro_score::{CompositeConfig, IndicatorWeights, Scorer, WeightedScorer};
/// use makro_traits::Pivot;
///
/// let pivot = Pivot::from_cells(
///     [("gdp", "DEU", 1.0), ("cpi", "DEU", -1.0), ("gdp", "FRA", 0.5)],
///     &["gdp".to_string(), "cpi".to_string()],
/// );
/// let weights: IndicatorWeights = [("gdp".to_string(), 3.0), ("cpi".to_string(), 1.0)].into();
/// let scorer = WeightedScorer::new(weights, CompositeConfig::default());
///
/// let scores = scorer.score(&pivot);
/// assert_eq!(scores.get("DEU"), Some(0.5));
/// assert_eq!(scores.get("FRA"), Some(0.5));
/// ```
#[derive(Debug, Clone)]
pub struct WeightedScorer {
    weights: IndicatorWeights,
    config: CompositeConfig,
}

impl WeightedScorer {
    /// Create a scorer with the given weights and composite configuration.
    pub const fn new(weights: IndicatorWeights, config: CompositeConfig) -> Self {
        Self { weights, config }
    }

    /// Configured weights.
    pub const fn weights(&self) -> &IndicatorWeights {
        &self.weights
    }

    /// Composite configuration.
    pub const fn config(&self) -> &CompositeConfig {
        &self.config
    }
}

impl Scorer for WeightedScorer {
    fn score(&self, pivot: &Pivot) -> CountrySeries {
        compute_composite(pivot, &self.weights, &self.config)
    }

    fn name(&self) -> &str {
        "weighted"
    }
}
