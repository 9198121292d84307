//! Bootstrap uncertainty for composite scores.
//!
//! Indicators are resampled with replacement and the weighted composite is
//! recomputed per draw. Each call owns its generator, seeded from the
//! configuration, so results are reproducible.

use makro_traits::stats::{min_ranks_descending, nan_mean, nan_quantile};
use makro_traits::{Country, CountrySeries, MakroError, Pivot, Result};
use ndarray::{Array2, Axis};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::composite::{IndicatorWeights, weighted_row};

/// Configuration for bootstrap score estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Whether the pipeline runs the bootstrap.
    pub enabled: bool,
    /// Number of resampling iterations.
    #[serde(alias = "n")]
    pub n_boot: usize,
    /// Generator seed.
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            n_boot: 1000,
            seed: 0,
        }
    }
}

impl BootstrapConfig {
    /// Check that an enabled bootstrap draws at least once.
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.n_boot == 0 {
            return Err(MakroError::InvalidConfig(
                "bootstrap n_boot must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-country summary of the bootstrap distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapSummary {
    /// Mean score over draws, skipping NaN draws.
    pub mean: CountrySeries,
    /// 2.5% quantile of the draws.
    pub ci_low: CountrySeries,
    /// 97.5% quantile of the draws.
    pub ci_high: CountrySeries,
}

/// Raw bootstrap draws: one row per country, one column per iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapSamples {
    countries: Vec<Country>,
    scores: Array2<f64>,
}

impl BootstrapSamples {
    /// Country labels of the rows.
    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    /// Score matrix, countries x iterations.
    pub const fn scores(&self) -> &Array2<f64> {
        &self.scores
    }

    /// Number of iterations.
    pub fn n_boot(&self) -> usize {
        self.scores.ncols()
    }
}

/// Resample indicators `n_boot` times and summarize the composite scores.
///
/// Weights of drawn indicators come from `weights` (0 when absent) and
/// duplicates are allowed. A pivot without indicators yields empty results.
pub fn bootstrap_scores(
    pivot: &Pivot,
    weights: &IndicatorWeights,
    n_boot: usize,
    seed: u64,
) -> (BootstrapSummary, BootstrapSamples) {
    let k = pivot.n_indicators();
    if k == 0 {
        warn!("bootstrap skipped, pivot has no indicators");
        let empty = CountrySeries::empty();
        return (
            BootstrapSummary {
                mean: empty.clone(),
                ci_low: empty.clone(),
                ci_high: empty,
            },
            BootstrapSamples {
                countries: Vec::new(),
                scores: Array2::zeros((0, 0)),
            },
        );
    }

    let column_weights: Vec<f64> = pivot
        .indicators()
        .iter()
        .map(|ind| weights.get(ind).copied().unwrap_or(0.0))
        .collect();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n_countries = pivot.n_countries();
    let mut scores = Array2::from_elem((n_countries, n_boot), f64::NAN);
    let mut drawn = vec![0usize; k];
    let mut drawn_weights = vec![0.0; k];

    for b in 0..n_boot {
        for (slot, w) in drawn.iter_mut().zip(drawn_weights.iter_mut()) {
            *slot = rng.gen_range(0..k);
            *w = column_weights[*slot];
        }
        let sample = pivot.values().select(Axis(1), &drawn);
        for (i, row) in sample.rows().into_iter().enumerate() {
            scores[[i, b]] = weighted_row(row, &drawn_weights);
        }
    }
    debug!(n_boot, countries = n_countries, indicators = k, seed, "bootstrap complete");

    let countries = pivot.countries().to_vec();
    let summarize = |f: &dyn Fn(&[f64]) -> f64| {
        CountrySeries::from_pairs(
            countries
                .iter()
                .zip(scores.rows())
                .map(|(c, row)| (c.clone(), f(&row.to_vec()))),
        )
    };
    let summary = BootstrapSummary {
        mean: summarize(&nan_mean),
        ci_low: summarize(&|v: &[f64]| nan_quantile(v, 0.025)),
        ci_high: summarize(&|v: &[f64]| nan_quantile(v, 0.975)),
    };
    (summary, BootstrapSamples { countries, scores })
}

/// Fraction of draws in which each country's rank equals its baseline rank.
///
/// Ranks are descending with ties sharing the lowest rank. A NaN score never
/// matches. Countries in `baseline` but not in the samples get 0.
pub fn rank_stability(samples: &BootstrapSamples, baseline: &CountrySeries) -> CountrySeries {
    let n_boot = samples.n_boot();
    let baseline_ranks = min_ranks_descending(baseline.values());
    let rows: Vec<Option<usize>> = baseline
        .labels()
        .iter()
        .map(|c| samples.countries.iter().position(|s| s == c))
        .collect();

    let mut matches = vec![0usize; baseline.len()];
    for column in samples.scores.columns() {
        let draw_ranks = min_ranks_descending(&column.to_vec());
        for (j, row) in rows.iter().enumerate() {
            if let (Some(row), Some(base)) = (row, baseline_ranks[j]) {
                if draw_ranks[*row] == Some(base) {
                    matches[j] += 1;
                }
            }
        }
    }

    CountrySeries::from_pairs(baseline.labels().iter().zip(matches).map(|(c, m)| {
        let stability = if n_boot == 0 {
            0.0
        } else {
            m as f64 / n_boot as f64
        };
        (c.clone(), stability)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::{CompositeConfig, compute_composite};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn pivot() -> Pivot {
        Pivot::new(
            vec!["A".into(), "B".into(), "C".into()],
            vec!["x".into(), "y".into(), "z".into()],
            array![[1.0, 2.0, 3.0], [0.0, f64::NAN, 1.0], [-1.0, -2.0, f64::NAN]],
        )
        .unwrap()
    }

    fn weights() -> IndicatorWeights {
        [("x".to_string(), 1.0), ("y".to_string(), 2.0), ("z".to_string(), 1.0)].into()
    }

    #[test]
    fn test_bootstrap_is_reproducible() {
        let (s1, b1) = bootstrap_scores(&pivot(), &weights(), 50, 7);
        let (s2, b2) = bootstrap_scores(&pivot(), &weights(), 50, 7);
        assert_eq!(b1.scores().dim(), (3, 50));
        assert_eq!(s1.mean.labels(), s2.mean.labels());
        for (a, b) in b1.scores().iter().zip(b2.scores().iter()) {
            assert!(a == b || (a.is_nan() && b.is_nan()));
        }
    }

    #[test]
    fn test_bootstrap_ci_within_row_range() {
        let (summary, _) = bootstrap_scores(&pivot(), &weights(), 200, 1);
        for (c, lo_bound, hi_bound) in [("A", 1.0, 3.0), ("B", 0.0, 1.0), ("C", -2.0, -1.0)] {
            let lo = summary.ci_low.get(c).unwrap();
            let hi = summary.ci_high.get(c).unwrap();
            let mean = summary.mean.get(c).unwrap();
            assert!(lo <= hi);
            assert!(lo >= lo_bound - 1e-12 && hi <= hi_bound + 1e-12);
            assert!(mean >= lo_bound - 1e-12 && mean <= hi_bound + 1e-12);
        }
    }

    #[test]
    fn test_single_indicator_is_stable() {
        let pivot = Pivot::new(
            vec!["A".into(), "B".into(), "C".into()],
            vec!["x".into()],
            array![[3.0], [2.0], [1.0]],
        )
        .unwrap();
        let w: IndicatorWeights = [("x".to_string(), 1.0)].into();
        let (summary, samples) = bootstrap_scores(&pivot, &w, 25, 3);
        assert_relative_eq!(summary.mean.get("A").unwrap(), 3.0);

        let baseline = compute_composite(&pivot, &w, &CompositeConfig::default());
        let stability = rank_stability(&samples, &baseline);
        assert!(stability.values().iter().all(|s| *s == 1.0));
    }

    #[test]
    fn test_stability_in_unit_interval() {
        let (_, samples) = bootstrap_scores(&pivot(), &weights(), 100, 11);
        let baseline = compute_composite(&pivot(), &weights(), &CompositeConfig::default());
        let stability = rank_stability(&samples, &baseline);
        assert_eq!(stability.len(), 3);
        assert!(stability.values().iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_nan_baseline_never_matches() {
        let (_, samples) = bootstrap_scores(&pivot(), &weights(), 10, 0);
        let baseline = CountrySeries::from_pairs([("A", f64::NAN), ("B", 1.0), ("Z", 2.0)]);
        let stability = rank_stability(&samples, &baseline);
        assert_eq!(stability.get("A"), Some(0.0));
        assert_eq!(stability.get("Z"), Some(0.0));
    }

    #[test]
    fn test_empty_pivot() {
        let empty = Pivot::new(vec!["A".into()], vec![], Array2::zeros((1, 0))).unwrap();
        let (summary, samples) = bootstrap_scores(&empty, &weights(), 10, 0);
        assert!(summary.mean.is_empty());
        assert_eq!(samples.n_boot(), 0);
    }

    #[test]
    fn test_validate() {
        let cfg = BootstrapConfig {
            enabled: true,
            n_boot: 0,
            seed: 1,
        };
        assert!(cfg.validate().is_err());
        assert!(BootstrapConfig::default().validate().is_ok());
    }
}
