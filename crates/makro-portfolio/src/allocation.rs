//! Score-proportional allocation with per-asset bounds and region caps.
//!
//! Scores are shifted to be non-negative, optionally cut to the top `n`, and
//! turned into weights by water-filling: each round hands the remaining budget
//! out in proportion to the remaining scores, pins shares below the floor at
//! the floor, then pins shares above the ceiling at the ceiling.

use std::collections::BTreeMap;

use makro_traits::{Country, CountrySeries, MakroError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Slack used for every bound comparison.
const TOLERANCE: f64 = 1e-12;

/// Slack allowed on the bounds of the normalized weights.
const BOUND_SLACK: f64 = 1e-9;

/// Bisection rounds when searching the fill level.
const LEVEL_ROUNDS: usize = 200;

/// Per-asset allocation bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Floor for every allocated asset.
    pub min_alloc: f64,
    /// Ceiling for every allocated asset.
    pub max_alloc: f64,
    /// Allocate only to the best `top_n` scores.
    pub top_n: Option<usize>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            min_alloc: 0.0,
            max_alloc: 1.0,
            top_n: None,
        }
    }
}

impl AllocationConfig {
    /// Check the bounds are ordered fractions and `top_n` is positive.
    ///
    /// Feasibility against the number of assets is checked at allocation
    /// time, since it depends on the scores.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_alloc) || !(0.0..=1.0).contains(&self.max_alloc) {
            return Err(MakroError::InvalidConfig(format!(
                "allocation bounds must lie in [0, 1], got min_alloc={} max_alloc={}",
                self.min_alloc, self.max_alloc
            )));
        }
        if self.min_alloc > self.max_alloc {
            return Err(MakroError::InvalidConfig(format!(
                "min_alloc {} exceeds max_alloc {}",
                self.min_alloc, self.max_alloc
            )));
        }
        if self.top_n == Some(0) {
            return Err(MakroError::InvalidConfig("top_n must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Cap on the total weight of each region.
///
/// Countries without a region are never capped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionCap {
    /// Country to region mapping.
    pub regions: BTreeMap<Country, String>,
    /// Maximum total weight per region.
    pub max_region_alloc: f64,
}

impl RegionCap {
    /// Create a region cap.
    pub const fn new(regions: BTreeMap<Country, String>, max_region_alloc: f64) -> Self {
        Self {
            regions,
            max_region_alloc,
        }
    }

    /// Check the cap is a fraction.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.max_region_alloc) {
            return Err(MakroError::InvalidConfig(format!(
                "max_region_alloc must lie in [0, 1], got {}",
                self.max_region_alloc
            )));
        }
        Ok(())
    }

    /// Region of a country, if mapped.
    pub fn region_of(&self, country: &str) -> Option<&str> {
        self.regions.get(country).map(String::as_str)
    }
}

/// Convert scores into weights that sum to one.
///
/// NaN scores are dropped. If any score is negative every score is shifted by
/// the minimum. With `top_n` only the highest scores are kept (ties keep input
/// order). All-zero scores allocate equally. Every weight lies in
/// `[min_alloc, max_alloc]` and, with a region cap, over-cap regions are
/// scaled down and the freed weight handed to the remaining countries.
///
/// # Errors
///
/// [`MakroError::MinAllocTooLarge`] when `min_alloc * n > 1`,
/// [`MakroError::MaxAllocTooSmall`] when `max_alloc * n < 1`, and
/// [`MakroError::InfeasibleAllocation`] if the clamped shares cannot spend
/// the budget.
///
/// # Examples
///
/// ```rust
/// use makro_portfolio::{AllocationConfig, score_to_weights};
/// use makro_traits::CountrySeries;
///
/// let scores = CountrySeries::from_pairs([("DEU", 3.0), ("FRA", 1.0)]);
/// let weights = score_to_weights(&scores, &AllocationConfig::default(), None).unwrap();
/// assert!((weights.get("DEU").unwrap() - 0.75).abs() < 1e-12);
/// ```
pub fn score_to_weights(
    scores: &CountrySeries,
    config: &AllocationConfig,
    region_cap: Option<&RegionCap>,
) -> Result<CountrySeries> {
    config.validate()?;
    let mut scores = scores.drop_nan();
    if scores.is_empty() {
        return Ok(CountrySeries::empty());
    }

    let min_score = scores.values().iter().copied().fold(f64::INFINITY, f64::min);
    if min_score < 0.0 {
        scores = scores.map_values(|v| v - min_score);
    }
    if let Some(top_n) = config.top_n.filter(|&k| scores.len() > k) {
        scores = largest(&scores, top_n);
    }

    let n = scores.len();
    if config.min_alloc * (n as f64) > 1.0 + TOLERANCE {
        return Err(MakroError::MinAllocTooLarge {
            min_alloc: config.min_alloc,
            n,
        });
    }
    if config.max_alloc * (n as f64) < 1.0 - TOLERANCE {
        return Err(MakroError::MaxAllocTooSmall {
            max_alloc: config.max_alloc,
            n,
        });
    }

    let mut raw = scores.values().to_vec();
    if raw.iter().sum::<f64>() == 0.0 {
        debug!(n, "all scores are zero, allocating equally");
        raw = vec![1.0; n];
    }

    let mut values = water_fill(&raw, config.min_alloc, config.max_alloc)?;
    let in_bounds = values
        .iter()
        .all(|w| *w >= config.min_alloc - BOUND_SLACK && *w <= config.max_alloc + BOUND_SLACK);
    if !in_bounds {
        warn!(
            n,
            min_alloc = config.min_alloc,
            max_alloc = config.max_alloc,
            "water-filling broke the bounds, searching a common fill level instead"
        );
        values = normalize(level_fill(&raw, config.min_alloc, config.max_alloc)?);
    }
    let weights = CountrySeries::new(scores.labels().to_vec(), values)?;

    match region_cap {
        Some(cap) if !cap.regions.is_empty() => Ok(apply_region_cap(&weights, cap)),
        _ => Ok(weights),
    }
}

/// The `n` highest entries in descending order; ties keep input order.
fn largest(scores: &CountrySeries, n: usize) -> CountrySeries {
    let values = scores.values();
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    CountrySeries::from_pairs(
        order
            .into_iter()
            .take(n)
            .map(|i| (scores.labels()[i].clone(), values[i])),
    )
}

/// Scale to sum to one; no weight at all becomes equal weights.
fn normalize(weights: Vec<f64>) -> Vec<f64> {
    let n = weights.len();
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        weights.into_iter().map(|w| w / total).collect()
    } else {
        warn!(n, "water-filling produced no weight, allocating equally");
        vec![1.0 / n as f64; n]
    }
}

/// Share of `budget` for `score` out of the remaining `mass`.
///
/// A pool with no score mass left splits the budget equally.
fn share(score: f64, mass: f64, budget: f64, n_open: usize) -> f64 {
    if mass > 0.0 {
        score / mass * budget
    } else {
        budget / n_open as f64
    }
}

/// Pin-and-redistribute water-filling, normalized to sum to one.
///
/// Every round computes provisional shares of the remaining budget for the
/// open assets. Shares under `min_alloc` are pinned at the floor first, then
/// shares over `max_alloc` at the ceiling, each leaving the pool with its
/// score. The loop stops when no open share breaks a bound or after `3n`
/// rounds, when the open assets take their proportional share of what is
/// left.
///
/// # Errors
///
/// [`MakroError::InfeasibleAllocation`] when pinning overdraws the budget.
fn water_fill(scores: &[f64], min_alloc: f64, max_alloc: f64) -> Result<Vec<f64>> {
    let n = scores.len();
    let mut weights = vec![0.0; n];
    let mut open: Vec<usize> = (0..n).collect();
    let mut budget = 1.0;
    let mut mass: f64 = scores.iter().sum();

    for round in 0..3 * n {
        if open.is_empty() {
            break;
        }
        let provisional: Vec<(usize, f64)> = open
            .iter()
            .map(|&i| (i, share(scores[i], mass, budget, open.len())))
            .collect();
        let low: Vec<usize> = provisional
            .iter()
            .filter(|(_, w)| *w < min_alloc - TOLERANCE)
            .map(|(i, _)| *i)
            .collect();
        let high: Vec<usize> = provisional
            .iter()
            .filter(|(_, w)| *w > max_alloc + TOLERANCE)
            .map(|(i, _)| *i)
            .collect();

        if low.is_empty() && high.is_empty() {
            for (i, w) in provisional {
                weights[i] = w;
            }
            open.clear();
            break;
        }

        for (pinned, bound) in [(low, min_alloc), (high, max_alloc)] {
            if pinned.is_empty() {
                continue;
            }
            for i in pinned {
                weights[i] = bound;
                open.retain(|&j| j != i);
                budget -= bound;
                mass -= scores[i];
            }
            if budget < -TOLERANCE {
                return Err(MakroError::InfeasibleAllocation(format!(
                    "pinning at {bound} overdraws the budget by {}",
                    -budget
                )));
            }
        }
        debug!(round, open = open.len(), budget, "water-fill round");
    }

    if !open.is_empty() && budget > 0.0 {
        let n_open = open.len();
        for &i in &open {
            weights[i] = share(scores[i], mass, budget, n_open);
        }
    }
    Ok(normalize(weights))
}

/// Weights `clamp(score * level, min_alloc, max_alloc)` at the level where
/// they sum to one.
///
/// Raising the level fills every asset in proportion to its score until it
/// reaches the ceiling, while assets below the floor sit at the floor. When
/// the positive scores saturate before the budget is spent, the rest is split
/// equally between the zero scores.
fn level_fill(scores: &[f64], min_alloc: f64, max_alloc: f64) -> Result<Vec<f64>> {
    let fill = |level: f64| -> Vec<f64> {
        scores
            .iter()
            .map(|s| (s * level).clamp(min_alloc, max_alloc))
            .collect()
    };
    let n = scores.len();
    let n_positive = scores.iter().filter(|s| **s > 0.0).count();
    let n_zero = n - n_positive;
    let saturated = n_positive as f64 * max_alloc + n_zero as f64 * min_alloc;

    let weights = if n_positive == 0 || saturated < 1.0 - TOLERANCE {
        if n_zero == 0 {
            return Err(MakroError::InfeasibleAllocation(format!(
                "{n} assets capped at {max_alloc} cannot absorb the budget"
            )));
        }
        let rest = (1.0 - n_positive as f64 * max_alloc) / n_zero as f64;
        debug!(n_zero, rest, "positive scores saturated, splitting rest over zero scores");
        scores
            .iter()
            .map(|s| if *s > 0.0 { max_alloc } else { rest })
            .collect()
    } else {
        let smallest = scores
            .iter()
            .copied()
            .filter(|s| *s > 0.0)
            .fold(f64::INFINITY, f64::min);
        let mut lo = 0.0;
        let mut hi = max_alloc / smallest;
        for _ in 0..LEVEL_ROUNDS {
            let mid = 0.5 * (lo + hi);
            if mid <= lo || mid >= hi {
                break;
            }
            if fill(mid).iter().sum::<f64>() < 1.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        fill(hi)
    };

    let total: f64 = weights.iter().sum();
    if (total - 1.0).abs() > 1e-6 {
        return Err(MakroError::InfeasibleAllocation(format!(
            "bounded weights sum to {total}"
        )));
    }
    Ok(weights)
}

/// Scale over-cap regions down to the cap and hand the freed weight to the
/// countries outside them, then renormalize.
fn apply_region_cap(weights: &CountrySeries, cap: &RegionCap) -> CountrySeries {
    let limit = cap.max_region_alloc;
    let regions: Vec<Option<&str>> = weights.labels().iter().map(|c| cap.region_of(c)).collect();
    let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, region) in regions.iter().enumerate() {
        if let Some(region) = region {
            members.entry(region).or_default().push(i);
        }
    }

    let mut adjusted = weights.values().to_vec();
    let mut freed = 0.0;
    for (region, idx) in &members {
        let total: f64 = idx.iter().map(|&i| adjusted[i]).sum();
        if total > limit + TOLERANCE {
            let factor = limit / total;
            for &i in idx {
                adjusted[i] *= factor;
            }
            let capped: f64 = idx.iter().map(|&i| adjusted[i]).sum();
            freed += total - capped;
            debug!(region, total, cap = limit, "region scaled down to cap");
        }
    }

    if freed > TOLERANCE {
        let region_sums: BTreeMap<&str, f64> = members
            .iter()
            .map(|(r, idx)| (*r, idx.iter().map(|&i| adjusted[i]).sum()))
            .collect();
        let eligible: Vec<usize> = regions
            .iter()
            .enumerate()
            .filter(|(_, r)| match r {
                None => true,
                Some(r) => region_sums.get(r).copied().unwrap_or(0.0) < limit - TOLERANCE,
            })
            .map(|(i, _)| i)
            .collect();

        if eligible.is_empty() {
            warn!(freed, "no country can absorb weight freed by the region cap");
        } else {
            let current: f64 = eligible.iter().map(|&i| adjusted[i]).sum();
            for &i in &eligible {
                adjusted[i] += if current == 0.0 {
                    freed / eligible.len() as f64
                } else {
                    adjusted[i] / current * freed
                };
            }
        }
    }

    let capped = CountrySeries::from_pairs(weights.labels().iter().cloned().zip(adjusted));
    capped.normalized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series(pairs: &[(&str, f64)]) -> CountrySeries {
        CountrySeries::from_pairs(pairs.iter().map(|(c, v)| (*c, *v)))
    }

    fn bounded(min_alloc: f64, max_alloc: f64) -> AllocationConfig {
        AllocationConfig {
            min_alloc,
            max_alloc,
            top_n: None,
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        let scores = series(&[("A", 0.3), ("B", -1.2), ("C", 2.5), ("D", f64::NAN), ("E", 0.0)]);
        let weights = score_to_weights(&scores, &AllocationConfig::default(), None).unwrap();
        assert_eq!(weights.len(), 4);
        assert!(!weights.contains("D"));
        assert_relative_eq!(weights.sum(), 1.0, epsilon = 1e-8);
        // shifted by the minimum, so the lowest score gets nothing
        assert_relative_eq!(weights.get("B").unwrap(), 0.0);
    }

    #[test]
    fn test_empty_after_nan_drop() {
        let scores = series(&[("A", f64::NAN)]);
        let weights = score_to_weights(&scores, &AllocationConfig::default(), None).unwrap();
        assert!(weights.is_empty());
    }

    #[test]
    fn test_all_zero_scores_are_equal_weight() {
        let scores = series(&[("A", 0.0), ("B", 0.0), ("C", 0.0), ("D", 0.0)]);
        let weights = score_to_weights(&scores, &AllocationConfig::default(), None).unwrap();
        for w in weights.values() {
            assert_relative_eq!(*w, 0.25, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_bounds_respected() {
        let scores = series(&[("A", 10.0), ("B", 5.0), ("C", 1.0), ("D", 0.5), ("E", 0.1)]);
        for (lo, hi) in [(0.05, 0.4), (0.1, 0.3), (0.0, 0.25), (0.15, 1.0), (0.2, 0.2)] {
            let weights = score_to_weights(&scores, &bounded(lo, hi), None).unwrap();
            assert_relative_eq!(weights.sum(), 1.0, epsilon = 1e-8);
            for w in weights.values() {
                assert!(*w >= lo - 1e-8 && *w <= hi + 1e-8, "{w} outside [{lo}, {hi}]");
            }
        }
    }

    #[test]
    fn test_max_alloc_redistributes() {
        let scores = series(&[("A", 8.0), ("B", 1.0), ("C", 1.0)]);
        let weights = score_to_weights(&scores, &bounded(0.0, 0.5), None).unwrap();
        assert_relative_eq!(weights.get("A").unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(weights.get("B").unwrap(), 0.25, epsilon = 1e-12);
        assert_relative_eq!(weights.get("C").unwrap(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_floor_pinned_before_ceiling() {
        // C is pinned at the floor, then A at the ceiling, and B takes the rest.
        let scores = series(&[("A", 10.0), ("B", 5.0), ("C", 4.0)]);
        let weights = score_to_weights(&scores, &bounded(0.25, 0.4), None).unwrap();
        assert_relative_eq!(weights.get("A").unwrap(), 0.4, epsilon = 1e-12);
        assert_relative_eq!(weights.get("B").unwrap(), 0.35, epsilon = 1e-12);
        assert_relative_eq!(weights.get("C").unwrap(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_overpinned_pool_falls_back_to_level_fill() {
        // Pinning leaves 0.8 on the table and renormalizing would push A to 0.5,
        // so the common fill level decides: B rises to the ceiling, C stays at
        // the floor.
        let scores = series(&[("A", 10.0), ("B", 2.0), ("C", 1.0)]);
        let weights = score_to_weights(&scores, &bounded(0.2, 0.4), None).unwrap();
        assert_relative_eq!(weights.get("A").unwrap(), 0.4, epsilon = 1e-9);
        assert_relative_eq!(weights.get("B").unwrap(), 0.4, epsilon = 1e-9);
        assert_relative_eq!(weights.get("C").unwrap(), 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_water_fill_rounds() {
        let filled = water_fill(&[10.0, 5.0, 4.0], 0.25, 0.4).unwrap();
        assert_relative_eq!(filled[1], 0.35, epsilon = 1e-12);

        // The pinned pool renormalizes past the ceiling.
        let filled = water_fill(&[10.0, 2.0, 1.0], 0.2, 0.4).unwrap();
        assert_relative_eq!(filled[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(filled[1], 0.25, epsilon = 1e-12);

        // With no score mass left the open assets split the budget.
        let filled = water_fill(&[3.0, 1.0, 0.0], 0.0, 0.4).unwrap();
        assert_relative_eq!(filled[0], 0.4, epsilon = 1e-12);
        assert_relative_eq!(filled[1], 0.4, epsilon = 1e-12);
        assert_relative_eq!(filled[2], 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_min_alloc_too_large() {
        let scores = series(&[("A", 1.0), ("B", 2.0), ("C", 3.0)]);
        let err = score_to_weights(&scores, &bounded(0.5, 1.0), None).unwrap_err();
        assert!(matches!(err, MakroError::MinAllocTooLarge { n: 3, .. }));
    }

    #[test]
    fn test_max_alloc_too_small() {
        let scores = series(&[("A", 1.0), ("B", 2.0), ("C", 3.0)]);
        let err = score_to_weights(&scores, &bounded(0.0, 0.3), None).unwrap_err();
        assert!(matches!(err, MakroError::MaxAllocTooSmall { n: 3, .. }));
    }

    #[test]
    fn test_top_n() {
        let scores = series(&[("A", 1.0), ("B", 4.0), ("C", 3.0), ("D", 2.0)]);
        let config = AllocationConfig {
            top_n: Some(2),
            ..AllocationConfig::default()
        };
        let weights = score_to_weights(&scores, &config, None).unwrap();
        assert_eq!(weights.labels(), &["B".to_string(), "C".to_string()]);
        assert_relative_eq!(weights.get("B").unwrap(), 4.0 / 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_top_n_checked_after_cut() {
        let scores = series(&[("A", 1.0), ("B", 4.0), ("C", 3.0), ("D", 2.0)]);
        let config = AllocationConfig {
            min_alloc: 0.3,
            max_alloc: 1.0,
            top_n: Some(3),
        };
        // 4 * 0.3 > 1 but only 3 assets remain
        assert!(score_to_weights(&scores, &config, None).is_ok());
    }

    #[test]
    fn test_region_cap() {
        let scores = series(&[("A", 4.0), ("B", 4.0), ("C", 2.0)]);
        let cap = RegionCap::new(
            [("A".to_string(), "EU".to_string()), ("B".to_string(), "EU".to_string())].into(),
            0.5,
        );
        let weights = score_to_weights(&scores, &AllocationConfig::default(), Some(&cap)).unwrap();
        let eu = weights.get("A").unwrap() + weights.get("B").unwrap();
        assert!(eu <= 0.5 + 1e-6);
        assert_relative_eq!(weights.sum(), 1.0, epsilon = 1e-8);
        assert_relative_eq!(weights.get("C").unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_region_cap_zero_weight_recipients_split_equally() {
        let scores = series(&[("A", 5.0), ("B", 0.0), ("C", 0.0)]);
        let cap = RegionCap::new([("A".to_string(), "X".to_string())].into(), 0.4);
        let weights = score_to_weights(&scores, &AllocationConfig::default(), Some(&cap)).unwrap();
        assert_relative_eq!(weights.get("A").unwrap(), 0.4, epsilon = 1e-12);
        assert_relative_eq!(weights.get("B").unwrap(), 0.3, epsilon = 1e-12);
        assert_relative_eq!(weights.get("C").unwrap(), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_region_cap_under_limit_is_noop() {
        let scores = series(&[("A", 1.0), ("B", 1.0)]);
        let cap = RegionCap::new([("A".to_string(), "X".to_string())].into(), 0.9);
        let weights = score_to_weights(&scores, &AllocationConfig::default(), Some(&cap)).unwrap();
        assert_relative_eq!(weights.get("A").unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_validate() {
        assert!(bounded(0.6, 0.4).validate().is_err());
        assert!(bounded(-0.1, 0.4).validate().is_err());
        let config = AllocationConfig {
            top_n: Some(0),
            ..AllocationConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(RegionCap::new(BTreeMap::new(), 1.5).validate().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config: AllocationConfig = serde_json::from_str(r#"{"max_alloc": 0.4, "top_n": 5}"#).unwrap();
        assert_eq!(config.min_alloc, 0.0);
        assert_eq!(config.max_alloc, 0.4);
        assert_eq!(config.top_n, Some(5));
    }
}
