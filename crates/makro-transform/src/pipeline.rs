//! Per-group standardization of observation tables.
//!
//! Rows are grouped by `(indicator, country)`, each group is processed in date
//! order, and the results are written back in the original row order.

use std::collections::BTreeMap;

use makro_traits::stats::{nan_mean, spearman};
use makro_traits::{
    CountrySeries, MakroError, Observation, ObservationFrame, Result, StandardizedObservation,
};
use polars::prelude::*;
use tracing::{debug, warn};

use crate::config::{GoodDirection, StandardizationMethod, StandardizeConfig};
use crate::primitives::{
    RobustScale, classic_zscore, fill_nan_both_ways, rank_norm, robust_zscore, rolling_baseline,
    rolling_mad, winsorize,
};

/// Rolling-baseline standardizer.
///
/// # Examples
///
/// ```rust
/// use makro_transform::{StandardizationMethod, StandardizeConfig, Standardizer};
///
/// let standardizer = Standardizer::new(StandardizeConfig::default(), StandardizationMethod::ZScore)
///     .unwrap()
///     .with_invert(true);
/// let z = standardizer.standardize_group(&[1.0, 2.0, 3.0, 4.0, 5.0]);
/// assert_eq!(z.len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct Standardizer {
    config: StandardizeConfig,
    method: StandardizationMethod,
    invert: bool,
    good_direction: Option<GoodDirection>,
    auto_sign_check: bool,
}

impl Standardizer {
    /// Create a standardizer, validating the configuration.
    pub fn new(config: StandardizeConfig, method: StandardizationMethod) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            method,
            invert: false,
            good_direction: None,
            auto_sign_check: true,
        })
    }

    /// Create a standardizer from a method name.
    pub fn from_method_name(config: StandardizeConfig, method: &str) -> Result<Self> {
        Self::new(config, method.parse()?)
    }

    /// Negate the final values (lower raw values are better).
    #[must_use]
    pub const fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// Declared good direction used by the sign check.
    #[must_use]
    pub const fn with_good_direction(mut self, direction: Option<GoodDirection>) -> Self {
        self.good_direction = direction;
        self
    }

    /// Enable or disable the automatic sign check.
    #[must_use]
    pub const fn with_auto_sign_check(mut self, enabled: bool) -> Self {
        self.auto_sign_check = enabled;
        self
    }

    /// The effective configuration.
    pub const fn config(&self) -> &StandardizeConfig {
        &self.config
    }

    /// The standardization method.
    pub const fn method(&self) -> StandardizationMethod {
        self.method
    }

    /// Standardize one date-ordered group of raw values.
    pub fn standardize_group(&self, values: &[f64]) -> Vec<f64> {
        let cfg = &self.config;
        let (_, deviation) = rolling_baseline(values, cfg.rolling_window, cfg.rolling_min_periods);
        let dev: Vec<f64> = deviation
            .into_iter()
            .map(|d| if d.is_nan() { 0.0 } else { d })
            .collect();

        let w = if self.method.winsorizes() {
            winsorize(&dev, cfg.winsor_lower, cfg.winsor_upper)
        } else {
            dev.clone()
        };

        let mut z = match self.method {
            StandardizationMethod::RobustZScore => {
                if cfg.rolling_mad {
                    let scale = fill_nan_both_ways(&rolling_mad(
                        values,
                        cfg.rolling_window,
                        cfg.rolling_min_periods,
                    ));
                    robust_zscore(&w, RobustScale::PerRow(&scale))
                } else {
                    robust_zscore(&w, RobustScale::Global)
                }
            }
            StandardizationMethod::ZScore | StandardizationMethod::WinsorizedZScore => {
                classic_zscore(&w)
            }
            StandardizationMethod::RankNorm => rank_norm(&w),
        };

        if self.invert {
            negate(&mut z);
        }

        if self.auto_sign_check {
            if let Some(direction) = self.good_direction {
                self.check_sign(&dev, &mut z, direction);
            }
        }
        z
    }

    fn check_sign(&self, dev: &[f64], z: &mut [f64], direction: GoodDirection) {
        let corr = spearman(dev, z);
        if corr.is_nan() {
            debug!(method = %self.method, "sign check skipped, correlation undefined");
            return;
        }
        let contradicts = match direction {
            GoodDirection::Up => corr < 0.0,
            GoodDirection::Down => corr > 0.0,
        };
        if contradicts {
            debug!(corr, ?direction, "flipping sign to match declared direction");
            negate(z);
        }
    }

    /// Standardize a list of observations.
    ///
    /// Output rows correspond one-to-one with input rows, in input order.
    pub fn standardize(&self, observations: &[Observation]) -> Vec<StandardizedObservation> {
        let mut groups: BTreeMap<(&str, &str), Vec<usize>> = BTreeMap::new();
        for (i, o) in observations.iter().enumerate() {
            groups
                .entry((o.indicator.as_str(), o.country.as_str()))
                .or_default()
                .push(i);
        }

        let mut std_values = vec![f64::NAN; observations.len()];
        for rows in groups.values_mut() {
            rows.sort_by_key(|&i| observations[i].date);
            let values: Vec<f64> = rows.iter().map(|&i| observations[i].value).collect();
            let z = self.standardize_group(&values);
            for (&row, v) in rows.iter().zip(z) {
                std_values[row] = v;
            }
        }
        debug!(
            rows = observations.len(),
            groups = groups.len(),
            method = %self.method,
            "standardized observations"
        );

        observations
            .iter()
            .cloned()
            .zip(std_values)
            .map(|(observation, std_value)| StandardizedObservation {
                observation,
                std_value,
            })
            .collect()
    }

    /// Standardize an observation frame, appending a `std_value` column.
    pub fn standardize_frame(&self, frame: &ObservationFrame) -> Result<DataFrame> {
        let observations = frame.to_observations()?;
        let std_values: Vec<f64> = self
            .standardize(&observations)
            .into_iter()
            .map(|s| s.std_value)
            .collect();
        let mut out = frame.data().clone();
        out.with_column(Column::new("std_value".into(), std_values))
            .map_err(MakroError::from)?;
        Ok(out)
    }
}

fn negate(values: &mut [f64]) {
    for v in values {
        *v = -*v;
    }
}

/// Mean standardized value per country, skipping missing values. Countries
/// are returned in sorted order.
pub fn simple_score(rows: &[StandardizedObservation]) -> CountrySeries {
    let mut by_country: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for r in rows {
        by_country
            .entry(r.observation.country.as_str())
            .or_default()
            .push(r.std_value);
    }
    let scored = CountrySeries::from_pairs(
        by_country
            .into_iter()
            .map(|(country, values)| (country, nan_mean(&values))),
    );
    if scored.values().iter().any(|v| v.is_nan()) {
        warn!("some countries have no standardized values");
    }
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use makro_traits::Date;

    fn series(indicator: &str, country: &str, values: &[f64]) -> Vec<Observation> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let date = Date::from_ymd_opt(2000 + i as i32, 12, 31).unwrap();
                Observation::new(indicator, country, date, *v)
            })
            .collect()
    }

    fn cfg(window: usize, min_periods: usize) -> StandardizeConfig {
        StandardizeConfig {
            rolling_window: window,
            rolling_min_periods: min_periods,
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_method_is_error() {
        let err = Standardizer::from_method_name(StandardizeConfig::default(), "magic").unwrap_err();
        assert!(matches!(err, MakroError::UnknownMethod(_)));
    }

    #[test]
    fn test_invalid_config_is_error() {
        let bad = StandardizeConfig {
            rolling_min_periods: 20,
            ..Default::default()
        };
        assert!(Standardizer::new(bad, StandardizationMethod::ZScore).is_err());
    }

    #[test]
    fn test_early_points_have_zero_deviation() {
        let s = Standardizer::new(cfg(3, 3), StandardizationMethod::ZScore).unwrap();
        let z = s.standardize_group(&[1.0, 2.0, 3.0, 10.0, 20.0]);
        assert_eq!(z.len(), 5);
        // first two points have no baseline, deviation 0
        assert_relative_eq!(z[0], z[1]);
        assert!(z[4] > z[0]);
    }

    #[test]
    fn test_invert_negates() {
        let base = Standardizer::new(cfg(2, 1), StandardizationMethod::ZScore)
            .unwrap()
            .with_auto_sign_check(false);
        let values = [1.0, 4.0, 2.0, 8.0, 3.0];
        let z = base.clone().standardize_group(&values);
        let inv = base.with_invert(true).standardize_group(&values);
        for (a, b) in z.iter().zip(&inv) {
            assert_relative_eq!(*a, -*b);
        }
    }

    #[test]
    fn test_sign_check_enforces_direction() {
        let values = [1.0, 4.0, 2.0, 8.0, 3.0, 9.0];
        let up = Standardizer::new(cfg(2, 1), StandardizationMethod::ZScore)
            .unwrap()
            .with_invert(true)
            .with_good_direction(Some(GoodDirection::Up));
        let z = up.standardize_group(&values);
        let plain = Standardizer::new(cfg(2, 1), StandardizationMethod::ZScore)
            .unwrap()
            .standardize_group(&values);
        // inversion contradicts "up", so the sign check flips it back
        for (a, b) in z.iter().zip(&plain) {
            assert_relative_eq!(*a, *b);
        }

        let down = Standardizer::new(cfg(2, 1), StandardizationMethod::ZScore)
            .unwrap()
            .with_invert(true)
            .with_good_direction(Some(GoodDirection::Down));
        let z = down.standardize_group(&values);
        for (a, b) in z.iter().zip(&plain) {
            assert_relative_eq!(*a, -*b);
        }
    }

    #[test]
    fn test_constant_group_is_zero() {
        let s = Standardizer::new(cfg(3, 1), StandardizationMethod::RobustZScore).unwrap();
        let z = s.standardize_group(&[5.0; 6]);
        assert!(z.iter().all(|v| *v == 0.0));

        let rolling = Standardizer::new(
            StandardizeConfig {
                rolling_mad: true,
                ..cfg(3, 1)
            },
            StandardizationMethod::RobustZScore,
        )
        .unwrap();
        let z = rolling.standardize_group(&[5.0; 6]);
        assert!(z.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_rank_norm_group_is_centered() {
        let s = Standardizer::new(cfg(1, 1), StandardizationMethod::RankNorm).unwrap();
        // window 1 makes every deviation 0, so all ranks tie at the midpoint
        let z = s.standardize_group(&[3.0, 1.0, 2.0]);
        assert!(z.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_standardize_preserves_row_order() {
        let mut obs = series("gdp", "DEU", &[1.0, 2.0, 3.0, 4.0]);
        obs.extend(series("gdp", "FRA", &[4.0, 3.0, 2.0, 1.0]));
        obs.reverse();

        let s = Standardizer::new(cfg(2, 1), StandardizationMethod::ZScore).unwrap();
        let out = s.standardize(&obs);
        assert_eq!(out.len(), obs.len());
        for (o, r) in obs.iter().zip(&out) {
            assert_eq!(o, &r.observation);
        }

        // same result as processing the date-ordered group directly
        let deu: Vec<f64> = out
            .iter()
            .rev()
            .filter(|r| r.observation.country == "DEU")
            .map(|r| r.std_value)
            .collect();
        let direct = s.standardize_group(&[1.0, 2.0, 3.0, 4.0]);
        for (a, b) in deu.iter().zip(&direct) {
            assert_relative_eq!(*a, *b);
        }
    }

    #[test]
    fn test_standardize_frame_appends_column() {
        let obs = series("cpi", "ITA", &[1.0, 3.0, 2.0]);
        let frame = ObservationFrame::from_observations(&obs).unwrap();
        let s = Standardizer::new(cfg(2, 1), StandardizationMethod::ZScore).unwrap();
        let df = s.standardize_frame(&frame).unwrap();
        assert_eq!(df.width(), 5);
        assert_eq!(df.column("std_value").unwrap().len(), 3);
    }

    #[test]
    fn test_simple_score_means_per_country() {
        let d = Date::from_ymd_opt(2020, 1, 1).unwrap();
        let rows = vec![
            StandardizedObservation {
                observation: Observation::new("a", "USA", d, 0.0),
                std_value: 1.0,
            },
            StandardizedObservation {
                observation: Observation::new("b", "USA", d, 0.0),
                std_value: 3.0,
            },
            StandardizedObservation {
                observation: Observation::new("a", "CAN", d, 0.0),
                std_value: f64::NAN,
            },
        ];
        let score = simple_score(&rows);
        assert_eq!(score.labels(), &["CAN".to_string(), "USA".to_string()]);
        assert!(score.get("CAN").unwrap().is_nan());
        assert_relative_eq!(score.get("USA").unwrap(), 2.0);
    }
}
