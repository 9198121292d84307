//! Raw value transforms and smoothing applied before standardization.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use makro_traits::{MakroError, Observation, Result};
use serde::{Deserialize, Serialize};

use crate::primitives::rolling_mean;

/// Transform applied to an indicator's raw values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTransform {
    /// Leave values as reported.
    #[default]
    None,
    /// Percent change over 12 periods.
    PctChangeYoy,
    /// Percent change over 1 period.
    PctChangeQoq,
    /// First difference.
    Diff,
}

impl ValueTransform {
    /// Canonical name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PctChangeYoy => "pct_change_yoy",
            Self::PctChangeQoq => "pct_change_qoq",
            Self::Diff => "diff",
        }
    }

    /// Apply to one date-ordered series.
    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        match self {
            Self::None => values.to_vec(),
            Self::PctChangeYoy => pct_change(values, 12),
            Self::PctChangeQoq => pct_change(values, 1),
            Self::Diff => lagged(values, 1, |cur, prev| cur - prev),
        }
    }
}

impl fmt::Display for ValueTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueTransform {
    type Err = MakroError;

    fn from_str(s: &str) -> Result<Self> {
        [Self::None, Self::PctChangeYoy, Self::PctChangeQoq, Self::Diff]
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| MakroError::UnknownMethod(format!("transform '{s}'")))
    }
}

fn lagged(values: &[f64], periods: usize, f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if i < periods {
                f64::NAN
            } else {
                f(values[i], values[i - periods])
            }
        })
        .collect()
}

/// Percent change times 100. A zero base yields NaN.
fn pct_change(values: &[f64], periods: usize) -> Vec<f64> {
    lagged(values, periods, |cur, prev| {
        if prev == 0.0 {
            f64::NAN
        } else {
            (cur / prev - 1.0) * 100.0
        }
    })
}

/// Trailing rolling mean with `min_periods = 1`. No-op for `window <= 1`.
pub fn smooth(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 {
        return values.to_vec();
    }
    rolling_mean(values, window, 1)
}

/// Transform and smooth every `(indicator, country)` series.
///
/// Rows come back grouped by series and sorted by date within each group.
pub fn transform_observations(
    observations: &[Observation],
    transform: ValueTransform,
    smoothing: usize,
) -> Vec<Observation> {
    if transform == ValueTransform::None && smoothing <= 1 {
        return observations.to_vec();
    }
    let mut groups: BTreeMap<(&str, &str), Vec<&Observation>> = BTreeMap::new();
    for o in observations {
        groups
            .entry((o.indicator.as_str(), o.country.as_str()))
            .or_default()
            .push(o);
    }

    let mut out = Vec::with_capacity(observations.len());
    for rows in groups.values_mut() {
        rows.sort_by_key(|o| o.date);
        let values: Vec<f64> = rows.iter().map(|o| o.value).collect();
        let values = smooth(&transform.apply(&values), smoothing);
        out.extend(rows.iter().zip(values).map(|(o, value)| Observation {
            value,
            ..(*o).clone()
        }));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use makro_traits::Date;

    #[test]
    fn test_parse() {
        assert_eq!(
            "pct_change_yoy".parse::<ValueTransform>().unwrap(),
            ValueTransform::PctChangeYoy
        );
        assert!("log".parse::<ValueTransform>().is_err());
    }

    #[test]
    fn test_pct_change_qoq() {
        let out = ValueTransform::PctChangeQoq.apply(&[100.0, 110.0, 0.0, 5.0]);
        assert!(out[0].is_nan());
        assert_relative_eq!(out[1], 10.0, epsilon = 1e-12);
        assert_relative_eq!(out[2], -100.0);
        assert!(out[3].is_nan());
    }

    #[test]
    fn test_pct_change_yoy_needs_twelve_periods() {
        let values: Vec<f64> = (1..=13).map(f64::from).collect();
        let out = ValueTransform::PctChangeYoy.apply(&values);
        assert!(out[11].is_nan());
        assert_relative_eq!(out[12], 1200.0);
    }

    #[test]
    fn test_diff() {
        let out = ValueTransform::Diff.apply(&[1.0, 4.0, 2.0]);
        assert!(out[0].is_nan());
        assert_eq!(&out[1..], &[3.0, -2.0]);
    }

    #[test]
    fn test_smooth() {
        assert_eq!(smooth(&[1.0, 2.0], 0), vec![1.0, 2.0]);
        let s = smooth(&[1.0, 3.0, f64::NAN, 7.0], 2);
        assert_eq!(s[0], 1.0);
        assert_eq!(s[1], 2.0);
        assert_eq!(s[2], 3.0);
        assert_eq!(s[3], 7.0);
    }

    #[test]
    fn test_transform_observations_sorts_by_date() {
        let d = |m| Date::from_ymd_opt(2020, m, 1).unwrap();
        let obs = vec![
            Observation::new("x", "USA", d(3), 6.0),
            Observation::new("x", "USA", d(1), 1.0),
            Observation::new("x", "USA", d(2), 3.0),
        ];
        let out = transform_observations(&obs, ValueTransform::Diff, 0);
        assert_eq!(out[0].date, d(1));
        assert!(out[0].value.is_nan());
        assert_eq!(out[1].value, 2.0);
        assert_eq!(out[2].value, 3.0);
    }
}
