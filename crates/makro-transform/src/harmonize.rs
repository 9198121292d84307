//! Frequency inference and conversion to a common reporting frequency.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration};
use makro_traits::stats::{nan_mean, nan_median};
use makro_traits::{Country, Date, IndicatorId, MakroError, Observation, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Observation frequency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    /// Monthly.
    #[serde(rename = "M")]
    Monthly,
    /// Quarterly.
    #[default]
    #[serde(rename = "Q")]
    Quarterly,
    /// Annual.
    #[serde(rename = "A")]
    Annual,
}

impl Frequency {
    /// Single-letter code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Monthly => "M",
            Self::Quarterly => "Q",
            Self::Annual => "A",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Frequency {
    type Err = MakroError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "M" | "MONTHLY" => Ok(Self::Monthly),
            "Q" | "QUARTERLY" => Ok(Self::Quarterly),
            "A" | "Y" | "ANNUAL" => Ok(Self::Annual),
            _ => Err(MakroError::InvalidConfig(format!("unknown frequency '{s}'"))),
        }
    }
}

/// How monthly points collapse into a quarter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Mean of the quarter's values.
    #[default]
    Mean,
    /// Median of the quarter's values.
    Median,
    /// Last available value in the quarter.
    Last,
}

impl Aggregation {
    fn reduce(&self, values: &[f64]) -> f64 {
        match self {
            Self::Mean => nan_mean(values),
            Self::Median => nan_median(values),
            Self::Last => values
                .iter()
                .rev()
                .copied()
                .find(|v| !v.is_nan())
                .unwrap_or(f64::NAN),
        }
    }
}

impl FromStr for Aggregation {
    type Err = MakroError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            "last" => Ok(Self::Last),
            _ => Err(MakroError::InvalidConfig(format!("unknown aggregation '{s}'"))),
        }
    }
}

/// Infer frequency from the median spacing of sorted dates.
pub fn infer_frequency(dates: &[Date]) -> Frequency {
    if dates.len() < 2 {
        return Frequency::Monthly;
    }
    let mut sorted = dates.to_vec();
    sorted.sort();
    let gaps: Vec<f64> = sorted
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days() as f64)
        .collect();
    let median_days = nan_median(&gaps);
    if median_days > 300.0 {
        Frequency::Annual
    } else if median_days > 40.0 {
        Frequency::Quarterly
    } else {
        Frequency::Monthly
    }
}

/// Last calendar day of the quarter containing `date`.
pub fn quarter_end(date: Date) -> Date {
    let end_month = ((date.month() - 1) / 3 + 1) * 3;
    let (year, next_month) = if end_month == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), end_month + 1)
    };
    Date::from_ymd_opt(year, next_month, 1)
        .map_or(date, |first_of_next| first_of_next - Duration::days(1))
}

fn quarter_ends(first: Date, last: Date) -> Vec<Date> {
    let mut out = Vec::new();
    let mut q = quarter_end(first);
    let stop = quarter_end(last);
    while q <= stop {
        out.push(q);
        q = quarter_end(q + Duration::days(1));
    }
    out
}

/// Convert one series to `target` frequency.
///
/// Supported conversions are annual to quarterly (forward fill of each year's
/// value across its quarters) and monthly to quarterly (aggregation per
/// calendar quarter, empty quarters are NaN). Everything else passes through
/// sorted by date.
pub fn harmonize_series(
    points: &[(Date, f64)],
    target: Frequency,
    aggregation: Aggregation,
) -> Vec<(Date, f64)> {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| p.0);
    let (Some(first), Some(last)) = (sorted.first().map(|p| p.0), sorted.last().map(|p| p.0))
    else {
        return sorted;
    };
    let dates: Vec<Date> = sorted.iter().map(|p| p.0).collect();
    let source = infer_frequency(&dates);

    match (source, target) {
        (s, t) if s == t => sorted,
        (Frequency::Annual, Frequency::Quarterly) => {
            // each year's value is anchored at the start of its year
            let anchored: Vec<(Date, f64)> = sorted
                .iter()
                .filter_map(|(d, v)| Date::from_ymd_opt(d.year(), 1, 1).map(|a| (a, *v)))
                .collect();
            quarter_ends(first, last)
                .into_iter()
                .map(|q| {
                    let value = anchored
                        .iter()
                        .rev()
                        .find(|(a, _)| *a <= q)
                        .map_or(f64::NAN, |(_, v)| *v);
                    (q, value)
                })
                .collect()
        }
        (Frequency::Monthly, Frequency::Quarterly) => {
            let mut buckets: BTreeMap<Date, Vec<f64>> = quarter_ends(first, last)
                .into_iter()
                .map(|q| (q, Vec::new()))
                .collect();
            for (d, v) in &sorted {
                buckets.entry(quarter_end(*d)).or_default().push(*v);
            }
            buckets
                .into_iter()
                .map(|(q, values)| (q, aggregation.reduce(&values)))
                .collect()
        }
        _ => sorted,
    }
}

/// Per-series record of what harmonization did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarmonizeReport {
    /// Indicator of the series.
    pub indicator: IndicatorId,
    /// Country of the series.
    pub country: Country,
    /// Inferred source frequency.
    pub source_frequency: Frequency,
    /// Requested frequency.
    pub target_frequency: Frequency,
    /// Monthly aggregation rule in effect.
    pub aggregation: Aggregation,
    /// Points before conversion.
    pub n_in: usize,
    /// Points after conversion.
    pub n_out: usize,
}

/// Harmonize every `(indicator, country)` series.
pub fn harmonize_observations(
    observations: &[Observation],
    target: Frequency,
    aggregation: Aggregation,
) -> (Vec<Observation>, Vec<HarmonizeReport>) {
    let mut groups: BTreeMap<(&str, &str), Vec<(Date, f64)>> = BTreeMap::new();
    for o in observations {
        groups
            .entry((o.indicator.as_str(), o.country.as_str()))
            .or_default()
            .push((o.date, o.value));
    }

    let mut out = Vec::with_capacity(observations.len());
    let mut reports = Vec::with_capacity(groups.len());
    for ((indicator, country), points) in groups {
        let dates: Vec<Date> = points.iter().map(|p| p.0).collect();
        let source = infer_frequency(&dates);
        let converted = harmonize_series(&points, target, aggregation);
        reports.push(HarmonizeReport {
            indicator: indicator.to_string(),
            country: country.to_string(),
            source_frequency: source,
            target_frequency: target,
            aggregation,
            n_in: points.len(),
            n_out: converted.len(),
        });
        out.extend(
            converted
                .into_iter()
                .map(|(date, value)| Observation::new(indicator, country, date, value)),
        );
    }
    debug!(series = reports.len(), rows = out.len(), %target, "harmonized observations");
    (out, reports)
}
