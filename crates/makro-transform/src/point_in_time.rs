//! Point-in-time filtering: drop data points published after a series'
//! as-of date so backtests do not see revised or future values.

use std::collections::HashMap;

use makro_traits::{Country, Date, IndicatorId, Observation};
use tracing::debug;

/// As-of date per `(indicator, country)` series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsOfDates {
    dates: HashMap<(IndicatorId, Country), Date>,
}

impl AsOfDates {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an as-of date. When a series is recorded more than once the
    /// latest date is kept.
    pub fn insert(&mut self, indicator: impl Into<IndicatorId>, country: impl Into<Country>, date: Date) {
        self.dates
            .entry((indicator.into(), country.into()))
            .and_modify(|d| *d = (*d).max(date))
            .or_insert(date);
    }

    /// As-of date of a series, if any.
    pub fn get(&self, indicator: &str, country: &str) -> Option<Date> {
        self.dates
            .get(&(indicator.to_string(), country.to_string()))
            .copied()
    }

    /// Number of series with an as-of date.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether no series has an as-of date.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

impl<I, C> FromIterator<(I, C, Date)> for AsOfDates
where
    I: Into<IndicatorId>,
    C: Into<Country>,
{
    fn from_iter<T: IntoIterator<Item = (I, C, Date)>>(iter: T) -> Self {
        let mut out = Self::new();
        for (indicator, country, date) in iter {
            out.insert(indicator, country, date);
        }
        out
    }
}

/// Keep rows dated on or before their series' as-of date. Series without an
/// as-of date are kept whole.
pub fn retain_as_of(observations: &[Observation], as_of: &AsOfDates) -> Vec<Observation> {
    let kept: Vec<Observation> = observations
        .iter()
        .filter(|o| {
            as_of
                .get(&o.indicator, &o.country)
                .is_none_or(|limit| o.date <= limit)
        })
        .cloned()
        .collect();
    debug!(
        dropped = observations.len() - kept.len(),
        kept = kept.len(),
        "applied point-in-time filter"
    );
    kept
}
