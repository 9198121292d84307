//! Common types used throughout the makro workspace.
//!
//! The pipeline consumes a long table of observations and hands around
//! country-labelled vectors (scores, coverage, weights), a country x indicator
//! pivot, and date x asset tables (prices or signals).

use crate::{MakroError, Result};
use ndarray::{Array2, ArrayView1};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

// Re-export date type from chrono
pub use chrono::NaiveDate as Date;

/// ISO3 country code, normalized upstream.
pub type Country = String;

/// Configured indicator identifier (e.g. `gdp_real_yoy`).
pub type IndicatorId = String;

/// Days between 0001-01-01 (CE day 1) and the Unix epoch used by Polars dates.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A single raw data point for one indicator, country, and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Indicator identifier.
    pub indicator: IndicatorId,
    /// Country code.
    pub country: Country,
    /// Observation date.
    pub date: Date,
    /// Raw value (NaN when the source reported no value).
    pub value: f64,
}

impl Observation {
    /// Create a new observation.
    pub fn new(
        indicator: impl Into<IndicatorId>,
        country: impl Into<Country>,
        date: Date,
        value: f64,
    ) -> Self {
        Self {
            indicator: indicator.into(),
            country: country.into(),
            date,
            value,
        }
    }
}

/// An observation with its standardized value attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizedObservation {
    /// The source observation.
    pub observation: Observation,
    /// Standardized value, NaN when it could not be computed.
    pub std_value: f64,
}

/// Parse a date in `YYYY-MM-DD`, `YYYY-MM`, or `YYYY` form.
///
/// Partial dates resolve to the first day of the month or year.
pub fn parse_date(date_str: &str) -> Result<Date> {
    let s = date_str.trim();
    if let Ok(d) = Date::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(d) = Date::parse_from_str(&format!("{s}-01"), "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(d) = Date::parse_from_str(&format!("{s}-01-01"), "%Y-%m-%d") {
        return Ok(d);
    }
    Err(MakroError::InvalidDate(format!("cannot parse '{date_str}'")))
}

fn required_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| MakroError::MissingColumn(name.to_string()))
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    required_column(df, name)?
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(str::to_string)
                .ok_or_else(|| MakroError::InvalidData(format!("null '{name}' in row {row}")))
        })
        .collect()
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let cast = required_column(df, name)?.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

fn date_values(df: &DataFrame, name: &str) -> Result<Vec<Date>> {
    let series = required_column(df, name)?;
    match series.dtype() {
        DataType::Date => series
            .date()?
            .into_iter()
            .enumerate()
            .map(|(row, d): (usize, Option<i32>)| {
                d.and_then(|d| Date::from_num_days_from_ce_opt(d + EPOCH_DAYS_FROM_CE))
                    .ok_or_else(|| MakroError::InvalidDate(format!("null date in row {row}")))
            })
            .collect(),
        DataType::String => series
            .str()?
            .into_iter()
            .enumerate()
            .map(|(row, s)| match s {
                Some(s) => parse_date(s),
                None => Err(MakroError::InvalidDate(format!("null date in row {row}"))),
            })
            .collect(),
        other => Err(MakroError::InvalidData(format!(
            "column '{name}' has unsupported date type {other}"
        ))),
    }
}

/// Container for the long observation table.
///
/// Wraps a Polars DataFrame with the columns `indicator`, `country`, `date`,
/// and `value`. `date` may be a Polars `Date` or an ISO formatted string.
#[derive(Debug, Clone)]
pub struct ObservationFrame {
    data: DataFrame,
}

impl ObservationFrame {
    /// Columns every observation frame must carry.
    pub const REQUIRED_COLUMNS: [&'static str; 4] = ["indicator", "country", "date", "value"];

    /// Wrap a DataFrame, checking that the required columns exist.
    pub fn new(data: DataFrame) -> Result<Self> {
        for name in Self::REQUIRED_COLUMNS {
            if data.column(name).is_err() {
                return Err(MakroError::MissingColumn(name.to_string()));
            }
        }
        Ok(Self { data })
    }

    /// Build a frame from typed observations.
    pub fn from_observations(observations: &[Observation]) -> Result<Self> {
        let data = df! {
            "indicator" => observations.iter().map(|o| o.indicator.as_str()).collect::<Vec<_>>(),
            "country" => observations.iter().map(|o| o.country.as_str()).collect::<Vec<_>>(),
            "date" => observations.iter().map(|o| o.date).collect::<Vec<Date>>(),
            "value" => observations.iter().map(|o| o.value).collect::<Vec<f64>>(),
        }?;
        Ok(Self { data })
    }

    /// Convert the frame into typed observations, preserving row order.
    pub fn to_observations(&self) -> Result<Vec<Observation>> {
        let indicators = string_values(&self.data, "indicator")?;
        let countries = string_values(&self.data, "country")?;
        let dates = date_values(&self.data, "date")?;
        let values = float_values(&self.data, "value")?;

        Ok(indicators
            .into_iter()
            .zip(countries)
            .zip(dates)
            .zip(values)
            .map(|(((indicator, country), date), value)| Observation {
                indicator,
                country,
                date,
                value,
            })
            .collect())
    }

    /// Returns a reference to the underlying DataFrame.
    pub const fn data(&self) -> &DataFrame {
        &self.data
    }

    /// Consumes self and returns the underlying DataFrame.
    pub fn into_inner(self) -> DataFrame {
        self.data
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.data.height()
    }

    /// Whether the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.data.height() == 0
    }
}

/// An ordered vector of values labelled by country.
///
/// Used for composite scores, coverage ratios, and portfolio weights. Label
/// order is insertion order and is preserved by every operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountrySeries {
    labels: Vec<Country>,
    values: Vec<f64>,
}

impl CountrySeries {
    /// Create a series from parallel label and value vectors.
    pub fn new(labels: Vec<Country>, values: Vec<f64>) -> Result<Self> {
        if labels.len() != values.len() {
            return Err(MakroError::InvalidData(format!(
                "{} labels but {} values",
                labels.len(),
                values.len()
            )));
        }
        for (i, label) in labels.iter().enumerate() {
            if labels[..i].contains(label) {
                return Err(MakroError::InvalidData(format!("duplicate label '{label}'")));
            }
        }
        Ok(Self { labels, values })
    }

    /// Create an empty series.
    pub const fn empty() -> Self {
        Self {
            labels: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build a series from `(label, value)` pairs. A repeated label overwrites
    /// the earlier value in place.
    pub fn from_pairs<S, I>(pairs: I) -> Self
    where
        S: Into<Country>,
        I: IntoIterator<Item = (S, f64)>,
    {
        let mut series = Self::empty();
        for (label, value) in pairs {
            series.insert(label, value);
        }
        series
    }

    /// Create a series assigning the same value to every label.
    pub fn uniform(labels: &[Country], value: f64) -> Self {
        Self {
            labels: labels.to_vec(),
            values: vec![value; labels.len()],
        }
    }

    /// Insert or overwrite a value.
    pub fn insert(&mut self, label: impl Into<Country>, value: f64) {
        let label = label.into();
        match self.position(&label) {
            Some(i) => self.values[i] = value,
            None => {
                self.labels.push(label);
                self.values.push(value);
            }
        }
    }

    /// Position of a label.
    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Value for a label.
    pub fn get(&self, label: &str) -> Option<f64> {
        self.position(label).map(|i| self.values[i])
    }

    /// Whether the label is present.
    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    /// Labels in order.
    pub fn labels(&self) -> &[Country] {
        &self.labels
    }

    /// Values in label order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of entries.
    pub const fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the series has no entries.
    pub const fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterate `(label, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Sum of all values (NaN propagates).
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Drop entries whose value is NaN.
    pub fn drop_nan(&self) -> Self {
        Self::from_pairs(self.iter().filter(|(_, v)| !v.is_nan()))
    }

    /// Keep entries satisfying the predicate.
    pub fn filter(&self, mut keep: impl FnMut(&str, f64) -> bool) -> Self {
        Self::from_pairs(self.iter().filter(|&(l, v)| keep(l, v)))
    }

    /// Apply a function to every value.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            labels: self.labels.clone(),
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Divide every value by the total so the series sums to one.
    ///
    /// Returns the series unchanged when the total is not positive.
    pub fn normalized(&self) -> Self {
        let total = self.sum();
        if total > 0.0 {
            self.map_values(|v| v / total)
        } else {
            self.clone()
        }
    }

    /// Align to `labels`, filling absent entries with `fill`.
    pub fn reindex(&self, labels: &[Country], fill: f64) -> Self {
        Self {
            labels: labels.to_vec(),
            values: labels
                .iter()
                .map(|l| self.get(l).unwrap_or(fill))
                .collect(),
        }
    }

    /// Convert to a two-column DataFrame.
    pub fn to_dataframe(&self, label_column: &str, value_column: &str) -> Result<DataFrame> {
        let labels = Column::new(label_column.into(), self.labels.clone());
        let values = Column::new(value_column.into(), self.values.clone());
        Ok(DataFrame::new(vec![labels, values])?)
    }
}

/// Country x indicator matrix of standardized values. Missing cells are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    countries: Vec<Country>,
    indicators: Vec<IndicatorId>,
    values: Array2<f64>,
}

impl Pivot {
    /// Create a pivot, checking the matrix shape against the labels.
    pub fn new(
        countries: Vec<Country>,
        indicators: Vec<IndicatorId>,
        values: Array2<f64>,
    ) -> Result<Self> {
        if values.dim() != (countries.len(), indicators.len()) {
            return Err(MakroError::InvalidData(format!(
                "pivot shape {:?} does not match {} countries x {} indicators",
                values.dim(),
                countries.len(),
                indicators.len()
            )));
        }
        Ok(Self {
            countries,
            indicators,
            values,
        })
    }

    /// Build a pivot from `(indicator, country, value)` cells.
    ///
    /// Rows are the sorted unique countries. Columns follow `indicators`;
    /// cells for indicators not listed are ignored. A repeated cell keeps the
    /// last value.
    pub fn from_cells<'a, I>(cells: I, indicators: &[IndicatorId]) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str, f64)>,
    {
        let cells: Vec<(&str, &str, f64)> = cells.into_iter().collect();
        let mut countries: Vec<Country> = cells.iter().map(|(_, c, _)| c.to_string()).collect();
        countries.sort();
        countries.dedup();

        let mut values = Array2::from_elem((countries.len(), indicators.len()), f64::NAN);
        for (indicator, country, value) in cells {
            let Some(col) = indicators.iter().position(|i| i == indicator) else {
                continue;
            };
            if let Ok(row) = countries.binary_search_by(|c| c.as_str().cmp(country)) {
                values[[row, col]] = value;
            }
        }

        Self {
            countries,
            indicators: indicators.to_vec(),
            values,
        }
    }

    /// Country labels (rows).
    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    /// Indicator labels (columns).
    pub fn indicators(&self) -> &[IndicatorId] {
        &self.indicators
    }

    /// The value matrix.
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of countries.
    pub const fn n_countries(&self) -> usize {
        self.countries.len()
    }

    /// Number of indicators.
    pub const fn n_indicators(&self) -> usize {
        self.indicators.len()
    }

    /// Row of values for the country at `row`.
    pub fn row(&self, row: usize) -> ArrayView1<'_, f64> {
        self.values.row(row)
    }

    /// Cell lookup by labels. `None` when either label is unknown.
    pub fn get(&self, country: &str, indicator: &str) -> Option<f64> {
        let row = self.countries.iter().position(|c| c == country)?;
        let col = self.indicators.iter().position(|i| i == indicator)?;
        Some(self.values[[row, col]])
    }

    /// Keep only the listed countries, in pivot order.
    pub fn select_countries(&self, keep: &[Country]) -> Self {
        let rows: Vec<usize> = (0..self.countries.len())
            .filter(|&i| keep.contains(&self.countries[i]))
            .collect();
        let countries = rows.iter().map(|&i| self.countries[i].clone()).collect();
        let values = self.values.select(ndarray::Axis(0), &rows);
        Self {
            countries,
            indicators: self.indicators.clone(),
            values,
        }
    }

    /// Convert to a wide DataFrame with a leading `country` column.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = vec![Column::new("country".into(), self.countries.clone())];
        for (j, indicator) in self.indicators.iter().enumerate() {
            let col: Vec<Option<f64>> = self
                .values
                .column(j)
                .iter()
                .map(|v| if v.is_nan() { None } else { Some(*v) })
                .collect();
            columns.push(Column::new(indicator.as_str().into(), col));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Date x asset matrix, used for price levels and per-date signals.
///
/// Rows are kept sorted by date. Missing cells are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    dates: Vec<Date>,
    assets: Vec<String>,
    values: Array2<f64>,
}

impl PriceTable {
    /// Create a table, sorting rows by date.
    pub fn new(dates: Vec<Date>, assets: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.dim() != (dates.len(), assets.len()) {
            return Err(MakroError::InvalidData(format!(
                "table shape {:?} does not match {} dates x {} assets",
                values.dim(),
                dates.len(),
                assets.len()
            )));
        }
        let mut order: Vec<usize> = (0..dates.len()).collect();
        order.sort_by_key(|&i| dates[i]);
        if order.windows(2).any(|w| dates[w[0]] == dates[w[1]]) {
            return Err(MakroError::InvalidData("duplicate dates in table".to_string()));
        }
        let sorted_dates = order.iter().map(|&i| dates[i]).collect();
        let sorted_values = values.select(ndarray::Axis(0), &order);
        Ok(Self {
            dates: sorted_dates,
            assets,
            values: sorted_values,
        })
    }

    /// Build a table from `(date, asset, value)` cells. Repeated cells keep
    /// the last value.
    pub fn from_cells<I>(cells: I) -> Self
    where
        I: IntoIterator<Item = (Date, String, f64)>,
    {
        let cells: Vec<(Date, String, f64)> = cells.into_iter().collect();
        let mut dates: Vec<Date> = cells.iter().map(|(d, _, _)| *d).collect();
        dates.sort();
        dates.dedup();
        let mut assets: Vec<String> = cells.iter().map(|(_, a, _)| a.clone()).collect();
        assets.sort();
        assets.dedup();

        let mut values = Array2::from_elem((dates.len(), assets.len()), f64::NAN);
        for (date, asset, value) in cells {
            if let (Ok(r), Ok(c)) = (dates.binary_search(&date), assets.binary_search(&asset)) {
                values[[r, c]] = value;
            }
        }
        Self {
            dates,
            assets,
            values,
        }
    }

    /// Read a wide DataFrame: one date column, every other column an asset.
    pub fn from_wide_frame(df: &DataFrame, date_column: &str) -> Result<Self> {
        let dates = date_values(df, date_column)?;
        let mut assets = Vec::new();
        let mut columns = Vec::new();
        for name in df.get_column_names() {
            if name.as_str() == date_column {
                continue;
            }
            assets.push(name.to_string());
            columns.push(float_values(df, name.as_str())?);
        }
        let mut values = Array2::from_elem((dates.len(), assets.len()), f64::NAN);
        for (j, col) in columns.iter().enumerate() {
            for (i, v) in col.iter().enumerate() {
                values[[i, j]] = *v;
            }
        }
        Self::new(dates, assets, values)
    }

    /// Row dates in ascending order.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Asset labels (columns).
    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// The value matrix.
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of dates.
    pub const fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the table has no dates.
    pub const fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Values of one date row labelled by asset, NaN cells dropped.
    pub fn row_series(&self, row: usize) -> CountrySeries {
        CountrySeries::from_pairs(
            self.assets
                .iter()
                .zip(self.values.row(row).iter())
                .filter(|(_, v)| !v.is_nan())
                .map(|(a, v)| (a.clone(), *v)),
        )
    }
}
