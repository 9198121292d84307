//! CSV loading for the makro CLI.

use std::path::Path;

use anyhow::{Context, Result};
use makro_traits::{CountrySeries, MakroError, Observation, ObservationFrame, PriceTable};
use polars::prelude::*;

/// Read a CSV file with a header row.
pub(crate) fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(df)
}

/// Load the long `indicator, country, date, value` table.
pub(crate) fn load_observations(path: &Path) -> Result<Vec<Observation>> {
    let frame = ObservationFrame::new(read_csv(path)?)?;
    Ok(frame.to_observations()?)
}

/// Load a wide price table: a `date` column plus one column per country.
pub(crate) fn load_prices(path: &Path) -> Result<PriceTable> {
    Ok(PriceTable::from_wide_frame(&read_csv(path)?, "date")?)
}

/// Load `country, score` rows.
pub(crate) fn load_scores(path: &Path) -> Result<CountrySeries> {
    scores_from_frame(&read_csv(path)?)
}

fn scores_from_frame(df: &DataFrame) -> Result<CountrySeries> {
    let column = |name: &str| {
        df.column(name)
            .map_err(|_| MakroError::MissingColumn(name.to_string()))
    };
    let countries = column("country")?.cast(&DataType::String)?;
    let scores = column("score")?.cast(&DataType::Float64)?;

    let labels: Vec<String> = countries
        .str()?
        .into_iter()
        .map(|c| c.unwrap_or_default().to_string())
        .collect();
    let values: Vec<f64> = scores
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();
    Ok(CountrySeries::new(labels, values)?)
}
