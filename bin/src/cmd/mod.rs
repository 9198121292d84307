//! CLI subcommand modules.
//!
//! This module contains the implementations for all makro CLI subcommands.

pub(crate) mod allocate;
pub(crate) mod methods;
pub(crate) mod rank;

use makro_traits::CountrySeries;

/// Print `country  weight` rows, largest first.
pub(crate) fn print_weights(weights: &CountrySeries) {
    let mut rows: Vec<(&str, f64)> = weights.iter().collect();
    rows.sort_by(|a, b| b.1.total_cmp(&a.1));

    println!("{:<10} {:>10}", "Country", "Weight");
    println!("{}", "─".repeat(21));
    for (country, weight) in rows {
        println!("{country:<10} {:>9.2}%", weight * 100.0);
    }
    println!("{}", "─".repeat(21));
    println!("{:<10} {:>9.2}%", "Total", weights.sum() * 100.0);
}

/// Weights as a JSON object keyed by country.
pub(crate) fn weights_json(weights: &CountrySeries) -> serde_json::Value {
    weights
        .iter()
        .map(|(country, w)| (country.to_string(), serde_json::Value::from(w)))
        .collect::<serde_json::Map<_, _>>()
        .into()
}
