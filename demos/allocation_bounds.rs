//! Allocation Bounds
//!
//! Turns one set of country scores into weights under different bounds, a
//! regional cap, and threshold-power tilting, printing each result side by
//! side.
//!
//! ## Running
//!
//! ```bash
//! cargo run --release --example allocation_bounds
//! ```

use std::collections::BTreeMap;

use makro::CountrySeries;
use makro::portfolio::{
    AllocationConfig, RegionCap, ThresholdPowerConfig, score_to_weights, threshold_power_weights,
};

/// Composite scores with their region.
const SCORES: &[(&str, &str, f64)] = &[
    ("DEU", "core", 1.4),
    ("NLD", "core", 1.1),
    ("FRA", "core", 0.3),
    ("ESP", "periphery", 0.2),
    ("ITA", "periphery", -0.6),
    ("PRT", "periphery", -1.1),
];

fn print(title: &str, weights: &CountrySeries) {
    println!("{title}");
    for (country, _, _) in SCORES {
        match weights.get(country) {
            Some(w) => println!("  {country:<4} {:>6.2}%", w * 100.0),
            None => println!("  {country:<4}      -"),
        }
    }
    println!();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let scores = CountrySeries::from_pairs(SCORES.iter().map(|(c, _, s)| (*c, *s)));

    let unbounded = score_to_weights(&scores, &AllocationConfig::default(), None)?;
    print("Proportional, no bounds:", &unbounded);

    let bounded = AllocationConfig {
        min_alloc: 0.05,
        max_alloc: 0.3,
        top_n: None,
    };
    print("Bounded to [5%, 30%]:", &score_to_weights(&scores, &bounded, None)?);

    let regions: BTreeMap<String, String> = SCORES
        .iter()
        .map(|(c, r, _)| (c.to_string(), r.to_string()))
        .collect();
    let cap = RegionCap::new(regions, 0.6);
    print(
        "Bounded, core capped at 60%:",
        &score_to_weights(&scores, &bounded, Some(&cap))?,
    );

    let top = AllocationConfig {
        top_n: Some(3),
        ..AllocationConfig::default()
    };
    print("Top 3 only:", &score_to_weights(&scores, &top, None)?);

    let tilt = ThresholdPowerConfig {
        threshold: 0.0,
        power: 2.0,
    };
    print(
        "Squared scores above zero:",
        &threshold_power_weights(&scores, &tilt, &AllocationConfig::default(), None)?,
    );

    // Infeasible bounds are reported, never relaxed.
    let tight = AllocationConfig {
        min_alloc: 0.0,
        max_alloc: 0.1,
        top_n: None,
    };
    if let Err(e) = score_to_weights(&scores, &tight, None) {
        println!("Bounded to 10%: {e}");
    }

    Ok(())
}
