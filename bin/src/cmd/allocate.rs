//! Allocate command implementation.

use std::path::Path;

use anyhow::Result;
use makro_portfolio::{
    AllocationConfig, Allocator, ProportionalAllocator, ThresholdPowerAllocator,
    ThresholdPowerConfig,
};
use makro_traits::CountrySeries;

use super::print_weights;
use crate::data;

/// Allocate weights from a score file and print them.
pub(crate) fn run(
    scores: &Path,
    min_alloc: f64,
    max_alloc: f64,
    top_n: Option<usize>,
    threshold: Option<f64>,
    power: f64,
) -> Result<()> {
    let scores = data::load_scores(scores)?;
    let config = AllocationConfig {
        min_alloc,
        max_alloc,
        top_n,
    };
    let allocator = build_allocator(config, threshold, power);

    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                     Portfolio Weights                        ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
    println!("Method:   {}", allocator.name());
    println!("Bounds:   [{min_alloc}, {max_alloc}]");
    if let Some(n) = top_n {
        println!("Top N:    {n}");
    }
    println!("Scores:   {} countries\n", scores.len());

    let weights = allocate(allocator.as_ref(), &scores)?;
    if weights.is_empty() {
        println!("No country scores above the threshold.");
    } else {
        print_weights(&weights);
    }
    println!();
    Ok(())
}

fn build_allocator(
    config: AllocationConfig,
    threshold: Option<f64>,
    power: f64,
) -> Box<dyn Allocator> {
    match threshold {
        Some(threshold) => Box::new(ThresholdPowerAllocator::new(
            ThresholdPowerConfig { threshold, power },
            config,
        )),
        None => Box::new(ProportionalAllocator::new(config)),
    }
}

fn allocate(allocator: &dyn Allocator, scores: &CountrySeries) -> Result<CountrySeries> {
    Ok(allocator.allocate(scores)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores() -> CountrySeries {
        CountrySeries::from_pairs([("DEU", 2.0), ("FRA", 1.0), ("ITA", -1.0)])
    }

    #[test]
    fn test_proportional_by_default() {
        let allocator = build_allocator(AllocationConfig::default(), None, 1.0);
        assert_eq!(allocator.name(), "proportional");
        let weights = allocate(allocator.as_ref(), &scores()).unwrap();
        assert!((weights.sum() - 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_threshold_switches_method() {
        let allocator = build_allocator(AllocationConfig::default(), Some(0.5), 2.0);
        assert_eq!(allocator.name(), "threshold_power");
        let weights = allocate(allocator.as_ref(), &scores()).unwrap();
        assert!(!weights.contains("ITA"));
        assert!(weights.get("DEU").unwrap() > weights.get("FRA").unwrap());
    }

    #[test]
    fn test_infeasible_bounds_are_reported() {
        let config = AllocationConfig {
            min_alloc: 0.5,
            max_alloc: 1.0,
            top_n: None,
        };
        let allocator = build_allocator(config, None, 1.0);
        assert!(allocate(allocator.as_ref(), &scores()).is_err());
    }
}
