//! Composite country scoring for makro.
//!
//! This crate turns the country x indicator pivot of standardized values into
//! one score per country. It implements coverage ratios, the weighted
//! composite with an optional coverage penalty, descending ranking, and a
//! seeded indicator bootstrap with rank-stability estimates.
//!
//! # Examples
//!
//! ```rust
//! use makro_score::{CompositeConfig, IndicatorWeights, rank_scores, compute_composite};
//! use makro_traits::Pivot;
//!
//! let indicators = vec!["gdp".to_string(), "inflation".to_string()];
//! let pivot = Pivot::from_cells(
//!     [
//!         ("gdp", "DEU", 0.8),
//!         ("inflation", "DEU", -0.2),
//!         ("gdp", "ITA", -0.5),
//!         ("inflation", "FRA", 0.4),
//!     ],
//!     &indicators,
//! );
//! let weights: IndicatorWeights = [("gdp".to_string(), 0.6), ("inflation".to_string(), 0.4)].into();
//!
//! let scores = compute_composite(&pivot, &weights, &CompositeConfig::default());
//! let ranked = rank_scores(&scores);
//! assert_eq!(ranked[0].rank, Some(1));
//! ```

mod bootstrap;
mod composite;
mod equal_weight;
mod rank;
mod scorer;

// Re-export main types
pub use bootstrap::{
    BootstrapConfig, BootstrapSamples, BootstrapSummary, bootstrap_scores, rank_stability,
};
pub use composite::{
    CompositeConfig, IndicatorWeights, WeightedScorer, compute_composite, compute_coverage,
    coverage_penalty,
};
pub use equal_weight::{EqualWeightConfig, EqualWeightScorer};
pub use rank::{RankedCountry, rank_scores, ranking_frame};
pub use scorer::Scorer;
