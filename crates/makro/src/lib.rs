#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/makro/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! ## Quick Start
//!
//! ```rust
//! use makro::prelude::*;
//!
//! # fn main() -> makro::Result<()> {
//! let config = PipelineConfig::from_json_str(
//!     r#"{
//!         "indicators": [
//!             {"id": "gdp_growth"},
//!             {"id": "unemployment", "good_direction": "down"}
//!         ],
//!         "period": {"frequency": "A"},
//!         "allocation": {"min_alloc": 0.1, "max_alloc": 0.6}
//!     }"#,
//! )?;
//!
//! let mut observations = Vec::new();
//! for (i, country) in ["DEU", "FRA", "ITA", "ESP"].into_iter().enumerate() {
//!     for year in 2012..2024 {
//!         let date = Date::from_ymd_opt(year, 12, 31).unwrap();
//!         let t = f64::from(year - 2011);
//!         observations.push(Observation::new("gdp_growth", country, date, t * (i as f64 + 1.0)));
//!         observations.push(Observation::new("unemployment", country, date, 10.0 - t * 0.2 * i as f64));
//!     }
//! }
//!
//! let output = RankingPipeline::new(config)?.run(&observations, None)?;
//! for row in output.ranking.rows() {
//!     println!("{:>2?} {} {:.3}", row.rank, row.country, row.score);
//! }
//! assert!((output.weights.sum() - 1.0).abs() < 1e-8);
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Organization
//!
//! - [`traits`] - shared types, errors, and statistics
//! - [`transform`] - standardization and preprocessing
//! - [`score`] - composite scoring, bootstrap, ranking
//! - [`portfolio`] - allocation
//! - [`eval`] - backtesting

/// Version information for the makro crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod config;
mod pipeline;

pub use config::{
    BacktestSection, IndicatorConfig, PeriodConfig, PipelineConfig, PortfolioConfig,
    ScoringConfig,
};
pub use pipeline::{PipelineBacktest, PipelineOutput, RankingPipeline, RankingRow, RankingTable};

// Re-export error types
pub use makro_traits::{MakroError, Result};

// Re-export common types
pub use makro_traits::{Country, CountrySeries, Date, IndicatorId, Observation, Pivot, PriceTable};

/// Shared types, errors, and statistics.
pub mod traits {
    pub use makro_traits::*;
}

/// Standardization of indicator series.
///
/// The pipeline form removes a rolling median baseline, winsorizes, and scales
/// each `(indicator, country)` group; the legacy form standardizes a single
/// series at once.
///
/// # Example
///
/// ```rust
/// use makro::transform::{LegacyMethod, standardize_series};
///
/// let method: LegacyMethod = "minmax".parse().unwrap();
/// let out = standardize_series(&[2.0, 4.0, 6.0], method);
/// assert_eq!(out.std_values, vec![0.0, 0.5, 1.0]);
/// ```
pub mod transform {
    pub use makro_transform::*;
}

/// Composite scoring, bootstrap, and ranking.
pub mod score {
    pub use makro_score::*;
}

/// Allocation of scores into portfolio weights.
pub mod portfolio {
    pub use makro_portfolio::*;
}

/// Backtesting.
pub mod eval {
    pub use makro_eval::*;
}

/// Prelude module for convenient imports.
///
/// ```rust
/// use makro::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Country, CountrySeries, Date, IndicatorConfig, MakroError, Observation, PipelineConfig,
        PipelineOutput, RankingPipeline, Result,
    };
    pub use makro_portfolio::{AllocationConfig, Allocator, ProportionalAllocator};
    pub use makro_transform::{GoodDirection, StandardizationMethod, StandardizeConfig};
}
