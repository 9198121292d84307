#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/makro/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core data types, errors, and statistics for the makro country-ranking
//! workspace.

/// The version of the makro-traits crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Module declarations
pub mod error;
pub mod stats;
pub mod types;

// Re-exports
pub use error::{MakroError, Result};
pub use types::{
    Country, CountrySeries, Date, IndicatorId, Observation, ObservationFrame, Pivot, PriceTable,
    StandardizedObservation, parse_date,
};
