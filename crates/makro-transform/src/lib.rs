//! Standardization and preprocessing of macro indicator series.
//!
//! The [`Standardizer`] turns raw `(indicator, country, date, value)` rows into
//! comparable scores: a rolling median baseline is removed, the deviation is
//! winsorized and scaled (robust z-score, classic z-score, or rank
//! normalization), and the sign is aligned with the indicator's declared good
//! direction. [`legacy`] keeps the simpler per-series methods, while
//! [`harmonize`], [`transform`], and [`point_in_time`] prepare the raw table.
//!
//! # Examples
//!
//! ```rust
//! use makro_traits::{Date, Observation};
//! use makro_transform::{GoodDirection, StandardizationMethod, StandardizeConfig, Standardizer};
//!
//! let observations: Vec<Observation> = (0..8)
//!     .map(|i| {
//!         let date = Date::from_ymd_opt(2010 + i, 12, 31).unwrap();
//!         Observation::new("inflation", "DEU", date, f64::from(i % 3))
//!     })
//!     .collect();
//!
//! let standardizer = Standardizer::new(StandardizeConfig::default(), StandardizationMethod::RobustZScore)
//!     .unwrap()
//!     .with_invert(true)
//!     .with_good_direction(Some(GoodDirection::Down));
//! let out = standardizer.standardize(&observations);
//! assert_eq!(out.len(), observations.len());
//! ```

mod config;
mod pipeline;

pub mod harmonize;
pub mod legacy;
pub mod point_in_time;
pub mod primitives;
pub mod transform;

// Re-export main types
pub use config::{GoodDirection, StandardizationMethod, StandardizeConfig, StandardizeOverride};
pub use harmonize::{Aggregation, Frequency, HarmonizeReport, harmonize_observations};
pub use legacy::{LegacyMethod, LegacyOutput, standardize_series};
pub use pipeline::{Standardizer, simple_score};
pub use point_in_time::{AsOfDates, retain_as_of};
pub use transform::{ValueTransform, smooth, transform_observations};
