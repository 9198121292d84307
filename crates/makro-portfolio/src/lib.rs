//! Portfolio allocation for makro.
//!
//! Country scores become long-only weights that sum to one. The proportional
//! allocator water-fills the budget within per-asset bounds and an optional
//! cap per region; the threshold-power allocator tilts scores above a
//! threshold before the same clamping. Turnover helpers price the move from
//! one weight vector to the next.
//!
//! # Examples
//!
//! ```rust
//! use makro_portfolio::{AllocationConfig, Allocator, ProportionalAllocator};
//! use makro_traits::CountrySeries;
//!
//! let scores = CountrySeries::from_pairs([("DEU", 1.2), ("FRA", 0.4), ("ITA", -0.3)]);
//! let config = AllocationConfig {
//!     min_alloc: 0.1,
//!     max_alloc: 0.6,
//!     top_n: None,
//! };
//! let weights = ProportionalAllocator::new(config).allocate(&scores).unwrap();
//! assert!((weights.sum() - 1.0).abs() < 1e-8);
//! ```

mod allocation;
mod allocator;
mod rebalance;
mod weights;

// Re-export main types
pub use allocation::{AllocationConfig, RegionCap, score_to_weights};
pub use allocator::{Allocator, PortfolioMethod, ProportionalAllocator, ThresholdPowerAllocator};
pub use rebalance::{apply_turnover_costs, turnover};
pub use weights::{ThresholdPowerConfig, threshold_power_weights};
