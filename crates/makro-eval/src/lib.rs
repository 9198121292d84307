//! Backtesting for makro.
//!
//! This crate replays allocation schedules over price histories:
//! - target weights per date from a signal table and an [`makro_portfolio::Allocator`]
//! - a rebalancing backtest producing NAV and turnover per date
//! - summary metrics (total return, Sharpe ratio, drawdown, turnover, cost)
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//!
//! use makro_eval::{BacktestSummary, run_backtest};
//! use makro_traits::{CountrySeries, Date, PriceTable};
//!
//! let day = |d| Date::from_ymd_opt(2024, 1, d).unwrap();
//! let prices = PriceTable::from_cells([
//!     (day(1), "DEU".to_string(), 100.0),
//!     (day(2), "DEU".to_string(), 102.0),
//!     (day(1), "FRA".to_string(), 50.0),
//!     (day(2), "FRA".to_string(), 50.5),
//! ]);
//! let weights = BTreeMap::from([(day(1), CountrySeries::from_pairs([("DEU", 0.5), ("FRA", 0.5)]))]);
//!
//! let frame = run_backtest(&prices, &weights, None);
//! let summary = BacktestSummary::from_frame(&frame, 252);
//! assert!(summary.total_return > 0.0);
//! ```

pub mod backtest;
pub mod metrics;

// Re-export main types
pub use backtest::{
    Backtest, BacktestConfig, BacktestFrame, BacktestRow, compute_rebalanced_weights,
    run_backtest,
};
pub use metrics::BacktestSummary;
