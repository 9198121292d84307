//! Backtesting framework.
//!
//! Replays a schedule of target weights over a price table. Prices are
//! forward-filled and turned into simple returns; on every rebalance date the
//! book jumps to its target, and in between the NAV compounds the weighted
//! return of the held weights.

use std::collections::BTreeMap;

use makro_portfolio::{Allocator, turnover};
use makro_traits::{CountrySeries, Date, MakroError, PriceTable, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Backtesting configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Cost per unit of turnover, deducted from NAV on each rebalance.
    pub cost_per_unit: f64,
    /// Return periods per year, used to annualize summary metrics.
    pub periods_per_year: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            cost_per_unit: 0.0,
            periods_per_year: 252,
        }
    }
}

impl BacktestConfig {
    /// Check the cost is a non-negative number and the period count positive.
    pub fn validate(&self) -> Result<()> {
        if !(self.cost_per_unit.is_finite() && self.cost_per_unit >= 0.0) {
            return Err(MakroError::InvalidConfig(format!(
                "cost_per_unit must be non-negative, got {}",
                self.cost_per_unit
            )));
        }
        if self.periods_per_year == 0 {
            return Err(MakroError::InvalidConfig(
                "periods_per_year must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// State of the backtest at the close of one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRow {
    /// Price date.
    pub date: Date,
    /// Net asset value, starting from 1.
    pub nav: f64,
    /// Turnover on rebalance dates, `None` otherwise.
    pub turnover: Option<f64>,
    /// Cost deducted on this date as a fraction of NAV.
    pub cost: f64,
}

/// Backtest output, one row per price date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestFrame {
    rows: Vec<BacktestRow>,
}

impl BacktestFrame {
    /// Rows in date order.
    pub fn rows(&self) -> &[BacktestRow] {
        &self.rows
    }

    /// Number of dates.
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the backtest covers no dates.
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// NAV series.
    pub fn navs(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.nav).collect()
    }

    /// Final NAV, if any date was simulated.
    pub fn last_nav(&self) -> Option<f64> {
        self.rows.last().map(|r| r.nav)
    }

    /// Convert to a DataFrame with columns `date`, `nav`, `turnover`, `cost`.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let df = df! {
            "date" => self.rows.iter().map(|r| r.date).collect::<Vec<Date>>(),
            "nav" => self.navs(),
            "turnover" => self.rows.iter().map(|r| r.turnover).collect::<Vec<Option<f64>>>(),
            "cost" => self.rows.iter().map(|r| r.cost).collect::<Vec<f64>>(),
        }?;
        Ok(df)
    }
}

/// Backtesting engine.
#[derive(Debug, Clone, Default)]
pub struct Backtest {
    /// Configuration
    config: BacktestConfig,
}

impl Backtest {
    /// Create a new backtest with configuration.
    pub const fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// Configuration.
    pub const fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run the backtest.
    ///
    /// Rebalancing happens on the dates of `rebalance_on`, or on the dates of
    /// `weights_by_date` when no schedule is given. A rebalance date without
    /// a target moves the book to cash. Targets are aligned to the price
    /// columns; names without prices are ignored and missing prices hold
    /// zero weight.
    pub fn run(
        &self,
        prices: &PriceTable,
        weights_by_date: &BTreeMap<Date, CountrySeries>,
        rebalance_on: Option<&[Date]>,
    ) -> BacktestFrame {
        let schedule: Vec<Date> = match rebalance_on {
            Some(dates) => {
                let mut dates = dates.to_vec();
                dates.sort();
                dates.dedup();
                dates
            }
            None => weights_by_date.keys().copied().collect(),
        };
        let returns = simple_returns(prices);
        let assets = prices.assets();
        let empty = CountrySeries::empty();

        let mut nav = 1.0;
        let mut current = CountrySeries::uniform(assets, 0.0);
        let mut rows = Vec::with_capacity(prices.len());
        let mut n_rebalances = 0usize;

        for (i, date) in prices.dates().iter().enumerate() {
            let mut traded = None;
            let mut cost = 0.0;
            if schedule.binary_search(date).is_ok() {
                let target = weights_by_date
                    .get(date)
                    .unwrap_or(&empty)
                    .reindex(assets, 0.0)
                    .map_values(|w| if w.is_nan() { 0.0 } else { w });
                let moved = turnover(&current, &target);
                cost = moved * self.config.cost_per_unit;
                nav *= 1.0 - cost;
                traded = Some(moved);
                current = target;
                n_rebalances += 1;
            }

            let day_return: f64 = current
                .values()
                .iter()
                .zip(returns.row(i))
                .map(|(w, r)| w * r)
                .sum();
            nav *= 1.0 + day_return;
            rows.push(BacktestRow {
                date: *date,
                nav,
                turnover: traded,
                cost,
            });
        }

        debug!(
            dates = rows.len(),
            rebalances = n_rebalances,
            final_nav = nav,
            "backtest complete"
        );
        BacktestFrame { rows }
    }
}

/// Run a backtest with the default configuration.
pub fn run_backtest(
    prices: &PriceTable,
    weights_by_date: &BTreeMap<Date, CountrySeries>,
    rebalance_on: Option<&[Date]>,
) -> BacktestFrame {
    Backtest::default().run(prices, weights_by_date, rebalance_on)
}

/// Simple returns of forward-filled prices. The first row and any return
/// that cannot be computed are 0.
fn simple_returns(prices: &PriceTable) -> Array2<f64> {
    let levels = prices.values();
    let (n_dates, n_assets) = levels.dim();
    let mut returns = Array2::zeros((n_dates, n_assets));
    for j in 0..n_assets {
        let mut last = f64::NAN;
        for i in 0..n_dates {
            let price = levels[[i, j]];
            let filled = if price.is_nan() { last } else { price };
            let r = filled / last - 1.0;
            returns[[i, j]] = if r.is_finite() { r } else { 0.0 };
            last = filled;
        }
    }
    returns
}

/// Target weights per date of a signal table.
///
/// Each date row, NaN cells dropped, goes through `allocator`. When the
/// allocator fails for a date, that date falls back to equal weights over its
/// non-missing signals.
pub fn compute_rebalanced_weights(
    signals: &PriceTable,
    allocator: &dyn Allocator,
) -> BTreeMap<Date, CountrySeries> {
    signals
        .dates()
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let row = signals.row_series(i);
            let weights = match allocator.allocate(&row) {
                Ok(weights) => weights,
                Err(e) => {
                    warn!(
                        %date,
                        allocator = allocator.name(),
                        error = %e,
                        "allocation failed, using equal weights"
                    );
                    if row.is_empty() {
                        CountrySeries::empty()
                    } else {
                        CountrySeries::uniform(row.labels(), 1.0 / row.len() as f64)
                    }
                }
            };
            (*date, weights)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use makro_portfolio::{AllocationConfig, ProportionalAllocator};
    use ndarray::array;

    fn d(day: u32) -> Date {
        Date::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn prices() -> PriceTable {
        PriceTable::new(
            vec![d(1), d(2), d(3), d(4)],
            vec!["A".into(), "B".into()],
            array![[100.0, 50.0], [101.0, 51.0], [102.0, 52.0], [103.0, 53.0]],
        )
        .unwrap()
    }

    fn half_half() -> CountrySeries {
        CountrySeries::from_pairs([("A", 0.5), ("B", 0.5)])
    }

    #[test]
    fn test_backtest_config_default() {
        let config = BacktestConfig::default();
        assert_eq!(config.cost_per_unit, 0.0);
        assert_eq!(config.periods_per_year, 252);
        assert!(config.validate().is_ok());
        assert!(
            BacktestConfig {
                cost_per_unit: -1.0,
                ..config
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn test_nav_strictly_increases_on_rising_prices() {
        let weights = BTreeMap::from([(d(1), half_half())]);
        let frame = run_backtest(&prices(), &weights, None);
        let navs = frame.navs();
        assert_eq!(navs[0], 1.0);
        assert!(navs.windows(2).all(|w| w[1] > w[0]));
        let expected = 1.0 + 0.5 * (1.0 / 100.0 + 1.0 / 50.0);
        assert_relative_eq!(navs[1], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_turnover_only_on_rebalance_dates() {
        let weights = BTreeMap::from([
            (d(1), half_half()),
            (d(3), CountrySeries::from_pairs([("A", 1.0)])),
        ]);
        let frame = run_backtest(&prices(), &weights, None);
        let turnover: Vec<Option<f64>> = frame.rows().iter().map(|r| r.turnover).collect();
        assert_eq!(turnover[0], Some(1.0));
        assert_eq!(turnover[1], None);
        assert_relative_eq!(turnover[2].unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(turnover[3], None);
    }

    #[test]
    fn test_explicit_schedule_without_target_goes_to_cash() {
        let weights = BTreeMap::from([(d(1), half_half())]);
        let schedule = [d(1), d(2)];
        let frame = run_backtest(&prices(), &weights, Some(&schedule));
        let rows = frame.rows();
        assert_eq!(rows[1].turnover, Some(1.0));
        assert_relative_eq!(rows[3].nav, rows[1].nav);
    }

    #[test]
    fn test_missing_prices_are_forward_filled() {
        let prices = PriceTable::new(
            vec![d(1), d(2), d(3)],
            vec!["A".into()],
            array![[f64::NAN], [100.0], [f64::NAN]],
        )
        .unwrap();
        let weights = BTreeMap::from([(d(1), CountrySeries::from_pairs([("A", 1.0)]))]);
        let frame = run_backtest(&prices, &weights, None);
        assert!(frame.navs().iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_costs_reduce_nav() {
        let weights = BTreeMap::from([(d(1), half_half())]);
        let config = BacktestConfig {
            cost_per_unit: 0.01,
            ..BacktestConfig::default()
        };
        let with_cost = Backtest::new(config).run(&prices(), &weights, None);
        let free = run_backtest(&prices(), &weights, None);
        assert_relative_eq!(with_cost.rows()[0].cost, 0.01);
        assert_relative_eq!(
            with_cost.last_nav().unwrap(),
            free.last_nav().unwrap() * 0.99,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_rebalanced_weights_fall_back_to_equal() {
        let signals = PriceTable::new(
            vec![d(1), d(2)],
            vec!["A".into(), "B".into(), "C".into()],
            array![[3.0, 1.0, f64::NAN], [1.0, 2.0, 3.0]],
        )
        .unwrap();
        // max_alloc 0.4 is infeasible for two assets but fine for three
        let allocator = ProportionalAllocator::new(AllocationConfig {
            min_alloc: 0.0,
            max_alloc: 0.4,
            top_n: None,
        });
        let weights = compute_rebalanced_weights(&signals, &allocator);
        assert_eq!(weights[&d(1)].values(), &[0.5, 0.5]);
        assert_relative_eq!(weights[&d(2)].sum(), 1.0, epsilon = 1e-8);
        assert!(weights[&d(2)].values().iter().all(|w| *w <= 0.4 + 1e-8));
    }

    #[test]
    fn test_to_dataframe() {
        let weights = BTreeMap::from([(d(1), half_half())]);
        let df = run_backtest(&prices(), &weights, None).to_dataframe().unwrap();
        assert_eq!(df.height(), 4);
        assert_eq!(df.column("turnover").unwrap().null_count(), 3);
    }
}
