//! Performance metrics of a backtest.

use serde::{Deserialize, Serialize};

use crate::backtest::BacktestFrame;

/// Summary statistics of a backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    /// Final NAV over the starting NAV of 1, minus 1.
    pub total_return: f64,
    /// Geometric return per year.
    pub annualized_return: f64,
    /// Standard deviation of period returns, annualized.
    pub annualized_volatility: f64,
    /// Sharpe ratio (annualized, zero risk-free rate)
    pub sharpe_ratio: f64,
    /// Largest peak-to-trough NAV decline, as a positive fraction.
    pub max_drawdown: f64,
    /// Mean turnover over rebalance dates.
    pub avg_turnover: f64,
    /// Sum of rebalancing costs.
    pub total_cost: f64,
    /// Number of rebalance dates.
    pub n_rebalances: usize,
    /// Number of simulated dates.
    pub n_periods: usize,
}

impl BacktestSummary {
    /// Summarize a backtest whose returns are `periods_per_year` per year.
    ///
    /// Metrics that need more data than the frame holds are NaN.
    pub fn from_frame(frame: &BacktestFrame, periods_per_year: usize) -> Self {
        let navs = frame.navs();
        let returns = period_returns(&navs);
        let total_return = frame.last_nav().map_or(f64::NAN, |nav| nav - 1.0);

        let n_years = navs.len() as f64 / periods_per_year as f64;
        let annualized_return = if n_years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / n_years) - 1.0
        } else {
            f64::NAN
        };

        let turnovers: Vec<f64> = frame.rows().iter().filter_map(|r| r.turnover).collect();
        let avg_turnover = if turnovers.is_empty() {
            0.0
        } else {
            turnovers.iter().sum::<f64>() / turnovers.len() as f64
        };

        Self {
            total_return,
            annualized_return,
            annualized_volatility: sample_std(&returns) * (periods_per_year as f64).sqrt(),
            sharpe_ratio: calculate_sharpe(&returns, periods_per_year),
            max_drawdown: calculate_max_drawdown(&navs),
            avg_turnover,
            total_cost: frame.rows().iter().map(|r| r.cost).sum(),
            n_rebalances: turnovers.len(),
            n_periods: navs.len(),
        }
    }
}

/// Simple returns of a NAV series starting from 1.
pub fn period_returns(navs: &[f64]) -> Vec<f64> {
    let mut previous = 1.0;
    navs.iter()
        .map(|&nav| {
            let r = nav / previous - 1.0;
            previous = nav;
            r
        })
        .collect()
}

fn sample_std(values: &[f64]) -> f64 {
    let valid: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if valid.len() < 2 {
        return f64::NAN;
    }
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    let variance =
        valid.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (valid.len() - 1) as f64;
    variance.sqrt()
}

/// Annualized Sharpe ratio of period returns.
///
/// NaN with fewer than two finite returns or zero volatility.
pub fn calculate_sharpe(returns: &[f64], periods_per_year: usize) -> f64 {
    let std = sample_std(returns);
    if std.is_nan() || std == 0.0 {
        return f64::NAN;
    }
    let valid: Vec<f64> = returns.iter().copied().filter(|x| x.is_finite()).collect();
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    mean / std * (periods_per_year as f64).sqrt()
}

/// Maximum drawdown of a NAV series.
pub fn calculate_max_drawdown(navs: &[f64]) -> f64 {
    let mut max_dd = 0.0;
    let mut peak = f64::NEG_INFINITY;

    for &nav in navs {
        if nav > peak {
            peak = nav;
        }
        if peak > 0.0 {
            let dd = (peak - nav) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::run_backtest;
    use approx::assert_relative_eq;
    use makro_traits::{CountrySeries, Date, PriceTable};
    use ndarray::array;
    use std::collections::BTreeMap;

    #[test]
    fn test_calculate_sharpe() {
        let returns = vec![0.01, -0.005, 0.015, 0.002, -0.003];
        let sharpe = calculate_sharpe(&returns, 252);
        assert!(sharpe.is_finite());
        assert!(sharpe > 0.0);
        assert!(calculate_sharpe(&[0.01], 252).is_nan());
        assert!(calculate_sharpe(&[0.01, 0.01, 0.01], 252).is_nan());
    }

    #[test]
    fn test_calculate_max_drawdown() {
        let navs = vec![1.0, 1.1, 1.2, 0.9, 1.0, 1.3];
        assert_relative_eq!(calculate_max_drawdown(&navs), 0.25, epsilon = 1e-12);
        assert_eq!(calculate_max_drawdown(&[1.0, 1.1, 1.2]), 0.0);
    }

    #[test]
    fn test_period_returns() {
        let returns = period_returns(&[1.0, 1.1, 0.99]);
        assert_relative_eq!(returns[0], 0.0);
        assert_relative_eq!(returns[1], 0.1, epsilon = 1e-12);
        assert_relative_eq!(returns[2], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_summary_from_frame() {
        let d = |day| Date::from_ymd_opt(2024, 3, day).unwrap();
        let prices = PriceTable::new(
            vec![d(1), d(2), d(3), d(4)],
            vec!["A".into(), "B".into()],
            array![[10.0, 20.0], [11.0, 20.0], [12.0, 19.0], [12.0, 21.0]],
        )
        .unwrap();
        let weights = BTreeMap::from([
            (d(1), CountrySeries::from_pairs([("A", 0.5), ("B", 0.5)])),
            (d(3), CountrySeries::from_pairs([("A", 0.25), ("B", 0.75)])),
        ]);
        let frame = run_backtest(&prices, &weights, None);
        let summary = BacktestSummary::from_frame(&frame, 252);

        assert_eq!(summary.n_periods, 4);
        assert_eq!(summary.n_rebalances, 2);
        assert_relative_eq!(summary.avg_turnover, 0.75, epsilon = 1e-12);
        assert_relative_eq!(
            summary.total_return,
            frame.last_nav().unwrap() - 1.0,
            epsilon = 1e-15
        );
        assert_eq!(summary.total_cost, 0.0);
        assert!(summary.max_drawdown >= 0.0);
    }

    #[test]
    fn test_summary_of_empty_frame() {
        let summary = BacktestSummary::from_frame(&BacktestFrame::default(), 252);
        assert!(summary.total_return.is_nan());
        assert_eq!(summary.n_periods, 0);
        assert_eq!(summary.avg_turnover, 0.0);
    }
}
