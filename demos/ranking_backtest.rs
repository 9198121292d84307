//! Ranking and Backtest
//!
//! Ranks six countries on growth, unemployment and inflation, allocates
//! within bounds, and backtests the quarterly rebalanced allocation on prices
//! synthesized from the composite signal.
//!
//! The observations are generated in-process, so no data files are needed.
//!
//! ## Running
//!
//! ```bash
//! cargo run --release --example ranking_backtest
//! ```

use makro::{Date, Observation, PipelineConfig, RankingPipeline};

/// Countries with a trend per indicator: growth, unemployment, inflation.
const UNIVERSE: &[(&str, [f64; 3])] = &[
    ("DEU", [0.02, -0.03, -0.01]),
    ("FRA", [0.01, -0.01, 0.00]),
    ("ITA", [-0.01, 0.02, 0.02]),
    ("ESP", [0.03, -0.04, 0.01]),
    ("NLD", [0.02, 0.00, -0.02]),
    ("PRT", [-0.02, 0.03, 0.03]),
];

/// Backtest period, in years.
const FIRST_YEAR: i32 = 2015;
const LAST_YEAR: i32 = 2024;

const CONFIG: &str = r#"{
    "indicators": [
        {"id": "gdp_growth"},
        {"id": "unemployment", "good_direction": "down"},
        {"id": "inflation", "good_direction": "down", "transform": "diff"}
    ],
    "period": {"frequency": "Q"},
    "scoring": {
        "method": "robust_zscore",
        "bootstrap": {"enabled": true, "n": 500, "seed": 42}
    },
    "allocation": {"min_alloc": 0.05, "max_alloc": 0.35},
    "portfolio": {"cost_per_unit": 0.001},
    "backtest": {"enabled": true, "periods_per_year": 4}
}"#;

/// Quarterly observations: a trend per country plus a shared cycle.
fn observations() -> Vec<Observation> {
    let indicators = ["gdp_growth", "unemployment", "inflation"];
    let mut rows = Vec::new();
    for (c, (country, trends)) in UNIVERSE.iter().enumerate() {
        let mut t = 0.0;
        for year in FIRST_YEAR..=LAST_YEAR {
            for month in [3, 6, 9, 12] {
                let Some(date) = Date::from_ymd_opt(year, month, 1) else {
                    continue;
                };
                let cycle = (t / 4.0 + c as f64).sin();
                for (indicator, trend) in indicators.iter().zip(trends) {
                    let value = 3.0 + trend * t + 0.2 * cycle;
                    rows.push(Observation::new(*indicator, *country, date, value));
                }
                t += 1.0;
            }
        }
    }
    rows
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::from_json_str(CONFIG)?;
    let pipeline = RankingPipeline::new(config)?;
    let output = pipeline.run(&observations(), None)?;

    // =========================================================================
    // 1. Ranking
    // =========================================================================
    println!("{:<7} {:>5} {:>8} {:>18} {:>10}", "Country", "Rank", "Score", "95% interval", "Stability");
    for row in output.ranking.rows() {
        let interval = match (row.score_ci_low, row.score_ci_high) {
            (Some(lo), Some(hi)) => format!("[{lo:>6.3}, {hi:>6.3}]"),
            _ => "-".to_string(),
        };
        println!(
            "{:<7} {:>5} {:>8.3} {:>18} {:>10.2}",
            row.country,
            row.rank.map_or_else(|| "-".to_string(), |r| r.to_string()),
            row.score,
            interval,
            row.rank_stability.unwrap_or(f64::NAN),
        );
    }

    // =========================================================================
    // 2. Weights
    // =========================================================================
    println!("\nTarget weights:");
    for (country, weight) in output.weights.iter() {
        println!("  {country:<6} {:>6.2}%", weight * 100.0);
    }

    // =========================================================================
    // 3. Backtest
    // =========================================================================
    if let Some(backtest) = output.backtest {
        let summary = &backtest.summary;
        println!("\nBacktest over {} quarters:", summary.n_periods);
        println!("  Total return:      {:>8.2}%", summary.total_return * 100.0);
        println!("  Annualized return: {:>8.2}%", summary.annualized_return * 100.0);
        println!("  Sharpe ratio:      {:>8.2}", summary.sharpe_ratio);
        println!("  Max drawdown:      {:>8.2}%", summary.max_drawdown * 100.0);
        println!("  Avg turnover:      {:>8.3}", summary.avg_turnover);
    }

    Ok(())
}
