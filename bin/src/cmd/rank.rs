//! Rank command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use makro::{PipelineConfig, PipelineOutput, RankingPipeline};
use serde_json::json;
use tracing::info;

use super::{print_weights, weights_json};
use crate::data;

/// Run the ranking pipeline and print its results.
pub(crate) fn run(config: &Path, input: &Path, prices: Option<&Path>, json: bool) -> Result<()> {
    let config = PipelineConfig::from_path(config)
        .with_context(|| format!("invalid configuration {}", config.display()))?;
    let observations = data::load_observations(input)?;
    info!(rows = observations.len(), input = %input.display(), "loaded observations");

    let prices = prices.map(data::load_prices).transpose()?;
    let output = RankingPipeline::new(config)?.run(&observations, prices.as_ref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&to_json(&output))?);
    } else {
        print_report(&output);
    }
    Ok(())
}

fn to_json(output: &PipelineOutput) -> serde_json::Value {
    json!({
        "ranking": output.ranking.rows(),
        "weights": weights_json(&output.weights),
        "turnover_cost": output.turnover_cost,
        "backtest": output.backtest.as_ref().map(|b| &b.summary),
    })
}

fn print_report(output: &PipelineOutput) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                      Country Ranking                         ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let with_ci = output
        .ranking
        .rows()
        .iter()
        .any(|r| r.score_ci_low.is_some());
    if with_ci {
        println!(
            "{:>4}  {:<8} {:>9} {:>9} {:>9} {:>9} {:>9}",
            "Rank", "Country", "Score", "Coverage", "CI low", "CI high", "Stable"
        );
    } else {
        println!("{:>4}  {:<8} {:>9} {:>9}", "Rank", "Country", "Score", "Coverage");
    }
    println!("{}", "─".repeat(if with_ci { 66 } else { 35 }));

    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"));
    for row in output.ranking.rows() {
        let rank = row.rank.map_or_else(|| "-".to_string(), |r| r.to_string());
        print!(
            "{rank:>4}  {:<8} {:>9.3} {:>8.0}%",
            row.country,
            row.score,
            row.coverage_ratio * 100.0
        );
        if with_ci {
            print!(
                " {:>9} {:>9} {:>9}",
                fmt(row.score_ci_low),
                fmt(row.score_ci_high),
                fmt(row.rank_stability)
            );
        }
        println!();
    }
    println!();

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("TARGET WEIGHTS");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    if output.weights.is_empty() {
        println!("No country qualifies for a weight.");
    } else {
        print_weights(&output.weights);
    }
    if output.turnover_cost > 0.0 {
        println!("Turnover cost: {:.4}", output.turnover_cost);
    }
    println!();

    if let Some(backtest) = &output.backtest {
        let s = &backtest.summary;
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("BACKTEST");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
        println!("Periods:          {}", s.n_periods);
        println!("Rebalances:       {}", s.n_rebalances);
        println!("Total return:     {:.2}%", s.total_return * 100.0);
        println!("Annual return:    {:.2}%", s.annualized_return * 100.0);
        println!("Annual vol:       {:.2}%", s.annualized_volatility * 100.0);
        println!("Sharpe ratio:     {:.2}", s.sharpe_ratio);
        println!("Max drawdown:     {:.2}%", s.max_drawdown * 100.0);
        println!("Avg turnover:     {:.3}", s.avg_turnover);
        println!("Total cost:       {:.4}", s.total_cost);
        println!();
    }
}
