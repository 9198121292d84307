//! End-to-end tests of the ranking pipeline.

use approx::assert_relative_eq;
use makro::transform::{AsOfDates, Frequency};
use makro::{Date, MakroError, Observation, PipelineConfig, PriceTable, RankingPipeline};

fn year_end(year: i32) -> Date {
    Date::from_ymd_opt(year, 12, 31).unwrap()
}

/// Flat history from 2014 with a move in the last year.
fn series(indicator: &str, country: &str, last_move: f64) -> Vec<Observation> {
    (2014..=2023)
        .map(|year| {
            let value = if year == 2023 { 5.0 + last_move } else { 5.0 };
            Observation::new(indicator, country, year_end(year), value)
        })
        .collect()
}

/// DEU improves, FRA is flat, ITA deteriorates. ESP only reports growth.
fn observations() -> Vec<Observation> {
    let mut rows = Vec::new();
    rows.extend(series("gdp", "DEU", 2.0));
    rows.extend(series("unemployment", "DEU", -1.0));
    rows.extend(series("gdp", "FRA", 0.0));
    rows.extend(series("unemployment", "FRA", 0.0));
    rows.extend(series("gdp", "ITA", -2.0));
    rows.extend(series("unemployment", "ITA", 1.0));
    rows.extend(series("gdp", "ESP", 1.0));
    rows
}

fn config(extra: &str) -> PipelineConfig {
    let json = format!(
        r#"{{
            "indicators": [
                {{"id": "gdp"}},
                {{"id": "unemployment", "good_direction": "down"}}
            ],
            "period": {{"frequency": "A"}},
            "allocation": {{"min_alloc": 0.1, "max_alloc": 0.6}}
            {extra}
        }}"#
    );
    PipelineConfig::from_json_str(&json).unwrap()
}

fn run(config: PipelineConfig) -> makro::PipelineOutput {
    RankingPipeline::new(config)
        .unwrap()
        .run(&observations(), None)
        .unwrap()
}

#[test]
fn test_ranks_by_direction_adjusted_scores() {
    let output = run(config(""));

    let order: Vec<&str> = output
        .ranking
        .rows()
        .iter()
        .map(|r| r.country.as_str())
        .collect();
    assert_eq!(order, vec!["DEU", "FRA", "ITA"]);
    assert_eq!(output.ranking.rows()[0].rank, Some(1));
    assert!(output.ranking.rows()[0].score > 0.0);
    assert!(output.ranking.rows()[2].score < 0.0);
    assert!(output.ranking.rows().iter().all(|r| r.score_ci_low.is_none()));
}

#[test]
fn test_low_coverage_countries_are_not_ranked() {
    let output = run(config(""));

    assert!(output.ranking.get("ESP").is_none());
    assert!(!output.weights.contains("ESP"));
    assert_relative_eq!(output.coverage.get("ESP").unwrap(), 0.5);
    assert_relative_eq!(output.coverage.get("DEU").unwrap(), 1.0);
    assert_eq!(output.pivot.n_countries(), 4);
    assert_relative_eq!(output.ranking.get("DEU").unwrap().coverage_ratio, 1.0);
}

#[test]
fn test_lower_coverage_threshold_admits_partial_countries() {
    let output = run(config(r#", "scoring": {"min_coverage_ratio": 0.5}"#));
    assert_eq!(output.ranking.len(), 4);
    assert!(output.weights.contains("ESP"));
}

#[test]
fn test_weights_respect_bounds_and_order() {
    let output = run(config(""));
    let weights = &output.weights;

    assert_relative_eq!(weights.sum(), 1.0, epsilon = 1e-8);
    for (_, w) in weights.iter() {
        assert!((0.1 - 1e-9..=0.6 + 1e-9).contains(&w));
    }
    let w = |c: &str| weights.get(c).unwrap();
    assert!(w("DEU") >= w("FRA"));
    assert!(w("FRA") >= w("ITA"));
    assert_eq!(output.turnover_cost, 0.0);
}

#[test]
fn test_turnover_cost_against_previous_weights() {
    let previous = makro::CountrySeries::from_pairs([("USA", 1.0)]);
    let output = RankingPipeline::new(config(""))
        .unwrap()
        .with_previous_weights(previous)
        .run(&observations(), None)
        .unwrap();

    // Everything is sold and everything is bought.
    assert_relative_eq!(output.turnover_cost, 0.001 * 2.0, epsilon = 1e-12);
}

#[test]
fn test_bootstrap_is_seeded_and_bracketed() {
    let extra = r#", "scoring": {"bootstrap": {"enabled": true, "n": 200, "seed": 7}}"#;
    let first = run(config(extra));
    let second = run(config(extra));
    assert_eq!(first.ranking, second.ranking);

    for row in first.ranking.rows() {
        let low = row.score_ci_low.unwrap();
        let high = row.score_ci_high.unwrap();
        assert!(low <= row.score + 1e-12, "{row:?}");
        assert!(row.score <= high + 1e-12, "{row:?}");
        let stability = row.rank_stability.unwrap();
        assert!((0.0..=1.0).contains(&stability));
    }
}

#[test]
fn test_threshold_power_can_select_nothing() {
    let extra = r#", "portfolio": {"method": "threshold_power", "threshold": 100.0, "power": 2.0}"#;
    let output = run(config(extra));
    assert!(output.weights.is_empty());
    assert_eq!(output.ranking.len(), 3);
}

#[test]
fn test_threshold_power_saturates_leaders() {
    // A 0.4 cap saturates the two names above the threshold; the rest goes to ITA.
    let json = r#"{
        "indicators": [{"id": "gdp"}, {"id": "unemployment", "good_direction": "down"}],
        "period": {"frequency": "A"},
        "allocation": {"min_alloc": 0.0, "max_alloc": 0.4},
        "portfolio": {"method": "threshold_power", "threshold": -0.5, "power": 1.0}
    }"#;
    let output = run(PipelineConfig::from_json_str(json).unwrap());
    let w = |c: &str| output.weights.get(c).unwrap();
    assert_relative_eq!(w("DEU"), 0.4, epsilon = 1e-9);
    assert_relative_eq!(w("FRA"), 0.4, epsilon = 1e-9);
    assert_relative_eq!(w("ITA"), 0.2, epsilon = 1e-9);
}

#[test]
fn test_point_in_time_filter_hides_late_releases() {
    let mut as_of = AsOfDates::new();
    as_of.insert("gdp", "DEU", year_end(2022));

    let extra = r#", "backtest": {"no_backfill": true}"#;
    let output = RankingPipeline::new(config(extra))
        .unwrap()
        .with_as_of(as_of.clone())
        .run(&observations(), None)
        .unwrap();
    // Without the 2023 jump the DEU growth history is flat.
    assert_eq!(output.pivot.get("DEU", "gdp"), Some(0.0));

    // The filter is inert unless no_backfill is set.
    let output = RankingPipeline::new(config(""))
        .unwrap()
        .with_as_of(as_of)
        .run(&observations(), None)
        .unwrap();
    assert!(output.pivot.get("DEU", "gdp").unwrap() > 0.0);
}

#[test]
fn test_country_and_period_filters() {
    let extra = r#", "countries": ["DEU", "ITA"]"#;
    let output = run(config(extra));
    assert_eq!(output.pivot.countries(), &["DEU".to_string(), "ITA".to_string()]);

    let json = r#"{
        "indicators": [{"id": "gdp"}],
        "period": {"frequency": "A", "end": "2022-12-31"}
    }"#;
    let output = run(PipelineConfig::from_json_str(json).unwrap());
    assert!(
        output
            .standardized
            .iter()
            .all(|s| s.observation.date <= year_end(2022))
    );
}

#[test]
fn test_monthly_data_is_harmonized_to_quarters() {
    let json = r#"{"indicators": [{"id": "cpi", "good_direction": "down"}], "period": {"frequency": "Q"}}"#;
    let config = PipelineConfig::from_json_str(json).unwrap();
    let mut rows = Vec::new();
    for (country, slope) in [("DEU", 0.1), ("FRA", 0.3)] {
        for m in 0..24u32 {
            let date = Date::from_ymd_opt(2022 + (m / 12) as i32, m % 12 + 1, 1).unwrap();
            rows.push(Observation::new("cpi", country, date, 2.0 + slope * f64::from(m)));
        }
    }

    let output = RankingPipeline::new(config)
        .unwrap()
        .run(&rows, None)
        .unwrap();
    assert_eq!(output.harmonize_reports.len(), 2);
    for report in &output.harmonize_reports {
        assert_eq!(report.source_frequency, Frequency::Monthly);
        assert_eq!(report.n_in, 24);
        assert_eq!(report.n_out, 8);
    }
    assert_eq!(output.standardized.len(), 16);
}

#[test]
fn test_backtest_with_synthetic_prices() {
    let output = run(config(r#", "backtest": {"enabled": true, "periods_per_year": 1}"#));
    let backtest = output.backtest.expect("backtest enabled");

    assert_eq!(backtest.frame.len(), 10);
    assert!(backtest.frame.navs().iter().all(|nav| nav.is_finite() && *nav > 0.0));
    assert_eq!(backtest.summary.n_periods, 10);
    assert_eq!(backtest.summary.n_rebalances, 10);
}

#[test]
fn test_backtest_with_supplied_prices() {
    let mut cells = Vec::new();
    for (i, year) in (2014..=2023).enumerate() {
        let step = i as f64;
        cells.push((year_end(year), "DEU".to_string(), 100.0 + step));
        cells.push((year_end(year), "FRA".to_string(), 100.0));
        cells.push((year_end(year), "ITA".to_string(), 100.0 - step));
    }
    let prices = PriceTable::from_cells(cells);

    let output = RankingPipeline::new(config(r#", "backtest": {"enabled": true}"#))
        .unwrap()
        .run(&observations(), Some(&prices))
        .unwrap();
    let backtest = output.backtest.unwrap();
    assert_eq!(backtest.frame.len(), prices.len());
    assert!(backtest.summary.total_return.is_finite());
    assert!(backtest.summary.max_drawdown >= 0.0);
}

#[test]
fn test_invalid_inputs() {
    assert!(matches!(
        RankingPipeline::new(PipelineConfig::default()),
        Err(MakroError::InvalidConfig(_))
    ));

    let pipeline = RankingPipeline::new(config("")).unwrap();
    assert!(matches!(
        pipeline.run(&[], None),
        Err(MakroError::InsufficientData(_))
    ));

    let unrelated = vec![Observation::new("trade", "DEU", year_end(2020), 1.0)];
    assert!(pipeline.run(&unrelated, None).is_err());
}

#[test]
fn test_ranking_frame() {
    let output = run(config(""));
    let df = output.ranking.to_dataframe().unwrap();
    assert_eq!(df.height(), 3);
    assert!(df.column("coverage_ratio").is_ok());
}
