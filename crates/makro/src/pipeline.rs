//! End-to-end ranking pipeline.
//!
//! Raw observations flow through filtering, harmonization, standardization,
//! the latest-value pivot, composite scoring, allocation, and an optional
//! backtest. Each run is a pure function of its inputs.

use std::collections::{BTreeMap, BTreeSet};

use makro_eval::{Backtest, BacktestFrame, BacktestSummary, compute_rebalanced_weights};
use makro_portfolio::{
    Allocator, PortfolioMethod, ProportionalAllocator, ThresholdPowerAllocator,
    apply_turnover_costs,
};
use makro_score::{
    EqualWeightScorer, bootstrap_scores, compute_composite, compute_coverage, rank_scores,
    rank_stability,
};
use makro_traits::{
    Country, CountrySeries, Date, MakroError, Observation, Pivot, PriceTable, Result,
    StandardizedObservation,
};
use makro_transform::{
    AsOfDates, GoodDirection, HarmonizeReport, Standardizer, harmonize_observations,
    retain_as_of, transform_observations,
};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;

/// Price step per unit of signal change in synthesized prices.
const SYNTHETIC_STEP: f64 = 0.001;

/// One row of the final ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRow {
    /// Country code.
    pub country: Country,
    /// Composite score, or the bootstrap mean when the bootstrap ran.
    pub score: f64,
    /// 1 = best; none for unscored countries.
    pub rank: Option<usize>,
    /// Fraction of configured indicators with a value.
    pub coverage_ratio: f64,
    /// Lower bound of the 95% bootstrap interval.
    pub score_ci_low: Option<f64>,
    /// Upper bound of the 95% bootstrap interval.
    pub score_ci_high: Option<f64>,
    /// Share of bootstrap draws that reproduce the baseline rank.
    pub rank_stability: Option<f64>,
}

/// Countries ordered best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingTable {
    rows: Vec<RankingRow>,
}

impl RankingTable {
    /// Ranking rows, best first.
    pub fn rows(&self) -> &[RankingRow] {
        &self.rows
    }

    /// Number of ranked countries.
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether nothing was ranked.
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Scores in ranking order.
    pub fn scores(&self) -> CountrySeries {
        CountrySeries::from_pairs(self.rows.iter().map(|r| (r.country.clone(), r.score)))
    }

    /// Row of one country.
    pub fn get(&self, country: &str) -> Option<&RankingRow> {
        self.rows.iter().find(|r| r.country == country)
    }

    /// The ranking as a DataFrame.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let finite = |v: f64| (!v.is_nan()).then_some(v);
        let df = df! {
            "country" => self.rows.iter().map(|r| r.country.as_str()).collect::<Vec<_>>(),
            "score" => self.rows.iter().map(|r| finite(r.score)).collect::<Vec<_>>(),
            "rank" => self.rows.iter().map(|r| r.rank.map(|k| k as u32)).collect::<Vec<_>>(),
            "coverage_ratio" => self.rows.iter().map(|r| r.coverage_ratio).collect::<Vec<_>>(),
            "score_ci_low" => self.rows.iter().map(|r| r.score_ci_low).collect::<Vec<_>>(),
            "score_ci_high" => self.rows.iter().map(|r| r.score_ci_high).collect::<Vec<_>>(),
            "rank_stability" => self.rows.iter().map(|r| r.rank_stability).collect::<Vec<_>>(),
        }?;
        Ok(df)
    }
}

/// Backtest results of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineBacktest {
    /// Per-date NAV, turnover, and cost.
    pub frame: BacktestFrame,
    /// Summary statistics of the frame.
    pub summary: BacktestSummary,
}

/// Everything a pipeline run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Countries ordered best first.
    pub ranking: RankingTable,
    /// Target weights, summing to one unless empty.
    pub weights: CountrySeries,
    /// Cost of moving from the previous weights.
    pub turnover_cost: f64,
    /// Latest standardized value per country and indicator.
    pub pivot: Pivot,
    /// Coverage of every country in the pivot, eligible or not.
    pub coverage: CountrySeries,
    /// Standardized history of every configured indicator.
    pub standardized: Vec<StandardizedObservation>,
    /// What harmonization did per series.
    pub harmonize_reports: Vec<HarmonizeReport>,
    /// Present when the backtest is enabled.
    pub backtest: Option<PipelineBacktest>,
}

/// Runs the configured pipeline over an observation table.
///
/// # Examples
///
/// ```rust
/// use makro::{PipelineConfig, RankingPipeline};
/// use makro_traits::{Date, Observation};
///
/// let config = PipelineConfig::from_json_str(
///     r#"{"indicators": [{"id": "gdp"}], "period": {"frequency": "A"}}"#,
/// )
/// .unwrap();
///
/// let mut observations = Vec::new();
/// for (country, growth) in [("DEU", 1.0), ("FRA", 2.0), ("ITA", 0.5)] {
///     for year in 2015..2024 {
///         let date = Date::from_ymd_opt(year, 12, 31).unwrap();
///         let value = growth * f64::from(year - 2014);
///         observations.push(Observation::new("gdp", country, date, value));
///     }
/// }
///
/// let output = RankingPipeline::new(config).unwrap().run(&observations, None).unwrap();
/// assert_eq!(output.ranking.len(), 3);
/// assert!((output.weights.sum() - 1.0).abs() < 1e-8);
/// ```
#[derive(Debug, Clone)]
pub struct RankingPipeline {
    config: PipelineConfig,
    as_of: Option<AsOfDates>,
    previous_weights: Option<CountrySeries>,
}

impl RankingPipeline {
    /// Validate the configuration and build a pipeline.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            as_of: None,
            previous_weights: None,
        })
    }

    /// Publication dates used when `no_backfill` is set.
    #[must_use]
    pub fn with_as_of(mut self, as_of: AsOfDates) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// Weights currently held, for the turnover cost.
    #[must_use]
    pub fn with_previous_weights(mut self, weights: CountrySeries) -> Self {
        self.previous_weights = Some(weights);
        self
    }

    /// The configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage over `observations`.
    ///
    /// `prices` feeds the backtest; when absent, prices are synthesized from
    /// the signal changes.
    pub fn run(
        &self,
        observations: &[Observation],
        prices: Option<&PriceTable>,
    ) -> Result<PipelineOutput> {
        let config = &self.config;
        let indicator_ids = config.indicator_ids();

        let mut rows = self.select(observations);
        if config.backtest.no_backfill
            && let Some(as_of) = &self.as_of
        {
            let before = rows.len();
            rows = retain_as_of(&rows, as_of);
            debug!(dropped = before - rows.len(), "applied point-in-time filter");
        }
        info!(rows = rows.len(), "selected observations");

        let (harmonized, harmonize_reports) =
            harmonize_observations(&rows, config.period.frequency, config.period.aggregation);

        let standardized = self.standardize(&harmonized)?;
        info!(rows = standardized.len(), "standardized indicators");

        let pivot = latest_pivot(&standardized, &indicator_ids);
        if pivot.n_countries() == 0 {
            return Err(MakroError::InsufficientData(
                "no standardized values to rank".to_string(),
            ));
        }

        let coverage = compute_coverage(&pivot);
        let eligible: Vec<Country> = coverage
            .iter()
            .filter(|(_, c)| *c >= config.scoring.min_coverage_ratio)
            .map(|(country, _)| country.to_string())
            .collect();
        if eligible.len() < pivot.n_countries() {
            debug!(
                eligible = eligible.len(),
                total = pivot.n_countries(),
                min_coverage = config.scoring.min_coverage_ratio,
                "dropped low-coverage countries"
            );
        }
        if eligible.is_empty() {
            warn!(
                min_coverage = config.scoring.min_coverage_ratio,
                "no country meets the coverage threshold"
            );
        }
        let scored_pivot = pivot.select_countries(&eligible);

        let ranking = self.rank(&scored_pivot, &coverage);
        info!(countries = ranking.len(), "ranked countries");

        let weights = self.allocate(&ranking.scores())?;
        let turnover_cost = apply_turnover_costs(
            self.previous_weights.as_ref(),
            &weights,
            config.portfolio.cost_per_unit,
        );
        info!(assets = weights.len(), turnover_cost, "allocated weights");

        let backtest = if config.backtest.enabled {
            Some(self.backtest(&standardized, &eligible, prices)?)
        } else {
            None
        };

        Ok(PipelineOutput {
            ranking,
            weights,
            turnover_cost,
            pivot,
            coverage,
            standardized,
            harmonize_reports,
            backtest,
        })
    }

    /// Keep configured indicators, countries, and the period window.
    fn select(&self, observations: &[Observation]) -> Vec<Observation> {
        let config = &self.config;
        let indicators: BTreeSet<&str> = config.indicators.iter().map(|i| i.id.as_str()).collect();
        let countries: BTreeSet<&str> = config.countries.iter().map(String::as_str).collect();
        let period = &config.period;

        observations
            .iter()
            .filter(|o| indicators.contains(o.indicator.as_str()))
            .filter(|o| countries.is_empty() || countries.contains(o.country.as_str()))
            .filter(|o| period.start.is_none_or(|start| o.date >= start))
            .filter(|o| period.end.is_none_or(|end| o.date <= end))
            .cloned()
            .collect()
    }

    fn standardize(&self, harmonized: &[Observation]) -> Result<Vec<StandardizedObservation>> {
        let scoring = &self.config.scoring;
        let mut out = Vec::with_capacity(harmonized.len());

        for indicator in &self.config.indicators {
            let rows: Vec<Observation> = harmonized
                .iter()
                .filter(|o| o.indicator == indicator.id)
                .cloned()
                .collect();
            if rows.is_empty() {
                warn!(indicator = %indicator.id, "no observations, indicator skipped");
                continue;
            }

            let rows = transform_observations(&rows, indicator.transform, scoring.smoothing);
            let standardizer = Standardizer::new(
                scoring.standardization.merged(&indicator.standardization),
                scoring.method,
            )?
            .with_invert(indicator.good_direction == GoodDirection::Down)
            .with_good_direction(Some(indicator.good_direction))
            .with_auto_sign_check(scoring.auto_sign_check);

            out.extend(standardizer.standardize(&rows));
        }
        Ok(out)
    }

    fn rank(&self, pivot: &Pivot, coverage: &CountrySeries) -> RankingTable {
        let scoring = &self.config.scoring;
        let weights = if scoring.weights.is_empty() {
            EqualWeightScorer::weights_for(pivot)
        } else {
            scoring.weights.clone()
        };
        let baseline = compute_composite(pivot, &weights, &scoring.composite);

        let bootstrap = &scoring.bootstrap;
        let (scores, extras) = if bootstrap.enabled {
            let (summary, samples) =
                bootstrap_scores(pivot, &weights, bootstrap.n_boot, bootstrap.seed);
            let stability = rank_stability(&samples, &baseline);
            debug!(n_boot = bootstrap.n_boot, seed = bootstrap.seed, "bootstrapped scores");
            let labels = baseline.labels();
            (
                summary.mean.reindex(labels, f64::NAN),
                Some((
                    summary.ci_low.reindex(labels, f64::NAN),
                    summary.ci_high.reindex(labels, f64::NAN),
                    stability,
                )),
            )
        } else {
            (baseline, None)
        };

        let rows = rank_scores(&scores)
            .into_iter()
            .map(|ranked| {
                let country = ranked.country.as_str();
                let extra = |series: &CountrySeries| series.get(country);
                RankingRow {
                    coverage_ratio: coverage.get(country).unwrap_or(0.0),
                    score_ci_low: extras.as_ref().and_then(|(low, _, _)| extra(low)),
                    score_ci_high: extras.as_ref().and_then(|(_, high, _)| extra(high)),
                    rank_stability: extras.as_ref().and_then(|(_, _, stab)| extra(stab)),
                    country: ranked.country,
                    score: ranked.score,
                    rank: ranked.rank,
                }
            })
            .collect();
        RankingTable { rows }
    }

    fn allocate(&self, scores: &CountrySeries) -> Result<CountrySeries> {
        let config = &self.config;
        let portfolio = &config.portfolio;
        let proportional = ProportionalAllocator::new(config.allocation)
            .with_region_cap(portfolio.region_cap.clone());

        match portfolio.method {
            PortfolioMethod::Proportional => proportional.allocate(scores),
            PortfolioMethod::ThresholdPower => {
                let allocator =
                    ThresholdPowerAllocator::new(portfolio.threshold_power, config.allocation)
                        .with_region_cap(portfolio.region_cap.clone());
                allocator.allocate(scores).or_else(|e| {
                    warn!(error = %e, "threshold-power allocation failed, using proportional");
                    proportional.allocate(scores)
                })
            }
        }
    }

    fn backtest(
        &self,
        standardized: &[StandardizedObservation],
        countries: &[Country],
        prices: Option<&PriceTable>,
    ) -> Result<PipelineBacktest> {
        let section = &self.config.backtest;
        let signals = signal_table(standardized, countries);
        if signals.is_empty() {
            return Err(MakroError::InsufficientData(
                "no signals to backtest".to_string(),
            ));
        }

        let allocation = section.allocation.unwrap_or(self.config.allocation);
        let weights = compute_rebalanced_weights(&signals, &ProportionalAllocator::new(allocation));

        let synthetic;
        let prices = match prices {
            Some(prices) => prices,
            None => {
                synthetic = synthetic_prices(&signals)?;
                debug!(dates = synthetic.len(), "synthesized prices from signal changes");
                &synthetic
            }
        };

        let frame = Backtest::new(section.engine).run(prices, &weights, Some(signals.dates()));
        let summary = BacktestSummary::from_frame(&frame, section.engine.periods_per_year);
        info!(
            periods = summary.n_periods,
            total_return = summary.total_return,
            "backtest complete"
        );
        Ok(PipelineBacktest { frame, summary })
    }
}

/// Most recent standardized value per indicator and country.
///
/// The latest date wins even when its value is NaN.
fn latest_pivot(standardized: &[StandardizedObservation], indicators: &[String]) -> Pivot {
    let mut latest: BTreeMap<(&str, &str), (Date, f64)> = BTreeMap::new();
    for row in standardized {
        let o = &row.observation;
        let key = (o.indicator.as_str(), o.country.as_str());
        match latest.get(&key) {
            Some((date, _)) if *date > o.date => {}
            _ => {
                latest.insert(key, (o.date, row.std_value));
            }
        }
    }
    Pivot::from_cells(
        latest
            .into_iter()
            .map(|((indicator, country), (_, value))| (indicator, country, value)),
        indicators,
    )
}

/// Mean standardized value per date and country, skipping NaN.
fn signal_table(standardized: &[StandardizedObservation], countries: &[Country]) -> PriceTable {
    let keep: BTreeSet<&str> = countries.iter().map(String::as_str).collect();
    let mut sums: BTreeMap<(Date, &str), (f64, usize)> = BTreeMap::new();
    for row in standardized {
        let o = &row.observation;
        if !keep.contains(o.country.as_str()) || row.std_value.is_nan() {
            continue;
        }
        let entry = sums.entry((o.date, o.country.as_str())).or_insert((0.0, 0));
        entry.0 += row.std_value;
        entry.1 += 1;
    }
    PriceTable::from_cells(
        sums.into_iter()
            .map(|((date, country), (sum, n))| (date, country.to_string(), sum / n as f64)),
    )
}

/// Prices that move with the signal: `100 * cumprod(1 + step * diff(signal))`.
fn synthetic_prices(signals: &PriceTable) -> Result<PriceTable> {
    let values = signals.values();
    let (n_dates, n_assets) = values.dim();
    let mut prices = Array2::zeros((n_dates, n_assets));
    for j in 0..n_assets {
        let mut level = 100.0;
        let mut previous = 0.0;
        for i in 0..n_dates {
            let signal = values[[i, j]];
            let signal = if signal.is_nan() { 0.0 } else { signal };
            if i > 0 {
                level *= 1.0 + SYNTHETIC_STEP * (signal - previous);
            }
            previous = signal;
            prices[[i, j]] = level;
        }
    }
    PriceTable::new(signals.dates().to_vec(), signals.assets().to_vec(), prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn std_obs(indicator: &str, country: &str, year: i32, v: f64) -> StandardizedObservation {
        StandardizedObservation {
            observation: Observation::new(
                indicator,
                country,
                Date::from_ymd_opt(year, 12, 31).unwrap(),
                f64::NAN,
            ),
            std_value: v,
        }
    }

    #[test]
    fn test_latest_pivot_takes_latest_date() {
        let rows = vec![
            std_obs("gdp", "DEU", 2021, 1.0),
            std_obs("gdp", "DEU", 2023, f64::NAN),
            std_obs("gdp", "DEU", 2022, 2.0),
            std_obs("cpi", "FRA", 2020, -0.5),
            std_obs("other", "FRA", 2020, 9.0),
        ];
        let indicators = vec!["gdp".to_string(), "cpi".to_string()];
        let pivot = latest_pivot(&rows, &indicators);

        assert_eq!(pivot.countries(), &["DEU".to_string(), "FRA".to_string()]);
        assert!(pivot.get("DEU", "gdp").unwrap().is_nan());
        assert_eq!(pivot.get("FRA", "cpi"), Some(-0.5));
        assert!(pivot.get("FRA", "gdp").unwrap().is_nan());
    }

    #[test]
    fn test_signal_table_means_and_filters() {
        let rows = vec![
            std_obs("gdp", "DEU", 2022, 1.0),
            std_obs("cpi", "DEU", 2022, 3.0),
            std_obs("cpi", "DEU", 2023, f64::NAN),
            std_obs("gdp", "ITA", 2022, 5.0),
        ];
        let table = signal_table(&rows, &["DEU".to_string()]);
        assert_eq!(table.assets(), &["DEU".to_string()]);
        assert_eq!(table.len(), 1);
        assert_relative_eq!(table.values()[[0, 0]], 2.0);
    }

    #[test]
    fn test_synthetic_prices_follow_signal() {
        let d = |y| Date::from_ymd_opt(y, 12, 31).unwrap();
        let signals = PriceTable::from_cells([
            (d(2020), "A".to_string(), 1.0),
            (d(2021), "A".to_string(), 3.0),
            (d(2022), "A".to_string(), f64::NAN),
        ]);
        let prices = synthetic_prices(&signals).unwrap();
        let col: Vec<f64> = prices.values().column(0).to_vec();
        assert_relative_eq!(col[0], 100.0);
        assert_relative_eq!(col[1], 100.0 * 1.002, epsilon = 1e-12);
        assert_relative_eq!(col[2], 100.0 * 1.002 * 0.997, epsilon = 1e-12);
    }

    #[test]
    fn test_ranking_table_frame() {
        let table = RankingTable {
            rows: vec![
                RankingRow {
                    country: "DEU".into(),
                    score: 0.5,
                    rank: Some(1),
                    coverage_ratio: 1.0,
                    score_ci_low: Some(0.1),
                    score_ci_high: Some(0.9),
                    rank_stability: Some(0.8),
                },
                RankingRow {
                    country: "ITA".into(),
                    score: f64::NAN,
                    rank: None,
                    coverage_ratio: 0.0,
                    score_ci_low: None,
                    score_ci_high: None,
                    rank_stability: None,
                },
            ],
        };
        let df = table.to_dataframe().unwrap();
        assert_eq!(df.shape(), (2, 7));
        assert_eq!(df.column("score").unwrap().null_count(), 1);
        assert_eq!(table.get("DEU").map(|r| r.rank), Some(Some(1)));
        assert_eq!(table.scores().labels(), &["DEU".to_string(), "ITA".to_string()]);
    }
}
