//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is read once (usually from JSON) and validated before
//! any data is touched. Every section has defaults, so a minimal file only
//! lists the indicators.

use std::collections::BTreeSet;
use std::path::Path;

use makro_eval::BacktestConfig;
use makro_portfolio::{AllocationConfig, PortfolioMethod, RegionCap, ThresholdPowerConfig};
use makro_score::{BootstrapConfig, CompositeConfig, IndicatorWeights};
use makro_traits::{Country, Date, IndicatorId, MakroError, Result};
use makro_transform::{
    Aggregation, Frequency, GoodDirection, StandardizationMethod, StandardizeConfig,
    StandardizeOverride, ValueTransform,
};
use serde::{Deserialize, Serialize};

/// One configured indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    /// Indicator id as it appears in the observation table.
    pub id: IndicatorId,
    /// Direction in which the indicator is favourable.
    #[serde(default)]
    pub good_direction: GoodDirection,
    /// Transform applied to raw values before standardization.
    #[serde(default)]
    pub transform: ValueTransform,
    /// Per-indicator standardization overrides.
    #[serde(default)]
    pub standardization: StandardizeOverride,
}

impl IndicatorConfig {
    /// Indicator with default direction, transform, and standardization.
    pub fn new(id: impl Into<IndicatorId>) -> Self {
        Self {
            id: id.into(),
            good_direction: GoodDirection::default(),
            transform: ValueTransform::default(),
            standardization: StandardizeOverride::default(),
        }
    }

    /// Set the favourable direction.
    #[must_use]
    pub const fn with_good_direction(mut self, direction: GoodDirection) -> Self {
        self.good_direction = direction;
        self
    }

    /// Set the raw value transform.
    #[must_use]
    pub const fn with_transform(mut self, transform: ValueTransform) -> Self {
        self.transform = transform;
        self
    }
}

/// Observation window and target frequency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodConfig {
    /// Drop observations before this date.
    pub start: Option<Date>,
    /// Drop observations after this date.
    pub end: Option<Date>,
    /// Frequency every series is harmonized to.
    pub frequency: Frequency,
    /// How monthly points collapse into quarters.
    pub aggregation: Aggregation,
}

/// Standardization and composite scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Global standardization parameters.
    pub standardization: StandardizeConfig,
    /// Standardization method.
    #[serde(alias = "standardization_method")]
    pub method: StandardizationMethod,
    /// Trailing mean window applied after the transform; 0 or 1 disables it.
    pub smoothing: usize,
    /// Flip indicators whose standardized values contradict their direction.
    pub auto_sign_check: bool,
    /// Indicator weights. Empty means equal weights.
    pub weights: IndicatorWeights,
    /// Countries below this coverage are not scored.
    pub min_coverage_ratio: f64,
    /// Coverage penalty settings.
    #[serde(flatten)]
    pub composite: CompositeConfig,
    /// Indicator bootstrap.
    pub bootstrap: BootstrapConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            standardization: StandardizeConfig::default(),
            method: StandardizationMethod::default(),
            smoothing: 0,
            auto_sign_check: true,
            weights: IndicatorWeights::new(),
            min_coverage_ratio: 0.6,
            composite: CompositeConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

/// Allocation method and trading cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    /// Allocation method.
    pub method: PortfolioMethod,
    /// Threshold and power for `threshold_power`.
    #[serde(flatten)]
    pub threshold_power: ThresholdPowerConfig,
    /// Cost per unit of turnover against the previous weights.
    pub cost_per_unit: f64,
    /// Optional cap on the total weight per region.
    pub region_cap: Option<RegionCap>,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            method: PortfolioMethod::default(),
            threshold_power: ThresholdPowerConfig::default(),
            cost_per_unit: 0.001,
            region_cap: None,
        }
    }
}

/// Historical backtest of the per-date signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    /// Run the backtest.
    pub enabled: bool,
    /// Drop observations published after their as-of date.
    pub no_backfill: bool,
    /// Bounds used when rebalancing; the pipeline allocation when absent.
    pub allocation: Option<AllocationConfig>,
    /// Engine settings.
    #[serde(flatten)]
    pub engine: BacktestConfig,
}

/// Complete pipeline configuration.
///
/// # Examples
///
/// ```rust
/// use makro::PipelineConfig;
///
/// let config = PipelineConfig::from_json_str(
///     r#"{
///         "indicators": [
///             {"id": "gdp_real_yoy"},
///             {"id": "inflation", "good_direction": "down"}
///         ],
///         "scoring": {"weights": {"gdp_real_yoy": 0.6, "inflation": 0.4}}
///     }"#,
/// )
/// .unwrap();
/// assert_eq!(config.indicators.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Countries to rank; empty means every country in the data.
    pub countries: Vec<Country>,
    /// Observation window and frequency.
    pub period: PeriodConfig,
    /// Indicators, in pivot column order.
    pub indicators: Vec<IndicatorConfig>,
    /// Standardization and scoring.
    pub scoring: ScoringConfig,
    /// Allocation bounds.
    pub allocation: AllocationConfig,
    /// Allocation method.
    pub portfolio: PortfolioConfig,
    /// Backtest.
    pub backtest: BacktestSection,
}

impl PipelineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Ids of the configured indicators, in order.
    pub fn indicator_ids(&self) -> Vec<IndicatorId> {
        self.indicators.iter().map(|i| i.id.clone()).collect()
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        if self.indicators.is_empty() {
            return Err(MakroError::InvalidConfig(
                "at least one indicator must be configured".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for indicator in &self.indicators {
            if !seen.insert(indicator.id.as_str()) {
                return Err(MakroError::InvalidConfig(format!(
                    "indicator '{}' is configured twice",
                    indicator.id
                )));
            }
            self.scoring
                .standardization
                .merged(&indicator.standardization)
                .validate()
                .map_err(|e| {
                    MakroError::InvalidConfig(format!("indicator '{}': {e}", indicator.id))
                })?;
        }
        if let (Some(start), Some(end)) = (self.period.start, self.period.end)
            && start > end
        {
            return Err(MakroError::InvalidConfig(format!(
                "period start {start} is after end {end}"
            )));
        }

        let scoring = &self.scoring;
        scoring.standardization.validate()?;
        if !(0.0..=1.0).contains(&scoring.min_coverage_ratio) {
            return Err(MakroError::InvalidConfig(format!(
                "min_coverage_ratio must lie in [0, 1], got {}",
                scoring.min_coverage_ratio
            )));
        }
        if !(scoring.composite.coverage_k.is_finite() && scoring.composite.coverage_k >= 0.0) {
            return Err(MakroError::InvalidConfig(format!(
                "coverage_k must be non-negative, got {}",
                scoring.composite.coverage_k
            )));
        }
        if let Some((id, w)) = scoring.weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(MakroError::InvalidConfig(format!(
                "weight of '{id}' must be finite, got {w}"
            )));
        }
        scoring.bootstrap.validate()?;

        self.allocation.validate()?;
        if self.portfolio.method == PortfolioMethod::ThresholdPower {
            self.portfolio.threshold_power.validate()?;
        }
        if !(self.portfolio.cost_per_unit.is_finite() && self.portfolio.cost_per_unit >= 0.0) {
            return Err(MakroError::InvalidConfig(format!(
                "cost_per_unit must be non-negative, got {}",
                self.portfolio.cost_per_unit
            )));
        }
        if let Some(cap) = &self.portfolio.region_cap {
            cap.validate()?;
        }

        if let Some(allocation) = &self.backtest.allocation {
            allocation.validate()?;
        }
        self.backtest.engine.validate()
    }
}
