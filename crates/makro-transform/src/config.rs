//! Standardization configuration and method selection.

use std::fmt;
use std::str::FromStr;

use makro_traits::{MakroError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the rolling-baseline standardizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardizeConfig {
    /// Lower winsorization quantile in `[0, 1]`.
    pub winsor_lower: f64,
    /// Upper winsorization quantile in `[0, 1]`, above `winsor_lower`.
    pub winsor_upper: f64,
    /// Trailing window length for the rolling median baseline.
    pub rolling_window: usize,
    /// Minimum non-missing points in a window to produce a baseline.
    pub rolling_min_periods: usize,
    /// Use a rolling MAD as the robust z-score scale.
    pub rolling_mad: bool,
}

impl Default for StandardizeConfig {
    fn default() -> Self {
        Self {
            winsor_lower: 0.01,
            winsor_upper: 0.99,
            rolling_window: 12,
            rolling_min_periods: 3,
            rolling_mad: false,
        }
    }
}

impl StandardizeConfig {
    /// Check field ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.winsor_lower) || !(0.0..=1.0).contains(&self.winsor_upper) {
            return Err(MakroError::InvalidConfig(format!(
                "winsor bounds must lie in [0, 1], got ({}, {})",
                self.winsor_lower, self.winsor_upper
            )));
        }
        if self.winsor_lower >= self.winsor_upper {
            return Err(MakroError::InvalidConfig(format!(
                "winsor_lower ({}) must be below winsor_upper ({})",
                self.winsor_lower, self.winsor_upper
            )));
        }
        if self.rolling_window < 1 {
            return Err(MakroError::InvalidConfig(
                "rolling_window must be at least 1".to_string(),
            ));
        }
        if self.rolling_min_periods < 1 || self.rolling_min_periods > self.rolling_window {
            return Err(MakroError::InvalidConfig(format!(
                "rolling_min_periods must lie in [1, {}], got {}",
                self.rolling_window, self.rolling_min_periods
            )));
        }
        Ok(())
    }

    /// Apply a per-indicator override. Fields set in the override win.
    #[must_use]
    pub fn merged(&self, over: &StandardizeOverride) -> Self {
        Self {
            winsor_lower: over.winsor_lower.unwrap_or(self.winsor_lower),
            winsor_upper: over.winsor_upper.unwrap_or(self.winsor_upper),
            rolling_window: over.rolling_window.unwrap_or(self.rolling_window),
            rolling_min_periods: over.rolling_min_periods.unwrap_or(self.rolling_min_periods),
            rolling_mad: over.rolling_mad.unwrap_or(self.rolling_mad),
        }
    }
}

/// Partial [`StandardizeConfig`] used for per-indicator overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardizeOverride {
    /// Override for `winsor_lower`.
    pub winsor_lower: Option<f64>,
    /// Override for `winsor_upper`.
    pub winsor_upper: Option<f64>,
    /// Override for `rolling_window`.
    pub rolling_window: Option<usize>,
    /// Override for `rolling_min_periods`.
    pub rolling_min_periods: Option<usize>,
    /// Override for `rolling_mad`.
    pub rolling_mad: Option<bool>,
}

/// Standardization methods of the rolling-baseline pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardizationMethod {
    /// Mean / population std of the winsorized deviation.
    #[serde(rename = "zscore")]
    ZScore,
    /// Median / scaled MAD of the winsorized deviation.
    #[default]
    #[serde(rename = "robust_zscore")]
    RobustZScore,
    /// Same arithmetic as `ZScore`, kept as a distinct name.
    #[serde(rename = "winsorized_zscore")]
    WinsorizedZScore,
    /// Average-rank quantiles mapped through the inverse normal CDF.
    RankNorm,
}

impl StandardizationMethod {
    /// All pipeline methods.
    pub const ALL: [Self; 4] = [
        Self::ZScore,
        Self::RobustZScore,
        Self::WinsorizedZScore,
        Self::RankNorm,
    ];

    /// Canonical name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ZScore => "zscore",
            Self::RobustZScore => "robust_zscore",
            Self::WinsorizedZScore => "winsorized_zscore",
            Self::RankNorm => "rank_norm",
        }
    }

    /// Whether the deviation is winsorized before scaling.
    pub const fn winsorizes(&self) -> bool {
        !matches!(self, Self::RankNorm)
    }
}

impl fmt::Display for StandardizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StandardizationMethod {
    type Err = MakroError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| MakroError::UnknownMethod(s.to_string()))
    }
}

/// Declared direction in which an indicator is favourable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoodDirection {
    /// Higher values are better.
    #[default]
    Up,
    /// Lower values are better.
    Down,
}

impl FromStr for GoodDirection {
    type Err = MakroError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(MakroError::InvalidConfig(format!(
                "good_direction must be 'up' or 'down', got '{other}'"
            ))),
        }
    }
}
