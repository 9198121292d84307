//! Threshold-power weighting.

use makro_traits::{CountrySeries, MakroError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::allocation::{AllocationConfig, RegionCap, score_to_weights};

/// Weights below this are dropped from the holdings.
const ACTIVE_WEIGHT: f64 = 1e-12;

/// Parameters of `w_i ∝ max(score_i - threshold, 0)^power`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdPowerConfig {
    /// Minimum score that starts receiving weight.
    pub threshold: f64,
    /// Tilt exponent; above 1 concentrates on the top scores.
    pub power: f64,
}

impl Default for ThresholdPowerConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            power: 1.0,
        }
    }
}

impl ThresholdPowerConfig {
    /// Check the threshold is finite and the power positive.
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(MakroError::InvalidConfig(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        if !(self.power.is_finite() && self.power > 0.0) {
            return Err(MakroError::InvalidConfig(format!(
                "power must be positive, got {}",
                self.power
            )));
        }
        Ok(())
    }
}

/// Weights proportional to the thresholded, powered scores.
///
/// The tilted scores go through [`score_to_weights`] for bounds, `top_n` and
/// the region cap. Holdings at or below 1e-12 are dropped and the rest
/// renormalized. When no score exceeds the threshold the result is empty.
pub fn threshold_power_weights(
    scores: &CountrySeries,
    params: &ThresholdPowerConfig,
    allocation: &AllocationConfig,
    region_cap: Option<&RegionCap>,
) -> Result<CountrySeries> {
    params.validate()?;
    let scores = scores.drop_nan();
    if scores.is_empty() {
        return Ok(CountrySeries::empty());
    }

    let trimmed = scores.map_values(|v| (v - params.threshold).max(0.0));
    if trimmed.sum() == 0.0 {
        debug!(threshold = params.threshold, "no score above threshold");
        return Ok(CountrySeries::empty());
    }
    let tilted = trimmed.map_values(|v| v.powf(params.power));

    let weights = score_to_weights(&tilted, allocation, region_cap)?;
    let active = weights.filter(|_, w| w > ACTIVE_WEIGHT);
    if active.is_empty() {
        return Ok(active);
    }
    Ok(active.normalized())
}
