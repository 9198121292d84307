//! The allocation seam and its implementations.

use std::fmt;
use std::str::FromStr;

use makro_traits::{CountrySeries, MakroError, Result};
use serde::{Deserialize, Serialize};

use crate::allocation::{AllocationConfig, RegionCap, score_to_weights};
use crate::weights::{ThresholdPowerConfig, threshold_power_weights};

/// Turns one score per country into portfolio weights.
///
/// All implementations must be thread-safe (Send + Sync).
///
/// # Examples
///
/// ```rust
/// use makro_portfolio::Allocator;
/// use makro_traits::{CountrySeries, Result};
///
/// struct Best;
///
/// impl Allocator for Best {
///     fn allocate(&self, scores: &CountrySeries) -> Result<CountrySeries> {
///         let best = scores
///             .iter()
///             .filter(|(_, s)| !s.is_nan())
///             .max_by(|a, b| a.1.total_cmp(&b.1));
///         Ok(CountrySeries::from_pairs(best.map(|(c, _)| (c, 1.0))))
///     }
///
///     fn name(&self) -> &str {
///         "best"
///     }
/// }
///
/// let scores = CountrySeries::from_pairs([("DEU", 0.2), ("FRA", 0.9)]);
/// assert_eq!(Best.allocate(&scores).unwrap().get("FRA"), Some(1.0));
/// ```
pub trait Allocator: Send + Sync {
    /// Weights for the non-NaN scores. Empty input gives empty weights.
    fn allocate(&self, scores: &CountrySeries) -> Result<CountrySeries>;

    /// Name of this allocation strategy.
    fn name(&self) -> &str;
}

/// Weights proportional to (shifted) scores within bounds.
#[derive(Debug, Clone, Default)]
pub struct ProportionalAllocator {
    config: AllocationConfig,
    region_cap: Option<RegionCap>,
}

impl ProportionalAllocator {
    /// Create an allocator with the given bounds.
    pub const fn new(config: AllocationConfig) -> Self {
        Self {
            config,
            region_cap: None,
        }
    }

    /// Cap the total weight per region.
    #[must_use]
    pub fn with_region_cap(mut self, region_cap: Option<RegionCap>) -> Self {
        self.region_cap = region_cap;
        self
    }

    /// Allocation bounds.
    pub const fn config(&self) -> &AllocationConfig {
        &self.config
    }
}

impl Allocator for ProportionalAllocator {
    fn allocate(&self, scores: &CountrySeries) -> Result<CountrySeries> {
        score_to_weights(scores, &self.config, self.region_cap.as_ref())
    }

    fn name(&self) -> &str {
        "proportional"
    }
}

/// Weights proportional to `max(score - threshold, 0)^power` within bounds.
#[derive(Debug, Clone, Default)]
pub struct ThresholdPowerAllocator {
    params: ThresholdPowerConfig,
    config: AllocationConfig,
    region_cap: Option<RegionCap>,
}

impl ThresholdPowerAllocator {
    /// Create an allocator with the given tilt and bounds.
    pub const fn new(params: ThresholdPowerConfig, config: AllocationConfig) -> Self {
        Self {
            params,
            config,
            region_cap: None,
        }
    }

    /// Cap the total weight per region.
    #[must_use]
    pub fn with_region_cap(mut self, region_cap: Option<RegionCap>) -> Self {
        self.region_cap = region_cap;
        self
    }

    /// Threshold and power.
    pub const fn params(&self) -> &ThresholdPowerConfig {
        &self.params
    }
}

impl Allocator for ThresholdPowerAllocator {
    fn allocate(&self, scores: &CountrySeries) -> Result<CountrySeries> {
        threshold_power_weights(
            scores,
            &self.params,
            &self.config,
            self.region_cap.as_ref(),
        )
    }

    fn name(&self) -> &str {
        "threshold_power"
    }
}

/// Named allocation methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioMethod {
    /// [`ProportionalAllocator`].
    #[default]
    Proportional,
    /// [`ThresholdPowerAllocator`].
    ThresholdPower,
}

impl PortfolioMethod {
    /// Every method, in display order.
    pub const ALL: [Self; 2] = [Self::Proportional, Self::ThresholdPower];

    /// Configuration name of the method.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Proportional => "proportional",
            Self::ThresholdPower => "threshold_power",
        }
    }

    /// Build the allocator for this method.
    pub fn allocator(
        &self,
        params: ThresholdPowerConfig,
        config: AllocationConfig,
        region_cap: Option<RegionCap>,
    ) -> Box<dyn Allocator> {
        match self {
            Self::Proportional => {
                Box::new(ProportionalAllocator::new(config).with_region_cap(region_cap))
            }
            Self::ThresholdPower => {
                Box::new(ThresholdPowerAllocator::new(params, config).with_region_cap(region_cap))
            }
        }
    }
}

impl fmt::Display for PortfolioMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortfolioMethod {
    type Err = MakroError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| MakroError::UnknownMethod(s.to_string()))
    }
}
