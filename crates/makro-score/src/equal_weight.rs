//! Equal-weighted composite scoring.

use makro_traits::{CountrySeries, Pivot};
use serde::{Deserialize, Serialize};

use crate::composite::{CompositeConfig, IndicatorWeights, compute_composite};
use crate::scorer::Scorer;

/// Configuration for equal-weighted scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EqualWeightConfig {
    /// Composite options (coverage penalty).
    pub composite: CompositeConfig,
}

/// Scorer giving every pivot indicator weight 1.
///
/// Used when no indicator weights are configured; the score is then the plain
/// mean of each country's present indicators.
#[derive(Debug, Clone, Default)]
pub struct EqualWeightScorer {
    config: EqualWeightConfig,
}

impl EqualWeightScorer {
    /// Create a new equal-weight scorer with the given configuration.
    pub const fn new(config: EqualWeightConfig) -> Self {
        Self { config }
    }

    /// Unit weights for every indicator of the pivot.
    pub fn weights_for(pivot: &Pivot) -> IndicatorWeights {
        pivot
            .indicators()
            .iter()
            .map(|ind| (ind.clone(), 1.0))
            .collect()
    }
}

impl Scorer for EqualWeightScorer {
    fn score(&self, pivot: &Pivot) -> CountrySeries {
        compute_composite(pivot, &Self::weights_for(pivot), &self.config.composite)
    }

    fn name(&self) -> &str {
        "equal_weight"
    }
}
