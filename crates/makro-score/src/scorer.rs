//! Core trait definition for composite scorers.

use makro_traits::{CountrySeries, Pivot};

/// Turns a country x indicator pivot into one composite score per country.
///
/// Implementors define how indicators are weighted. All implementations must
/// be thread-safe (Send + Sync).
///
/// # Examples
///
/// ```rust
/// use makro_score::Scorer;
/// use makro_traits::{CountrySeries, Pivot};
///
/// struct FirstIndicator;
///
/// impl Scorer for FirstIndicator {
///     fn score(&self, pivot: &Pivot) -> CountrySeries {
///         CountrySeries::from_pairs(
///             pivot
///                 .countries()
///                 .iter()
///                 .enumerate()
///                 .map(|(i, c)| (c.clone(), pivot.values()[[i, 0]])),
///         )
///     }
///
///     fn name(&self) -> &str {
///         "first_indicator"
///     }
/// }
/// ```
pub trait Scorer: Send + Sync {
    /// Composite score per pivot row, in pivot country order.
    ///
    /// Countries without any usable indicator get NaN.
    fn score(&self, pivot: &Pivot) -> CountrySeries;

    /// Name of this scoring strategy.
    fn name(&self) -> &str;
}
