//! Turnover between successive weight vectors.

use makro_traits::CountrySeries;

/// Sum of absolute weight changes over the union of names.
///
/// Names present on one side only count with weight 0 on the other.
pub fn turnover(old: &CountrySeries, new: &CountrySeries) -> f64 {
    let changed: f64 = old
        .iter()
        .map(|(name, w)| (w - new.get(name).unwrap_or(0.0)).abs())
        .sum();
    let added: f64 = new
        .iter()
        .filter(|(name, _)| !old.contains(name))
        .map(|(_, w)| w.abs())
        .sum();
    changed + added
}

/// Cost of moving from `old` to `new` weights at `cost_per_unit` per unit of
/// turnover.
///
/// A first allocation (no previous weights) is free.
pub fn apply_turnover_costs(
    old: Option<&CountrySeries>,
    new: &CountrySeries,
    cost_per_unit: f64,
) -> f64 {
    match old {
        Some(old) if !old.is_empty() => turnover(old, new) * cost_per_unit,
        _ => 0.0,
    }
}
