//! Ranking of composite scores.

use makro_traits::stats::min_ranks_descending;
use makro_traits::{Country, CountrySeries, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// One row of a ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCountry {
    /// Country code.
    pub country: Country,
    /// Composite score (NaN when unscored).
    pub score: f64,
    /// 1 = best. Tied scores share the lowest rank; unscored countries have none.
    pub rank: Option<usize>,
}

/// Rank countries by descending score.
///
/// Rows are sorted by score with unscored countries last; ties keep their
/// input order.
pub fn rank_scores(scores: &CountrySeries) -> Vec<RankedCountry> {
    let ranks = min_ranks_descending(scores.values());
    let mut rows: Vec<RankedCountry> = scores
        .iter()
        .zip(ranks)
        .map(|((country, score), rank)| RankedCountry {
            country: country.to_string(),
            score,
            rank,
        })
        .collect();
    rows.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
        (false, false) => b.score.total_cmp(&a.score),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    });
    rows
}

/// Ranking as a DataFrame with columns `country`, `score`, `rank`.
pub fn ranking_frame(rows: &[RankedCountry]) -> Result<DataFrame> {
    let df = df! {
        "country" => rows.iter().map(|r| r.country.as_str()).collect::<Vec<_>>(),
        "score" => rows.iter().map(|r| (!r.score.is_nan()).then_some(r.score)).collect::<Vec<_>>(),
        "rank" => rows.iter().map(|r| r.rank.map(|k| k as u32)).collect::<Vec<_>>(),
    }?;
    Ok(df)
}
