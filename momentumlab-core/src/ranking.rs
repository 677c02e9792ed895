//! Cross-sectional ranking over a formation window.
//!
//! Each ticker is scored by the mean forward cumulative return
//! `close[t + formation] / open[t] - 1` over the dates in
//! `[end - formation months, end]`. Undefined forward returns count as 0 and
//! the ticker stays in the universe, so the candidate counts depend only on
//! the universe size.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::domain::{shift_months, PriceDataset};

/// Forward cumulative returns for one formation period, indexed `[ticker][date]`.
///
/// Undefined values (no row `formation` dates ahead, missing or zero price)
/// are stored as 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardReturns {
    formation_period: u32,
    values: Vec<Vec<f64>>,
}

impl ForwardReturns {
    pub fn compute(dataset: &PriceDataset, formation_period: u32) -> Self {
        let n = dataset.num_dates();
        let shift = formation_period as usize;
        let values = (0..dataset.num_tickers())
            .map(|t| {
                (0..n)
                    .map(|d| {
                        let ahead = d.checked_add(shift).filter(|i| *i < n);
                        let close = ahead.and_then(|i| dataset.close(t, i));
                        match (close, dataset.open(t, d)) {
                            (Some(c), Some(o)) if o != 0.0 => {
                                let r = c / o - 1.0;
                                if r.is_finite() {
                                    r
                                } else {
                                    0.0
                                }
                            }
                            _ => 0.0,
                        }
                    })
                    .collect()
            })
            .collect();
        Self {
            formation_period,
            values,
        }
    }

    pub fn formation_period(&self) -> u32 {
        self.formation_period
    }

    /// # Panics
    ///
    /// If `ticker` or `date` is out of range.
    pub fn get(&self, ticker: usize, date: usize) -> f64 {
        self.values[ticker][date]
    }
}

/// A ticker and its formation score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedTicker {
    /// Universe index into the dataset's ticker list.
    pub ticker: usize,
    pub score: f64,
}

/// Ranking of the full universe at one evaluation date.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedUniverse {
    /// Descending by score; ties keep universe order.
    pub ranking: Vec<RankedTicker>,
    /// Universe indices of the long candidates, best first.
    pub long: Vec<usize>,
    /// Universe indices of the short candidates, taken from the tail in ranking order.
    pub short: Vec<usize>,
}

/// `floor(universe * quantile)`, capped at the universe size.
pub fn candidate_count(universe: usize, quantile: f64) -> usize {
    let n = (universe as f64 * quantile).floor();
    if n.is_finite() && n > 0.0 {
        (n as usize).min(universe)
    } else {
        0
    }
}

/// Rank the universe at evaluation index `end` and split off the quantile buckets.
///
/// # Panics
///
/// If `end` is not a date index of `dataset`, or `forward` was computed from
/// a dataset of a different shape.
pub fn rank_window(
    dataset: &PriceDataset,
    forward: &ForwardReturns,
    end: usize,
    top_quantile: f64,
    bottom_quantile: f64,
) -> RankedUniverse {
    let end_date = dataset.dates()[end];
    let start = shift_months(end_date, -i64::from(forward.formation_period()))
        .and_then(|start| dataset.date_range(start, end_date))
        .map_or(0, |range| *range.start());
    let window_len = (end - start + 1) as f64;

    let mut ranking: Vec<RankedTicker> = (0..dataset.num_tickers())
        .map(|t| {
            let sum: f64 = (start..=end).map(|d| forward.get(t, d)).sum();
            RankedTicker {
                ticker: t,
                score: sum / window_len,
            }
        })
        .collect();

    // `sort_by` is stable; the index comparison makes the tie-break explicit.
    ranking.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });

    let n = ranking.len();
    let n_top = candidate_count(n, top_quantile);
    let n_bottom = candidate_count(n, bottom_quantile);

    let long = ranking[..n_top].iter().map(|r| r.ticker).collect();
    let short = ranking[n - n_bottom..].iter().map(|r| r.ticker).collect();

    RankedUniverse {
        ranking,
        long,
        short,
    }
}
