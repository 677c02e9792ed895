//! Simulation over every evaluation date for one parameter combination.
//!
//! Dates are independent: each one is ranked from scratch and every selected
//! candidate becomes its own trade. There is no position netting, so holding
//! periods overlap freely and exposure is unbounded.

use std::ops::Range;

use tracing::{debug, trace};

use crate::domain::{ParameterCombination, PriceDataset, Side, TradeLedger};
use crate::error::BacktestError;
use crate::metrics::MetricSeries;
use crate::ranking::{rank_window, ForwardReturns};
use crate::trade_builder::{build_trade, TradeContext};

/// Evaluation date indices for a formation period.
///
/// Dates before index `formation_period` lack ranking history. Empty when the
/// formation period reaches past the end of the dataset.
pub fn evaluation_range(dataset: &PriceDataset, formation_period: u32) -> Range<usize> {
    let first = formation_period as usize;
    first.min(dataset.num_dates())..dataset.num_dates()
}

/// Run the strategy once and collect the trade ledger.
///
/// Fails only on an invalid combination or metrics computed from a different
/// dataset. Missing history, missing exits and empty quantile buckets produce
/// fewer trades, never errors.
pub fn simulate(
    dataset: &PriceDataset,
    metrics: &MetricSeries,
    params: &ParameterCombination,
) -> Result<TradeLedger, BacktestError> {
    params.validate()?;
    metrics.check_shape(dataset)?;

    let mut ledger = TradeLedger::new();
    let dates = evaluation_range(dataset, params.formation_period);
    if dates.is_empty() {
        debug!(%params, num_dates = dataset.num_dates(), "no evaluation dates");
        return Ok(ledger);
    }

    let forward = ForwardReturns::compute(dataset, params.formation_period);
    let ctx = TradeContext {
        dataset,
        metrics,
        forward: &forward,
    };

    let mut skipped = 0usize;
    for end in dates {
        let ranked = rank_window(
            dataset,
            &forward,
            end,
            params.top_quantile,
            params.bottom_quantile,
        );

        for (side, candidates) in [(Side::Long, &ranked.long), (Side::Short, &ranked.short)] {
            for &ticker in candidates {
                match build_trade(&ctx, end, ticker, side, params.holding_period) {
                    Some(trade) => ledger.push(trade),
                    None => {
                        skipped += 1;
                        trace!(
                            date = %dataset.dates()[end],
                            ticker = dataset.ticker(ticker),
                            ?side,
                            "candidate skipped: no exit price"
                        );
                    }
                }
            }
        }
    }

    debug!(%params, trades = ledger.len(), skipped, "simulation finished");
    Ok(ledger)
}
