//! Monthly portfolio aggregation of a trade ledger.
//!
//! Trades are grouped by the year and month of their evaluation date. A
//! month's portfolio return is the plain sum of trade profits (shorts already
//! carry their sign). Per-ticker weights share out that month's profit across
//! every ticker present anywhere in the ledger; a ticker that did not trade in
//! the month contributes zero. When the month's profit is exactly zero the
//! shares are undefined and every weight in the row is `None`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::TradeLedger;

/// One (year, month) row of the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPortfolio {
    pub year: i32,
    pub month: u32,
    pub portfolio_return: f64,
    pub trade_count: usize,
    /// Profit share per ticker; `None` when the month's total profit is zero.
    pub weights: BTreeMap<String, Option<f64>>,
}

impl MonthlyPortfolio {
    /// Weight of `ticker`, flattened: `None` for an unknown ticker or an undefined row.
    pub fn weight(&self, ticker: &str) -> Option<f64> {
        self.weights.get(ticker).copied().flatten()
    }

    /// True when the row's weights are defined (non-zero total profit).
    pub fn has_weights(&self) -> bool {
        self.weights.values().all(Option::is_some)
    }
}

/// Month-by-month view of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    /// Every ticker that traded at least once, sorted. One weight column each.
    pub tickers: Vec<String>,
    /// Chronological rows.
    pub months: Vec<MonthlyPortfolio>,
}

#[derive(Default)]
struct MonthAccumulator {
    profit: f64,
    trades: usize,
    by_ticker: BTreeMap<String, f64>,
}

impl PortfolioSummary {
    pub fn aggregate(ledger: &TradeLedger) -> Self {
        let tickers: BTreeSet<&str> = ledger.iter().map(|t| t.ticker.as_str()).collect();

        let mut grouped: BTreeMap<(i32, u32), MonthAccumulator> = BTreeMap::new();
        for trade in ledger {
            let acc = grouped.entry((trade.year(), trade.month())).or_default();
            acc.profit += trade.profit;
            acc.trades += 1;
            *acc.by_ticker.entry(trade.ticker.clone()).or_insert(0.0) += trade.profit;
        }

        let months = grouped
            .into_iter()
            .map(|((year, month), acc)| {
                // Same sum as `portfolio_return`: zero return iff undefined weights.
                let total = acc.profit;
                let weights = tickers
                    .iter()
                    .map(|ticker| {
                        let share = if total == 0.0 {
                            None
                        } else {
                            Some(acc.by_ticker.get(*ticker).copied().unwrap_or(0.0) / total)
                        };
                        (ticker.to_string(), share)
                    })
                    .collect();
                MonthlyPortfolio {
                    year,
                    month,
                    portfolio_return: acc.profit,
                    trade_count: acc.trades,
                    weights,
                }
            })
            .collect();

        Self {
            tickers: tickers.into_iter().map(String::from).collect(),
            months,
        }
    }

    /// Sum of monthly portfolio returns; 0 for an empty ledger.
    pub fn cumulative_return(&self) -> f64 {
        self.months.iter().map(|m| m.portfolio_return).sum()
    }

    pub fn total_trades(&self) -> usize {
        self.months.iter().map(|m| m.trade_count).sum()
    }

    pub fn month(&self, year: i32, month: u32) -> Option<&MonthlyPortfolio> {
        self.months
            .iter()
            .find(|m| m.year == year && m.month == month)
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }
}
