//! Trade — one closed position, and the ledger that collects them.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Ticker;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Position label used in reports: a long opens with a buy, a short with a sell.
    pub fn position_label(&self) -> &'static str {
        match self {
            Side::Long => "buy",
            Side::Short => "sell",
        }
    }
}

/// Metric values observed for the traded ticker at the exit date.
///
/// Reporting only; none of these feed back into selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub monthly_return: Option<f64>,
    pub mean_return: Option<f64>,
    pub volatility: Option<f64>,
    pub risk_adjusted: Option<f64>,
}

/// A closed position over one holding period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Identification ──
    pub evaluation_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub ticker: Ticker,
    pub side: Side,

    // ── Prices ──
    /// Open at the evaluation date (buy for a long, sell for a short).
    pub entry_price: f64,
    /// Close at the exit date (sell for a long, cover for a short).
    pub exit_price: f64,

    // ── Outcome (fractions of entry price) ──
    pub profit: f64,
    pub drawdown: f64,
    pub upside: f64,

    // ── Snapshots at exit ──
    /// Forward cumulative return used for ranking, read at the exit date.
    pub forward_return: f64,
    pub metrics: MetricSnapshot,
}

impl Trade {
    pub fn year(&self) -> i32 {
        self.evaluation_date.year()
    }

    pub fn month(&self) -> u32 {
        self.evaluation_date.month()
    }

    pub fn buy_price(&self) -> f64 {
        match self.side {
            Side::Long => self.entry_price,
            Side::Short => self.exit_price,
        }
    }

    pub fn sell_price(&self) -> f64 {
        match self.side {
            Side::Long => self.exit_price,
            Side::Short => self.entry_price,
        }
    }

    pub fn is_winner(&self) -> bool {
        self.profit > 0.0
    }
}

/// Ordered trades of one simulation run.
///
/// Order: evaluation date, then long before short, then rank within the side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeLedger {
    trades: Vec<Trade>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trade> {
        self.trades.iter()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Distinct tickers that traded, sorted.
    pub fn tickers(&self) -> Vec<&str> {
        self.trades
            .iter()
            .map(|t| t.ticker.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn for_ticker<'a>(&'a self, ticker: &'a str) -> impl Iterator<Item = &'a Trade> + 'a {
        self.trades.iter().filter(move |t| t.ticker == ticker)
    }

    pub fn count_side(&self, side: Side) -> usize {
        self.trades.iter().filter(|t| t.side == side).count()
    }
}

impl From<Vec<Trade>> for TradeLedger {
    fn from(trades: Vec<Trade>) -> Self {
        Self { trades }
    }
}

impl<'a> IntoIterator for &'a TradeLedger {
    type Item = &'a Trade;
    type IntoIter = std::slice::Iter<'a, Trade>;

    fn into_iter(self) -> Self::IntoIter {
        self.trades.iter()
    }
}
