//! MomentumLab Core — price panel, metrics, ranking, trade construction, simulation.
//!
//! This crate contains the backtest engine for a cross-sectional
//! momentum/contrarian strategy on monthly data:
//! - Domain types (price panel, trades, ledger, parameter combination)
//! - Metric series: monthly return, trailing mean, volatility, risk-adjusted return
//! - Formation-window ranking with explicit stable tie-break
//! - Long/short trade construction with drawdown and upside
//! - Date-by-date simulation producing a trade ledger
//! - Monthly portfolio aggregation with per-ticker weights
//!
//! Every stage is a pure function over borrowed, immutable inputs.

pub mod domain;
pub mod error;
pub mod metrics;
pub mod portfolio;
pub mod ranking;
pub mod simulation;
pub mod trade_builder;

pub use domain::{
    MetricSnapshot, ParameterCombination, PriceDataset, PriceRecord, Side, Trade, TradeLedger,
};
pub use error::BacktestError;
pub use metrics::{MetricSeries, DEFAULT_WINDOW};
pub use portfolio::{MonthlyPortfolio, PortfolioSummary};
pub use ranking::{rank_window, ForwardReturns, RankedTicker, RankedUniverse};
pub use simulation::{evaluation_range, simulate};
pub use trade_builder::{build_trade, TradeContext};
