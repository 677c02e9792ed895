//! Backtest runner — wires together data, metrics, simulation and aggregation.
//!
//! Two entry points:
//! - `prepare()`: validates a `BacktestConfig`, loads prices and computes the
//!   metric series once. Used by the CLI.
//! - `run_backtest()`: one parameter combination over prepared data, no I/O.
//!   Used by the grid search for every combination.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use momentumlab_core::{
    simulate, BacktestError, MetricSeries, ParameterCombination, PortfolioSummary, PriceDataset,
    Side, TradeLedger,
};

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{load_dataset, LoadError, LoadedData};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("backtest error: {0}")]
    Backtest(#[from] BacktestError),
    #[error("parameter grid axis '{0}' is empty")]
    EmptyGridAxis(&'static str),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Prices plus everything derived from them once per run.
///
/// Shared read-only by every grid-search worker.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub dataset: PriceDataset,
    pub metrics: MetricSeries,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub missing_tickers: Vec<String>,
}

impl PreparedData {
    pub fn new(loaded: LoadedData, window: usize) -> Result<Self, RunError> {
        let metrics = MetricSeries::with_window(&loaded.dataset, window)?;
        Ok(Self {
            dataset: loaded.dataset,
            metrics,
            dataset_hash: loaded.dataset_hash,
            has_synthetic: loaded.has_synthetic,
            missing_tickers: loaded.missing_tickers,
        })
    }

    /// Real (non-synthetic) data with nothing dropped.
    pub fn from_dataset(dataset: PriceDataset, window: usize) -> Result<Self, RunError> {
        Self::new(LoadedData::new(dataset, false), window)
    }
}

/// Complete result of one parameter combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub params: ParameterCombination,
    pub metrics_window: usize,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub cumulative_return: f64,
    pub trade_count: usize,
    pub long_count: usize,
    pub short_count: usize,
    pub trades: TradeLedger,
    pub summary: PortfolioSummary,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    /// Number of (year, month) rows in the portfolio summary.
    pub fn months(&self) -> usize {
        self.summary.months.len()
    }
}

/// Deterministic BLAKE3 id for a combination over a dataset.
///
/// Quantiles are hashed by bit pattern, so `0.1` and `0.10000000000000002`
/// get different ids.
pub fn run_id(params: &ParameterCombination, dataset_hash: &str, metrics_window: usize) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&params.formation_period.to_le_bytes());
    hasher.update(&params.holding_period.to_le_bytes());
    hasher.update(&params.top_quantile.to_bits().to_le_bytes());
    hasher.update(&params.bottom_quantile.to_bits().to_le_bytes());
    hasher.update(&(metrics_window as u64).to_le_bytes());
    hasher.update(dataset_hash.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Validate the config, load prices and compute metric series.
pub fn prepare(config: &BacktestConfig) -> Result<PreparedData, RunError> {
    config.validate()?;
    let loaded = load_dataset(&config.data)?;
    PreparedData::new(loaded, config.metrics.window)
}

/// Run one combination over prepared data. No I/O.
pub fn run_backtest(
    data: &PreparedData,
    params: &ParameterCombination,
) -> Result<BacktestResult, RunError> {
    let trades = simulate(&data.dataset, &data.metrics, params)?;
    let summary = PortfolioSummary::aggregate(&trades);
    let cumulative_return = summary.cumulative_return();

    debug!(
        %params,
        trades = trades.len(),
        months = summary.months.len(),
        cumulative_return,
        "combination evaluated"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: run_id(params, &data.dataset_hash, data.metrics.window()),
        params: *params,
        metrics_window: data.metrics.window(),
        dataset_hash: data.dataset_hash.clone(),
        has_synthetic: data.has_synthetic,
        cumulative_return,
        trade_count: trades.len(),
        long_count: trades.count_side(Side::Long),
        short_count: trades.count_side(Side::Short),
        trades,
        summary,
    })
}
