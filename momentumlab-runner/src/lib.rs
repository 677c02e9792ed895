//! MomentumLab Runner — configuration, data loading, grid search, export.
//!
//! This crate builds on `momentumlab-core` to provide:
//! - TOML configuration with validation and a printable template
//! - Price loading from long-format CSV, or seeded synthetic data
//! - Single-combination runner with run ids and dataset hashes
//! - Parallel grid search with a deterministic best-combination pick
//! - JSON and CSV artifact export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;
pub mod sweep;

pub use config::{
    BacktestConfig, ConfigError, DataConfig, MetricsConfig, OutputConfig, SyntheticConfig,
};
pub use data_loader::{
    generate_synthetic, load_dataset, load_prices_csv, read_prices, restrict_universe,
    LoadError, LoadedData,
};
pub use export::{
    export_grid_csv, export_json, export_portfolio_csv, export_prices_csv,
    export_ticker_trades_csv, export_trades_csv, import_json, load_artifacts, save_artifacts,
    save_sweep,
};
pub use runner::{
    prepare, run_backtest, run_id, BacktestResult, PreparedData, RunError, SCHEMA_VERSION,
};
pub use sweep::{GridSearch, ParameterGrid, SweepResults};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn prepared_data_is_send_sync() {
        assert_send::<PreparedData>();
        assert_sync::<PreparedData>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
        assert_send::<ParameterGrid>();
        assert_sync::<ParameterGrid>();
    }

    #[test]
    fn grid_search_is_send_sync() {
        assert_send::<GridSearch<'static>>();
        assert_sync::<GridSearch<'static>>();
    }

    #[test]
    fn sweep_results_are_send_sync() {
        assert_send::<SweepResults>();
        assert_sync::<SweepResults>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_send::<LoadError>();
        assert_sync::<LoadError>();
    }
}
