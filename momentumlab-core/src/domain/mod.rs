//! Domain types for MomentumLab

pub mod dataset;
pub mod params;
pub mod trade;

pub use dataset::{shift_months, PriceDataset, PriceRecord};
pub use params::ParameterCombination;
pub use trade::{MetricSnapshot, Side, Trade, TradeLedger};

/// Ticker type alias
pub type Ticker = String;
