//! Structural validation errors.
//!
//! Everything the engine treats as a data condition (missing exit price,
//! undefined metric, zero-profit month) is expressed through `Option` values
//! and skipped records. Only inputs that cannot describe a meaningful run end
//! up here.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("price dataset has no dates")]
    NoDates,

    #[error("price dataset has no tickers")]
    NoTickers,

    #[error("dates must be strictly ascending: {prev} is followed by {next}")]
    UnorderedDates { prev: NaiveDate, next: NaiveDate },

    #[error("duplicate ticker '{0}' in universe")]
    DuplicateTicker(String),

    #[error("ticker '{0}' is not part of the dataset")]
    UnknownTicker(String),

    #[error("duplicate price record for '{ticker}' on {date}")]
    DuplicateRecord { ticker: String, date: NaiveDate },

    #[error("{series} column for '{ticker}' has {actual} rows, expected {expected}")]
    ColumnLength {
        series: &'static str,
        ticker: String,
        expected: usize,
        actual: usize,
    },

    #[error("{name} must be a positive number of months")]
    NonPositivePeriod { name: &'static str },

    #[error("{name} must lie strictly between 0 and 1, got {value}")]
    QuantileOutOfRange { name: &'static str, value: f64 },

    #[error("metrics window must be at least 1")]
    ZeroWindow,

    #[error("metric series cover {metric_tickers}x{metric_dates}, dataset is {tickers}x{dates}")]
    MetricsMismatch {
        metric_tickers: usize,
        metric_dates: usize,
        tickers: usize,
        dates: usize,
    },
}
