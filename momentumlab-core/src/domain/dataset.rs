//! PriceDataset — the immutable open/close panel every component reads from.
//!
//! Cells are explicit optionals. A missing observation, or one that arrived
//! as NaN/inf, is `None` and stays `None`; nothing in this module fills gaps.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::ops::RangeInclusive;

use super::Ticker;
use crate::error::BacktestError;

/// One (date, ticker) observation as delivered by a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub ticker: Ticker,
    pub open: Option<f64>,
    pub close: Option<f64>,
}

/// Time-indexed, ticker-keyed table of open and close prices.
///
/// The ticker order is the universe index used for tie-breaking in ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceDataset {
    dates: Vec<NaiveDate>,
    tickers: Vec<Ticker>,
    /// `open[ticker][date]`
    open: Vec<Vec<Option<f64>>>,
    /// `close[ticker][date]`
    close: Vec<Vec<Option<f64>>>,
}

impl PriceDataset {
    /// Build a dataset from column-major open/close series, one column per ticker.
    pub fn new(
        dates: Vec<NaiveDate>,
        tickers: Vec<Ticker>,
        open: Vec<Vec<Option<f64>>>,
        close: Vec<Vec<Option<f64>>>,
    ) -> Result<Self, BacktestError> {
        if dates.is_empty() {
            return Err(BacktestError::NoDates);
        }
        if tickers.is_empty() {
            return Err(BacktestError::NoTickers);
        }
        for pair in dates.windows(2) {
            if pair[0] >= pair[1] {
                return Err(BacktestError::UnorderedDates {
                    prev: pair[0],
                    next: pair[1],
                });
            }
        }
        let mut seen = BTreeSet::new();
        for ticker in &tickers {
            if !seen.insert(ticker.as_str()) {
                return Err(BacktestError::DuplicateTicker(ticker.clone()));
            }
        }

        check_columns("open", &tickers, &open, dates.len())?;
        check_columns("close", &tickers, &close, dates.len())?;

        Ok(Self {
            dates,
            tickers,
            open: open.into_iter().map(normalize).collect(),
            close: close.into_iter().map(normalize).collect(),
        })
    }

    /// Align long-format records onto a common date axis.
    ///
    /// The date axis is the union of all record dates. Tickers keep the order
    /// of their first appearance. A (date, ticker) pair that has no record is
    /// undefined for both open and close.
    pub fn from_records<I>(records: I) -> Result<Self, BacktestError>
    where
        I: IntoIterator<Item = PriceRecord>,
    {
        let mut all_dates = BTreeSet::new();
        let mut tickers: Vec<Ticker> = Vec::new();
        let mut ticker_index: HashMap<Ticker, usize> = HashMap::new();
        let mut cells: HashMap<(usize, NaiveDate), (Option<f64>, Option<f64>)> = HashMap::new();

        for record in records {
            let idx = match ticker_index.get(&record.ticker) {
                Some(&idx) => idx,
                None => {
                    let idx = tickers.len();
                    tickers.push(record.ticker.clone());
                    ticker_index.insert(record.ticker.clone(), idx);
                    idx
                }
            };
            all_dates.insert(record.date);
            if cells
                .insert((idx, record.date), (record.open, record.close))
                .is_some()
            {
                return Err(BacktestError::DuplicateRecord {
                    ticker: record.ticker,
                    date: record.date,
                });
            }
        }

        let dates: Vec<NaiveDate> = all_dates.into_iter().collect();
        let mut open = vec![vec![None; dates.len()]; tickers.len()];
        let mut close = vec![vec![None; dates.len()]; tickers.len()];
        for (d, date) in dates.iter().enumerate() {
            for t in 0..tickers.len() {
                if let Some(&(o, c)) = cells.get(&(t, *date)) {
                    open[t][d] = o;
                    close[t][d] = c;
                }
            }
        }

        Self::new(dates, tickers, open, close)
    }

    /// Restrict and reorder the universe to `tickers`, in that order.
    pub fn select_tickers<S: AsRef<str>>(&self, tickers: &[S]) -> Result<Self, BacktestError> {
        let mut open = Vec::with_capacity(tickers.len());
        let mut close = Vec::with_capacity(tickers.len());
        let mut names = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let ticker = ticker.as_ref();
            let idx = self
                .ticker_index(ticker)
                .ok_or_else(|| BacktestError::UnknownTicker(ticker.to_string()))?;
            names.push(ticker.to_string());
            open.push(self.open[idx].clone());
            close.push(self.close[idx].clone());
        }
        Self::new(self.dates.clone(), names, open, close)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[Ticker] {
        &self.tickers
    }

    pub fn num_dates(&self) -> usize {
        self.dates.len()
    }

    pub fn num_tickers(&self) -> usize {
        self.tickers.len()
    }

    pub fn ticker(&self, ticker: usize) -> &str {
        &self.tickers[ticker]
    }

    pub fn ticker_index(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    /// Position of `date` on the date axis, if it is present.
    pub fn date_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Indices of all dates `d` with `start <= d <= end`, or `None` if no date qualifies.
    pub fn date_range(&self, start: NaiveDate, end: NaiveDate) -> Option<RangeInclusive<usize>> {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end);
        (lo < hi).then(|| lo..=hi - 1)
    }

    pub fn open(&self, ticker: usize, date: usize) -> Option<f64> {
        self.open[ticker][date]
    }

    pub fn close(&self, ticker: usize, date: usize) -> Option<f64> {
        self.close[ticker][date]
    }

    pub fn opens(&self, ticker: usize) -> &[Option<f64>] {
        &self.open[ticker]
    }

    pub fn closes(&self, ticker: usize) -> &[Option<f64>] {
        &self.close[ticker]
    }

    /// Fraction of undefined close cells per ticker.
    pub fn missing_close_rates(&self) -> Vec<(String, f64)> {
        self.tickers
            .iter()
            .zip(&self.close)
            .map(|(ticker, closes)| {
                let missing = closes.iter().filter(|c| c.is_none()).count();
                (ticker.clone(), missing as f64 / closes.len() as f64)
            })
            .collect()
    }

    /// Deterministic BLAKE3 content hash over dates, tickers and every cell.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for date in &self.dates {
            hasher.update(date.to_string().as_bytes());
            hasher.update(b";");
        }
        for (t, ticker) in self.tickers.iter().enumerate() {
            hasher.update(ticker.as_bytes());
            hasher.update(b"|");
            for d in 0..self.dates.len() {
                hash_cell(&mut hasher, self.open[t][d]);
                hash_cell(&mut hasher, self.close[t][d]);
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Calendar month arithmetic; day-of-month is clamped to the target month's end.
pub fn shift_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        date.checked_add_months(magnitude)
    } else {
        date.checked_sub_months(magnitude)
    }
}

fn check_columns(
    series: &'static str,
    tickers: &[Ticker],
    columns: &[Vec<Option<f64>>],
    expected: usize,
) -> Result<(), BacktestError> {
    if columns.len() != tickers.len() {
        return Err(BacktestError::ColumnLength {
            series,
            ticker: "<universe>".into(),
            expected: tickers.len(),
            actual: columns.len(),
        });
    }
    for (ticker, column) in tickers.iter().zip(columns) {
        if column.len() != expected {
            return Err(BacktestError::ColumnLength {
                series,
                ticker: ticker.clone(),
                expected,
                actual: column.len(),
            });
        }
    }
    Ok(())
}

fn normalize(column: Vec<Option<f64>>) -> Vec<Option<f64>> {
    column
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect()
}

fn hash_cell(hasher: &mut blake3::Hasher, value: Option<f64>) {
    match value {
        Some(v) => {
            hasher.update(&[1]);
            hasher.update(&v.to_bits().to_le_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
}
