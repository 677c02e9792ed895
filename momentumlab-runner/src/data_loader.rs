//! Price loading for the runner.
//!
//! Two sources, chosen by `[data]` in the config:
//! 1. `prices` → long-format CSV (`date,ticker,open,close`, empty cell = undefined)
//! 2. `synthetic` → seeded random-walk panel (tagged as synthetic in results)
//!
//! A configured universe restricts and orders the loaded tickers. Tickers in
//! the universe without any price rows are dropped with a warning and the run
//! continues on the rest.

use std::io::Read;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{info, warn};

use momentumlab_core::domain::shift_months;
use momentumlab_core::{BacktestError, PriceDataset, PriceRecord};

use crate::config::{DataConfig, SyntheticConfig};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no price source configured (set data.prices or data.synthetic)")]
    NoSource,

    #[error("failed to read prices from {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("none of the {0} configured tickers have price data")]
    EmptyUniverse(usize),

    #[error("invalid price data: {0}")]
    Dataset(#[from] BacktestError),
}

/// Result of loading prices, including provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub dataset: PriceDataset,
    /// BLAKE3 over every cell of `dataset`.
    pub dataset_hash: String,
    pub has_synthetic: bool,
    /// Universe tickers that had no rows and were dropped.
    pub missing_tickers: Vec<String>,
}

impl LoadedData {
    pub fn new(dataset: PriceDataset, has_synthetic: bool) -> Self {
        let dataset_hash = dataset.content_hash();
        Self {
            dataset,
            dataset_hash,
            has_synthetic,
            missing_tickers: Vec::new(),
        }
    }
}

/// Load prices as described by the `[data]` section.
pub fn load_dataset(config: &DataConfig) -> Result<LoadedData, LoadError> {
    let (dataset, has_synthetic) = match (&config.prices, &config.synthetic) {
        (Some(path), _) => (load_prices_csv(path)?, false),
        (None, Some(synthetic)) => {
            warn!("generating synthetic prices; results will be tagged as synthetic");
            (generate_synthetic(synthetic)?, true)
        }
        (None, None) => return Err(LoadError::NoSource),
    };

    let (dataset, missing_tickers) = match &config.universe {
        Some(universe) => restrict_universe(&dataset, universe)?,
        None => (dataset, Vec::new()),
    };

    info!(
        tickers = dataset.num_tickers(),
        dates = dataset.num_dates(),
        synthetic = has_synthetic,
        "prices loaded"
    );

    let mut loaded = LoadedData::new(dataset, has_synthetic);
    loaded.missing_tickers = missing_tickers;
    Ok(loaded)
}

/// Read a long-format price CSV from disk.
pub fn load_prices_csv(path: &Path) -> Result<PriceDataset, LoadError> {
    let file = std::fs::File::open(path).map_err(|e| LoadError::Csv {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    read_prices(file, path)
}

/// Read long-format price rows from any reader. `origin` is only used in errors.
pub fn read_prices<R: Read>(reader: R, origin: &Path) -> Result<PriceDataset, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let records = rdr
        .deserialize::<PriceRecord>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| LoadError::Csv {
            path: origin.to_path_buf(),
            source,
        })?;
    Ok(PriceDataset::from_records(records)?)
}

/// Restrict `dataset` to `universe`, in universe order.
///
/// Returns the restricted dataset and the universe tickers that were absent.
pub fn restrict_universe(
    dataset: &PriceDataset,
    universe: &[String],
) -> Result<(PriceDataset, Vec<String>), LoadError> {
    let (present, missing): (Vec<&String>, Vec<&String>) = universe
        .iter()
        .partition(|ticker| dataset.ticker_index(ticker).is_some());

    for ticker in &missing {
        warn!(%ticker, "no price data for ticker, dropping it from the universe");
    }
    if present.is_empty() {
        return Err(LoadError::EmptyUniverse(universe.len()));
    }

    let restricted = dataset.select_tickers(&present)?;
    Ok((restricted, missing.into_iter().cloned().collect()))
}

/// Generate a seeded synthetic monthly panel.
///
/// Each ticker gets its own drift and a random walk over monthly returns; the
/// next month opens near the previous close. Every ticker's stream is seeded
/// from `(seed, ticker)` so the panel does not change when `tickers` grows.
pub fn generate_synthetic(config: &SyntheticConfig) -> Result<PriceDataset, LoadError> {
    let dates = (0..config.months)
        .map_while(|m| shift_months(config.start, m as i64))
        .collect::<Vec<_>>();
    let tickers: Vec<String> = (0..config.tickers).map(|t| format!("SYN{t:03}")).collect();

    let mut open = Vec::with_capacity(tickers.len());
    let mut close = Vec::with_capacity(tickers.len());
    for ticker in &tickers {
        let seed = blake3::hash(format!("{}:{ticker}", config.seed).as_bytes());
        let mut rng = StdRng::from_seed(*seed.as_bytes());

        let drift: f64 = rng.gen_range(-0.01..0.015);
        let vol: f64 = rng.gen_range(0.03..0.10);
        let mut price: f64 = rng.gen_range(20.0..500.0);

        let mut o = Vec::with_capacity(dates.len());
        let mut c = Vec::with_capacity(dates.len());
        for _ in 0..dates.len() {
            let month_open = price * (1.0 + rng.gen_range(-0.01..0.01));
            let month_close = month_open * (1.0 + drift + rng.gen_range(-vol..vol));
            o.push(blank(&mut rng, config.missing_rate, month_open));
            c.push(blank(&mut rng, config.missing_rate, month_close));
            price = month_close;
        }
        open.push(o);
        close.push(c);
    }

    Ok(PriceDataset::new(dates, tickers, open, close)?)
}

fn blank(rng: &mut StdRng, missing_rate: f64, value: f64) -> Option<f64> {
    if rng.gen::<f64>() < missing_rate {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
date,ticker,open,close
2024-01-31,AAA,10.0,11.0
2024-01-31,BBB,20.0,19.0
2024-02-29,AAA,11.0,
2024-02-29,BBB,19.5,21.0
2024-03-31,BBB,21.0,22.0
";

    fn read(text: &str) -> Result<PriceDataset, LoadError> {
        read_prices(text.as_bytes(), Path::new("inline.csv"))
    }

    #[test]
    fn reads_long_format_with_gaps() {
        let ds = read(CSV).unwrap();
        assert_eq!(ds.tickers(), ["AAA", "BBB"]);
        assert_eq!(ds.num_dates(), 3);

        // empty cell and absent row are both undefined
        assert_eq!(ds.close(0, 1), None);
        assert_eq!(ds.open(0, 2), None);
        assert_eq!(ds.close(1, 2), Some(22.0));
    }

    #[test]
    fn duplicate_rows_are_rejected() {
        let text = format!("{CSV}2024-03-31,BBB,1.0,2.0\n");
        let err = read(&text).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Dataset(BacktestError::DuplicateRecord { .. })
        ));
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let err = read("date,ticker,open,close\n2024-01-31,AAA,abc,1\n").unwrap_err();
        assert!(matches!(err, LoadError::Csv { .. }));
        assert!(err.to_string().contains("inline.csv"));
    }

    #[test]
    fn universe_reorders_and_drops_missing() {
        let ds = read(CSV).unwrap();
        let universe = vec!["BBB".to_string(), "ZZZ".to_string(), "AAA".to_string()];
        let (restricted, missing) = restrict_universe(&ds, &universe).unwrap();
        assert_eq!(restricted.tickers(), ["BBB", "AAA"]);
        assert_eq!(missing, vec!["ZZZ".to_string()]);
        assert_eq!(restricted.open(0, 0), Some(20.0));
    }

    #[test]
    fn universe_without_any_data_fails() {
        let ds = read(CSV).unwrap();
        let err = restrict_universe(&ds, &["X".to_string(), "Y".to_string()]).unwrap_err();
        assert!(matches!(err, LoadError::EmptyUniverse(2)));
    }

    #[test]
    fn synthetic_is_seeded_and_monthly() {
        let config = SyntheticConfig {
            tickers: 5,
            months: 24,
            ..SyntheticConfig::default()
        };
        let a = generate_synthetic(&config).unwrap();
        let b = generate_synthetic(&config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.num_tickers(), 5);
        assert_eq!(a.num_dates(), 24);
        assert_eq!(a.dates()[12], shift_months(config.start, 12).unwrap());

        let reseeded = generate_synthetic(&SyntheticConfig { seed: 43, ..config }).unwrap();
        assert_ne!(a.content_hash(), reseeded.content_hash());
    }

    #[test]
    fn synthetic_ticker_streams_are_independent_of_universe_size() {
        let small = generate_synthetic(&SyntheticConfig {
            tickers: 2,
            months: 12,
            ..SyntheticConfig::default()
        })
        .unwrap();
        let large = generate_synthetic(&SyntheticConfig {
            tickers: 6,
            months: 12,
            ..SyntheticConfig::default()
        })
        .unwrap();
        assert_eq!(small.opens(1), large.opens(1));
    }

    #[test]
    fn synthetic_missing_rate_blanks_cells() {
        let ds = generate_synthetic(&SyntheticConfig {
            tickers: 10,
            months: 60,
            missing_rate: 0.3,
            ..SyntheticConfig::default()
        })
        .unwrap();
        let missing = ds
            .missing_close_rates()
            .iter()
            .map(|(_, rate)| rate)
            .sum::<f64>();
        assert!(missing > 0.0);
    }

    #[test]
    fn load_dataset_tags_synthetic() {
        let config = DataConfig {
            synthetic: Some(SyntheticConfig {
                tickers: 3,
                months: 6,
                ..SyntheticConfig::default()
            }),
            ..DataConfig::default()
        };
        let loaded = load_dataset(&config).unwrap();
        assert!(loaded.has_synthetic);
        assert_eq!(loaded.dataset_hash, loaded.dataset.content_hash());
        assert!(loaded.missing_tickers.is_empty());

        assert!(matches!(
            load_dataset(&DataConfig::default()),
            Err(LoadError::NoSource)
        ));
    }
}
