//! TOML backtest configuration.
//!
//! ```toml
//! [data]
//! prices = "prices.csv"
//! universe = ["AAA", "BBB"]
//!
//! [metrics]
//! window = 12
//!
//! [grid]
//! formation_periods = [6, 9, 12]
//! holding_periods = [1, 2, 3]
//! top_quantiles = [0.1, 0.15]
//! bottom_quantiles = [0.1, 0.15]
//!
//! [output]
//! dir = "results"
//! per_combination = false
//! ```
//!
//! Every section is optional and falls back to its `Default`. Unknown keys are
//! rejected.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use momentumlab_core::DEFAULT_WINDOW;

use crate::sweep::ParameterGrid;

/// Errors from reading or validating a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full configuration for one grid-search run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub grid: ParameterGrid,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where prices come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// Long-format CSV with `date,ticker,open,close` columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prices: Option<PathBuf>,

    /// Restrict to these tickers, in this order. `None` keeps every ticker in
    /// first-appearance order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub universe: Option<Vec<String>>,

    /// Generate a seeded synthetic panel instead of reading `prices`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<SyntheticConfig>,
}

/// Parameters of the seeded random-walk generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticConfig {
    pub tickers: usize,
    pub months: usize,
    pub start: NaiveDate,
    pub seed: u64,
    /// Fraction of cells blanked out to exercise the undefined-value paths.
    pub missing_rate: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            tickers: 50,
            months: 54,
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN),
            seed: 42,
            missing_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Trailing window for mean return and volatility, in observations.
    pub window: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Also write artifacts for every combination, not just the best one.
    pub per_combination: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
            per_combination: false,
        }
    }
}

impl BacktestConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Commented starting point printed by `momentumlab template`.
    pub fn template() -> Result<String, ConfigError> {
        let mut config = Self::default();
        config.data.prices = Some(PathBuf::from("prices.csv"));
        let body = config.to_toml()?;
        Ok(format!(
            "# MomentumLab backtest configuration.\n\
             # prices: long-format CSV with columns date,ticker,open,close.\n\
             # Replace `prices` with a [data.synthetic] table for an offline run.\n\n{body}"
        ))
    }

    /// Structural checks that would otherwise fail deep inside a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.data.prices, &self.data.synthetic) {
            (None, None) => {
                return Err(ConfigError::Invalid(
                    "set either data.prices or data.synthetic".into(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid(
                    "data.prices and data.synthetic are mutually exclusive".into(),
                ))
            }
            _ => {}
        }

        if let Some(universe) = &self.data.universe {
            if universe.is_empty() {
                return Err(ConfigError::Invalid("data.universe is empty".into()));
            }
        }

        if let Some(synthetic) = &self.data.synthetic {
            if synthetic.tickers == 0 || synthetic.months == 0 {
                return Err(ConfigError::Invalid(
                    "data.synthetic needs at least one ticker and one month".into(),
                ));
            }
            if !(0.0..1.0).contains(&synthetic.missing_rate) {
                return Err(ConfigError::Invalid(format!(
                    "data.synthetic.missing_rate must be in [0, 1), got {}",
                    synthetic.missing_rate
                )));
            }
        }

        if self.metrics.window == 0 {
            return Err(ConfigError::Invalid("metrics.window must be at least 1".into()));
        }

        self.grid
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("grid: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = BacktestConfig::from_toml(
            r#"
            [data]
            prices = "prices.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.data.prices, Some(PathBuf::from("prices.csv")));
        assert_eq!(config.metrics.window, 12);
        assert_eq!(config.grid, ParameterGrid::default());
        assert_eq!(config.output.dir, PathBuf::from("results"));
        assert!(!config.output.per_combination);
        config.validate().unwrap();
    }

    #[test]
    fn full_config_parses() {
        let config = BacktestConfig::from_toml(
            r#"
            [data]
            universe = ["BBB", "AAA"]

            [data.synthetic]
            tickers = 10
            months = 36
            seed = 7

            [metrics]
            window = 6

            [grid]
            formation_periods = [3]
            holding_periods = [1, 2]
            top_quantiles = [0.2]
            bottom_quantiles = [0.2, 0.3]

            [output]
            dir = "out"
            per_combination = true
            "#,
        )
        .unwrap();

        let synthetic = config.data.synthetic.as_ref().unwrap();
        assert_eq!(synthetic.tickers, 10);
        assert_eq!(synthetic.months, 36);
        assert_eq!(synthetic.seed, 7);
        assert_eq!(synthetic.missing_rate, 0.0);
        assert_eq!(config.data.universe.as_deref().unwrap(), ["BBB", "AAA"]);
        assert_eq!(config.metrics.window, 6);
        assert_eq!(config.grid.size(), 4);
        assert!(config.output.per_combination);
        config.validate().unwrap();
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = BacktestConfig::from_toml(
            r#"
            [grid]
            formation_period = [3]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validate_requires_exactly_one_source() {
        let mut config = BacktestConfig::default();
        assert!(config.validate().is_err());

        config.data.prices = Some("p.csv".into());
        config.data.synthetic = Some(SyntheticConfig::default());
        assert!(config.validate().is_err());

        config.data.prices = None;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_bad_grid_and_window() {
        let mut config = BacktestConfig::default();
        config.data.synthetic = Some(SyntheticConfig::default());

        config.metrics.window = 0;
        assert!(config.validate().is_err());
        config.metrics.window = 12;

        config.grid.holding_periods.clear();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("holding"), "{err}");

        config.grid = ParameterGrid::default();
        config.grid.top_quantiles = vec![1.5];
        assert!(config.validate().is_err());
    }

    #[test]
    fn template_parses_back() {
        let text = BacktestConfig::template().unwrap();
        assert!(text.starts_with('#'));
        let config = BacktestConfig::from_toml(&text).unwrap();
        config.validate().unwrap();
        assert_eq!(config.grid, ParameterGrid::default());
    }
}
