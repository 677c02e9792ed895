//! Per-ticker metric series derived from the price panel.
//!
//! - Monthly return: `(close[t] - open[t-1]) / open[t-1]`
//! - Trailing mean and trailing volatility (sample std) over a rolling window
//! - Risk-adjusted return: mean / volatility
//!
//! Any window touching an undefined observation is undefined. Zero
//! volatility makes the risk-adjusted value undefined rather than infinite.

use serde::{Deserialize, Serialize};

use crate::domain::{MetricSnapshot, PriceDataset};
use crate::error::BacktestError;

/// Default rolling window, in observations.
pub const DEFAULT_WINDOW: usize = 12;

/// The four derived series, indexed `[ticker][date]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    window: usize,
    monthly_return: Vec<Vec<Option<f64>>>,
    mean_return: Vec<Vec<Option<f64>>>,
    volatility: Vec<Vec<Option<f64>>>,
    risk_adjusted: Vec<Vec<Option<f64>>>,
}

impl MetricSeries {
    /// Compute with the default 12-observation window.
    pub fn compute(dataset: &PriceDataset) -> Self {
        Self::build(dataset, DEFAULT_WINDOW)
    }

    pub fn with_window(dataset: &PriceDataset, window: usize) -> Result<Self, BacktestError> {
        if window == 0 {
            return Err(BacktestError::ZeroWindow);
        }
        Ok(Self::build(dataset, window))
    }

    fn build(dataset: &PriceDataset, window: usize) -> Self {
        let n_tickers = dataset.num_tickers();
        let mut monthly_return = Vec::with_capacity(n_tickers);
        let mut mean_return = Vec::with_capacity(n_tickers);
        let mut volatility = Vec::with_capacity(n_tickers);
        let mut risk_adjusted = Vec::with_capacity(n_tickers);

        for t in 0..n_tickers {
            let ret = monthly_returns(dataset.opens(t), dataset.closes(t));
            let avg = rolling(&ret, window, mean);
            let vol = rolling(&ret, window, sample_std);
            let adj = avg
                .iter()
                .zip(&vol)
                .map(|(m, v)| risk_adjusted_return(*m, *v))
                .collect();

            monthly_return.push(ret);
            mean_return.push(avg);
            volatility.push(vol);
            risk_adjusted.push(adj);
        }

        Self {
            window,
            monthly_return,
            mean_return,
            volatility,
            risk_adjusted,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn num_tickers(&self) -> usize {
        self.monthly_return.len()
    }

    pub fn num_dates(&self) -> usize {
        self.monthly_return.first().map_or(0, Vec::len)
    }

    /// Fails if these series were not computed from a dataset of this shape.
    pub fn check_shape(&self, dataset: &PriceDataset) -> Result<(), BacktestError> {
        if self.num_tickers() != dataset.num_tickers() || self.num_dates() != dataset.num_dates() {
            return Err(BacktestError::MetricsMismatch {
                metric_tickers: self.num_tickers(),
                metric_dates: self.num_dates(),
                tickers: dataset.num_tickers(),
                dates: dataset.num_dates(),
            });
        }
        Ok(())
    }

    pub fn monthly_return(&self, ticker: usize, date: usize) -> Option<f64> {
        self.monthly_return[ticker][date]
    }

    pub fn mean_return(&self, ticker: usize, date: usize) -> Option<f64> {
        self.mean_return[ticker][date]
    }

    pub fn volatility(&self, ticker: usize, date: usize) -> Option<f64> {
        self.volatility[ticker][date]
    }

    pub fn risk_adjusted(&self, ticker: usize, date: usize) -> Option<f64> {
        self.risk_adjusted[ticker][date]
    }

    pub fn monthly_returns(&self, ticker: usize) -> &[Option<f64>] {
        &self.monthly_return[ticker]
    }

    pub fn snapshot(&self, ticker: usize, date: usize) -> MetricSnapshot {
        MetricSnapshot {
            monthly_return: self.monthly_return(ticker, date),
            mean_return: self.mean_return(ticker, date),
            volatility: self.volatility(ticker, date),
            risk_adjusted: self.risk_adjusted(ticker, date),
        }
    }
}

/// Prior open to current close. Undefined at index 0.
pub fn monthly_returns(open: &[Option<f64>], close: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = vec![None; close.len()];
    for t in 1..close.len() {
        out[t] = match (open[t - 1], close[t]) {
            (Some(prev_open), Some(c)) if prev_open != 0.0 => Some((c - prev_open) / prev_open),
            _ => None,
        };
    }
    out
}

/// Apply `f` over every full window ending at each index.
///
/// Indices before `window - 1` and windows holding any undefined value are undefined.
pub fn rolling<F>(values: &[Option<f64>], window: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }
    let mut buf = Vec::with_capacity(window);
    for end in (window - 1)..values.len() {
        let slice = &values[end + 1 - window..=end];
        if slice.iter().any(Option::is_none) {
            continue;
        }
        buf.clear();
        buf.extend(slice.iter().flatten());
        out[end] = f(&buf);
    }
    out
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (N - 1 denominator); undefined below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

pub fn risk_adjusted_return(mean: Option<f64>, volatility: Option<f64>) -> Option<f64> {
    match (mean, volatility) {
        (Some(m), Some(v)) if v != 0.0 => Some(m / v).filter(|x| x.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "actual={actual}, expected={expected}"
        );
    }

    fn panel(opens: &[f64], closes: &[f64]) -> PriceDataset {
        let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let dates = (0..opens.len())
            .map(|i| base.checked_add_months(chrono::Months::new(i as u32)).unwrap())
            .collect();
        PriceDataset::new(
            dates,
            vec!["AAA".into()],
            vec![opens.iter().map(|v| Some(*v)).collect()],
            vec![closes.iter().map(|v| Some(*v)).collect()],
        )
        .unwrap()
    }

    #[test]
    fn monthly_return_uses_prior_open() {
        let ds = panel(&[100.0, 110.0, 120.0], &[105.0, 115.0, 99.0]);
        let m = MetricSeries::compute(&ds);
        assert_eq!(m.monthly_return(0, 0), None);
        assert_approx(m.monthly_return(0, 1).unwrap(), (115.0 - 100.0) / 100.0);
        assert_approx(m.monthly_return(0, 2).unwrap(), (99.0 - 110.0) / 110.0);
    }

    #[test]
    fn undefined_inputs_propagate() {
        let ret = monthly_returns(
            &[Some(10.0), None, Some(12.0)],
            &[Some(10.0), Some(11.0), Some(13.0)],
        );
        assert!(ret[1].is_some());
        assert_eq!(ret[2], None);

        let ret = monthly_returns(&[Some(0.0), Some(1.0)], &[Some(1.0), Some(2.0)]);
        assert_eq!(ret[1], None);
    }

    #[test]
    fn default_window_leaves_first_twelve_undefined() {
        let opens: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let closes: Vec<f64> = (0..20).map(|i| 101.0 + (i % 3) as f64 + i as f64).collect();
        let ds = panel(&opens, &closes);
        let m = MetricSeries::compute(&ds);

        // return[0] is undefined, so the first full window ends at index 12
        for i in 0..12 {
            assert_eq!(m.mean_return(0, i), None, "index {i}");
            assert_eq!(m.volatility(0, i), None, "index {i}");
        }
        let window: Vec<f64> = (1..=12).map(|i| m.monthly_return(0, i).unwrap()).collect();
        assert_approx(m.mean_return(0, 12).unwrap(), mean(&window).unwrap());
        assert_approx(m.volatility(0, 12).unwrap(), sample_std(&window).unwrap());
        assert_approx(
            m.risk_adjusted(0, 12).unwrap(),
            m.mean_return(0, 12).unwrap() / m.volatility(0, 12).unwrap(),
        );
    }

    #[test]
    fn rolling_mean_basic() {
        let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0].iter().map(|v| Some(*v)).collect();
        let out = rolling(&values, 2, mean);
        assert_eq!(out, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    #[test]
    fn rolling_window_with_gap_is_undefined() {
        let values = vec![Some(1.0), None, Some(3.0), Some(4.0), Some(5.0)];
        let out = rolling(&values, 2, mean);
        assert_eq!(out, vec![None, None, None, Some(3.5), Some(4.5)]);
    }

    #[test]
    fn sample_std_matches_hand_computation() {
        // mean 5, squared deviations sum 32, n-1 = 7
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_approx(sample_std(&v).unwrap(), (32.0_f64 / 7.0).sqrt());
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn zero_volatility_gives_undefined_risk_adjusted() {
        assert_eq!(risk_adjusted_return(Some(0.01), Some(0.0)), None);
        assert_eq!(risk_adjusted_return(None, Some(0.1)), None);
        assert_eq!(risk_adjusted_return(Some(0.01), None), None);
        assert_approx(risk_adjusted_return(Some(0.02), Some(0.1)).unwrap(), 0.2);
    }

    #[test]
    fn flat_prices_have_undefined_risk_adjusted() {
        let ds = panel(&[100.0; 15], &[100.0; 15]);
        let m = MetricSeries::compute(&ds);
        assert_eq!(m.volatility(0, 14), Some(0.0));
        assert_eq!(m.risk_adjusted(0, 14), None);
    }

    #[test]
    fn custom_window_and_zero_window() {
        let ds = panel(&[100.0, 101.0, 102.0, 103.0], &[101.0, 102.0, 103.0, 104.0]);
        let m = MetricSeries::with_window(&ds, 2).unwrap();
        assert_eq!(m.window(), 2);
        assert_eq!(m.mean_return(0, 1), None);
        assert!(m.mean_return(0, 2).is_some());

        assert_eq!(
            MetricSeries::with_window(&ds, 0).unwrap_err(),
            BacktestError::ZeroWindow
        );
    }

    #[test]
    fn shape_check_detects_foreign_dataset() {
        let small = panel(&[1.0, 2.0], &[1.0, 2.0]);
        let large = panel(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        let m = MetricSeries::compute(&small);
        assert!(m.check_shape(&small).is_ok());
        assert!(matches!(
            m.check_shape(&large),
            Err(BacktestError::MetricsMismatch { .. })
        ));
    }
}
