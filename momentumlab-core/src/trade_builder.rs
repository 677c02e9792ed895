//! Trade construction for one candidate over one holding period.
//!
//! Entry is the open at the evaluation date, exit the close `holding_period`
//! calendar months later. Excursions are measured on opens from entry to
//! exit inclusive. For a long, drawdown is the lowest open and upside the
//! highest; a short mirrors both.

use crate::domain::{shift_months, PriceDataset, Side, Trade};
use crate::metrics::MetricSeries;
use crate::ranking::ForwardReturns;

/// Everything a trade needs to read, borrowed for the duration of a run.
#[derive(Debug, Clone, Copy)]
pub struct TradeContext<'a> {
    pub dataset: &'a PriceDataset,
    pub metrics: &'a MetricSeries,
    pub forward: &'a ForwardReturns,
}

/// Build the trade for `ticker` entered at evaluation index `end`.
///
/// Returns `None` when `end` or the exit date is not on the date axis, the
/// exit close is undefined, or the entry open is undefined or zero. Those
/// candidates are skipped, not reported.
///
/// # Panics
///
/// If `ticker` is out of range, or `ctx.forward` / `ctx.metrics` were computed
/// from a different dataset than `ctx.dataset`.
pub fn build_trade(
    ctx: &TradeContext<'_>,
    end: usize,
    ticker: usize,
    side: Side,
    holding_period: u32,
) -> Option<Trade> {
    let dataset = ctx.dataset;
    let evaluation_date = *dataset.dates().get(end)?;
    let exit_date = shift_months(evaluation_date, i64::from(holding_period))?;
    let exit = dataset.date_index(exit_date)?;

    let entry_price = dataset.open(ticker, end).filter(|p| *p != 0.0)?;
    let exit_price = dataset.close(ticker, exit)?;

    let (low, high) = dataset.opens(ticker)[end..=exit]
        .iter()
        .flatten()
        .fold((entry_price, entry_price), |(lo, hi), &p| (lo.min(p), hi.max(p)));

    let (profit, drawdown, upside) = match side {
        Side::Long => (
            (exit_price - entry_price) / entry_price,
            (low - entry_price) / entry_price,
            (high - entry_price) / entry_price,
        ),
        Side::Short => (
            (entry_price - exit_price) / entry_price,
            (high - entry_price) / entry_price,
            (low - entry_price) / entry_price,
        ),
    };

    Some(Trade {
        evaluation_date,
        exit_date,
        ticker: dataset.ticker(ticker).to_string(),
        side,
        entry_price,
        exit_price,
        profit,
        drawdown,
        upside,
        forward_return: ctx.forward.get(ticker, exit),
        metrics: ctx.metrics.snapshot(ticker, exit),
    })
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

    fn panel(opens: Vec<Option<f64>>, closes: Vec<Option<f64>>) -> PriceDataset {
        let base = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let dates = (0..opens.len())
            .map(|i| base.checked_add_months(chrono::Months::new(i as u32)).unwrap())
            .collect();
        PriceDataset::new(dates, vec!["AAA".into()], vec![opens], vec![closes]).unwrap()
    }

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|v| Some(*v)).collect()
    }

    fn build(ds: &PriceDataset, end: usize, side: Side, hold: u32) -> Option<Trade> {
        let metrics = MetricSeries::compute(ds);
        let forward = ForwardReturns::compute(ds, 1);
        let ctx = TradeContext {
            dataset: ds,
            metrics: &metrics,
            forward: &forward,
        };
        build_trade(&ctx, end, 0, side, hold)
    }

    #[test]
    fn long_trade_profit_drawdown_upside() {
        let ds = panel(
            some(&[100.0, 90.0, 120.0, 110.0]),
            some(&[95.0, 115.0, 118.0, 130.0]),
        );
        let t = build(&ds, 0, Side::Long, 2).unwrap();

        assert_eq!(t.entry_price, 100.0);
        assert_eq!(t.exit_price, 118.0);
        assert_eq!(t.exit_date, NaiveDate::from_ymd_opt(2021, 3, 1).unwrap());
        assert_approx(t.profit, 0.18);
        assert_approx(t.drawdown, -0.10);
        assert_approx(t.upside, 0.20);
    }

    #[test]
    fn short_trade_mirrors_excursions() {
        let ds = panel(
            some(&[100.0, 90.0, 120.0, 110.0]),
            some(&[95.0, 115.0, 80.0, 130.0]),
        );
        let t = build(&ds, 0, Side::Short, 2).unwrap();

        assert_eq!(t.sell_price(), 100.0);
        assert_eq!(t.buy_price(), 80.0);
        assert_approx(t.profit, 0.20);
        assert_approx(t.drawdown, 0.20);
        assert_approx(t.upside, -0.10);
    }

    #[test]
    fn exit_beyond_dataset_is_skipped() {
        let ds = panel(some(&[100.0, 101.0, 102.0]), some(&[100.0, 101.0, 102.0]));
        assert!(build(&ds, 1, Side::Long, 2).is_none());
        assert!(build(&ds, 1, Side::Long, 1).is_some());
    }

    #[test]
    fn evaluation_index_past_the_axis_is_skipped() {
        let ds = panel(some(&[100.0, 101.0, 102.0]), some(&[100.0, 101.0, 102.0]));
        assert!(build(&ds, 3, Side::Long, 1).is_none());
        assert!(build(&ds, usize::MAX, Side::Short, 1).is_none());
    }

    #[test]
    fn exit_date_missing_from_axis_is_skipped() {
        // Quarterly axis: one month ahead never lands on a listed date.
        let dates = vec![
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 4, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 7, 1).unwrap(),
        ];
        let ds = PriceDataset::new(
            dates,
            vec!["AAA".into()],
            vec![some(&[1.0, 2.0, 3.0])],
            vec![some(&[1.0, 2.0, 3.0])],
        )
        .unwrap();
        assert!(build(&ds, 0, Side::Long, 1).is_none());
        assert!(build(&ds, 0, Side::Long, 3).is_some());
    }

    #[test]
    fn undefined_exit_close_or_entry_open_is_skipped() {
        let ds = panel(some(&[100.0, 101.0, 102.0]), vec![Some(100.0), None, Some(102.0)]);
        assert!(build(&ds, 0, Side::Long, 1).is_none());
        assert!(build(&ds, 0, Side::Short, 1).is_none());

        let ds = panel(vec![None, Some(101.0), Some(102.0)], some(&[100.0, 101.0, 102.0]));
        assert!(build(&ds, 0, Side::Long, 1).is_none());
    }

    #[test]
    fn undefined_opens_inside_window_are_ignored() {
        let ds = panel(
            vec![Some(100.0), None, Some(104.0)],
            some(&[100.0, 100.0, 103.0]),
        );
        let t = build(&ds, 0, Side::Long, 2).unwrap();
        assert_approx(t.drawdown, 0.0);
        assert_approx(t.upside, 0.04);
    }

    #[test]
    fn snapshot_reads_exit_date() {
        let ds = panel(some(&[100.0, 110.0, 120.0]), some(&[105.0, 112.0, 125.0]));
        let t = build(&ds, 0, Side::Long, 2).unwrap();
        assert_approx(t.metrics.monthly_return.unwrap(), (125.0 - 110.0) / 110.0);
        // not enough history for a 12-month window
        assert_eq!(t.metrics.mean_return, None);
        assert_eq!(t.metrics.risk_adjusted, None);
        // last date has no forward row: filled policy gives 0
        assert_eq!(t.forward_return, 0.0);
    }
}
