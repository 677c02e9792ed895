//! Reporting and export — JSON and CSV artifact generation.
//!
//! - **JSON**: full round-trip serialization of a `BacktestResult` with schema versioning
//! - **CSV**: trade tape (all trades and per ticker), monthly portfolio summary,
//!   grid results, and long-format prices
//!
//! All persisted JSON includes a `schema_version` field. Newer versions are
//! rejected on load. Undefined values are written as empty CSV cells.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use momentumlab_core::{PortfolioSummary, PriceDataset, Trade};

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::sweep::SweepResults;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

const TRADE_COLUMNS: [&str; 17] = [
    "evaluation_date",
    "exit_date",
    "year",
    "month",
    "stock",
    "position",
    "buy",
    "sell",
    "profit",
    "drawdown",
    "upside",
    "forward_return",
    "monthly_return",
    "mean_return",
    "volatility",
    "risk_adjusted_return",
    "winner",
];

fn write_trades<'a, I>(trades: I) -> Result<String>
where
    I: IntoIterator<Item = &'a Trade>,
{
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(TRADE_COLUMNS)?;

    for t in trades {
        wtr.write_record([
            t.evaluation_date.to_string(),
            t.exit_date.to_string(),
            t.year().to_string(),
            t.month().to_string(),
            t.ticker.clone(),
            t.side.position_label().to_string(),
            format!("{:.6}", t.buy_price()),
            format!("{:.6}", t.sell_price()),
            format!("{:.6}", t.profit),
            format!("{:.6}", t.drawdown),
            format!("{:.6}", t.upside),
            format!("{:.6}", t.forward_return),
            opt(t.metrics.monthly_return),
            opt(t.metrics.mean_return),
            opt(t.metrics.volatility),
            opt(t.metrics.risk_adjusted),
            t.is_winner().to_string(),
        ])?;
    }

    finish(wtr)
}

/// Export every trade of a ledger as CSV, in ledger order.
///
/// Columns: evaluation_date, exit_date, year, month, stock, position (buy/sell),
/// buy, sell, profit, drawdown, upside, forward_return, monthly_return,
/// mean_return, volatility, risk_adjusted_return, winner
pub fn export_trades_csv(result: &BacktestResult) -> Result<String> {
    write_trades(&result.trades)
}

/// Export only `ticker`'s trades, same columns as `export_trades_csv`.
pub fn export_ticker_trades_csv(result: &BacktestResult, ticker: &str) -> Result<String> {
    write_trades(result.trades.for_ticker(ticker))
}

/// Export the monthly portfolio summary.
///
/// Columns: year, month, portfolio_return, trade_count, then one weight column
/// per ticker (sorted). Undefined weights are empty cells.
pub fn export_portfolio_csv(summary: &PortfolioSummary) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec![
        "year".to_string(),
        "month".to_string(),
        "portfolio_return".to_string(),
        "trade_count".to_string(),
    ];
    header.extend(summary.tickers.iter().cloned());
    wtr.write_record(&header)?;

    for row in &summary.months {
        let mut record = vec![
            row.year.to_string(),
            row.month.to_string(),
            format!("{:.6}", row.portfolio_return),
            row.trade_count.to_string(),
        ];
        record.extend(summary.tickers.iter().map(|t| opt(row.weight(t))));
        wtr.write_record(&record)?;
    }

    finish(wtr)
}

/// One row per evaluated combination, in enumeration order.
pub fn export_grid_csv(results: &SweepResults) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "run_id",
        "formation_period",
        "holding_period",
        "top_quantile",
        "bottom_quantile",
        "cumulative_return",
        "trade_count",
        "long_count",
        "short_count",
        "months",
        "best",
    ])?;

    let best_id = results.best().map(|b| b.run_id.as_str());
    for r in results.all() {
        wtr.write_record([
            r.run_id.clone(),
            r.params.formation_period.to_string(),
            r.params.holding_period.to_string(),
            r.params.top_quantile.to_string(),
            r.params.bottom_quantile.to_string(),
            format!("{:.6}", r.cumulative_return),
            r.trade_count.to_string(),
            r.long_count.to_string(),
            r.short_count.to_string(),
            r.months().to_string(),
            (Some(r.run_id.as_str()) == best_id).to_string(),
        ])?;
    }

    finish(wtr)
}

/// Long-format `date,ticker,open,close` rows, readable by the data loader.
pub fn export_prices_csv(dataset: &PriceDataset) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "ticker", "open", "close"])?;
    for (d, date) in dataset.dates().iter().enumerate() {
        for t in 0..dataset.num_tickers() {
            if dataset.open(t, d).is_none() && dataset.close(t, d).is_none() {
                continue;
            }
            wtr.write_record([
                date.to_string(),
                dataset.ticker(t).to_string(),
                dataset.open(t, d).map(|v| v.to_string()).unwrap_or_default(),
                dataset.close(t, d).map(|v| v.to_string()).unwrap_or_default(),
            ])?;
        }
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Directory name for one combination: parameters plus a run id prefix.
pub fn artifact_dirname(result: &BacktestResult) -> String {
    let p = &result.params;
    format!(
        "f{}_h{}_t{}_b{}_{}",
        p.formation_period,
        p.holding_period,
        p.top_quantile,
        p.bottom_quantile,
        result.run_id.chars().take(12).collect::<String>()
    )
}

fn file_safe(ticker: &str) -> String {
    ticker
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Save the full artifact set for one combination.
///
/// Creates `{artifact_dirname}/` under `output_dir` containing:
/// - `manifest.json`: the full `BacktestResult`
/// - `trades.csv`: every trade
/// - `portfolio.csv`: monthly summary with weight columns
/// - `tickers/{ticker}.csv`: each ticker's trades
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(artifact_dirname(result));
    let ticker_dir = run_dir.join("tickers");
    std::fs::create_dir_all(&ticker_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(result)?)?;
    std::fs::write(
        run_dir.join("portfolio.csv"),
        export_portfolio_csv(&result.summary)?,
    )?;

    for ticker in result.trades.tickers() {
        let path = ticker_dir.join(format!("{}.csv", file_safe(ticker)));
        std::fs::write(&path, export_ticker_trades_csv(result, ticker)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(run_dir)
}

/// Save the outcome of a grid search under `output_dir`.
///
/// Always writes `grid.csv` and the best combination's artifacts under
/// `best/`. With `per_combination`, every evaluated combination also gets its
/// own artifact directory under `combinations/`.
pub fn save_sweep(
    results: &SweepResults,
    output_dir: &Path,
    per_combination: bool,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    std::fs::write(output_dir.join("grid.csv"), export_grid_csv(results)?)?;

    if let Some(best) = results.best() {
        save_artifacts(best, &output_dir.join("best"))?;
    }
    if per_combination {
        let dir = output_dir.join("combinations");
        for result in results.all() {
            save_artifacts(result, &dir)?;
        }
    }

    Ok(output_dir.to_path_buf())
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}
