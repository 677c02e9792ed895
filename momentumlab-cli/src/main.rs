//! MomentumLab CLI — grid search, config template, and synthetic data commands.
//!
//! Commands:
//! - `run`: load prices, search the parameter grid, print the best combination, save artifacts
//! - `template`: print (or write) a default TOML config
//! - `synth`: write a seeded synthetic price panel as long-format CSV

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use momentumlab_runner::{
    export_prices_csv, generate_synthetic, prepare, save_sweep, BacktestConfig, GridSearch,
    PreparedData, SweepResults, SyntheticConfig,
};

#[derive(Parser)]
#[command(
    name = "momentumlab",
    about = "MomentumLab CLI — cross-sectional momentum backtest and grid search"
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the parameter grid and report the best combination.
    Run(RunArgs),
    /// Print a default TOML config.
    Template {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write a seeded synthetic price panel as CSV.
    Synth {
        #[arg(long, default_value_t = 50)]
        tickers: usize,

        #[arg(long, default_value_t = 54)]
        months: usize,

        /// First month (YYYY-MM-DD).
        #[arg(long, default_value = "2020-01-01")]
        start: String,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Fraction of cells left undefined.
        #[arg(long, default_value_t = 0.0)]
        missing_rate: f64,

        /// Output CSV path.
        #[arg(long, default_value = "prices.csv")]
        output: PathBuf,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Long-format price CSV (overrides the config's data source).
    #[arg(long, conflicts_with = "synthetic")]
    prices: Option<PathBuf>,

    /// Use seeded synthetic prices (overrides the config's data source).
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Formation periods in months, comma separated.
    #[arg(long, value_delimiter = ',')]
    formation: Option<Vec<u32>>,

    /// Holding periods in months, comma separated.
    #[arg(long, value_delimiter = ',')]
    holding: Option<Vec<u32>>,

    /// Top quantiles, comma separated.
    #[arg(long, value_delimiter = ',')]
    top: Option<Vec<f64>>,

    /// Bottom quantiles, comma separated.
    #[arg(long, value_delimiter = ',')]
    bottom: Option<Vec<f64>>,

    /// Trailing metrics window.
    #[arg(long)]
    window: Option<usize>,

    /// Output directory for artifacts.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Also save artifacts for every combination.
    #[arg(long, default_value_t = false)]
    per_combination: bool,

    /// Run combinations one at a time.
    #[arg(long, default_value_t = false)]
    sequential: bool,

    /// Stop starting new combinations after this many seconds.
    #[arg(long)]
    time_budget_secs: Option<u64>,

    /// Print the report without writing artifacts.
    #[arg(long, default_value_t = false)]
    no_save: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.verbose { "debug" } else { "info" })?;

    match cli.command {
        Commands::Run(args) => run_cmd(args),
        Commands::Template { output } => template_cmd(output),
        Commands::Synth {
            tickers,
            months,
            start,
            seed,
            missing_rate,
            output,
        } => synth_cmd(tickers, months, &start, seed, missing_rate, output),
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))
}

fn build_config(args: &RunArgs) -> Result<BacktestConfig> {
    let mut config = match &args.config {
        Some(path) => BacktestConfig::from_file(path)?,
        None => BacktestConfig::default(),
    };

    if let Some(prices) = &args.prices {
        config.data.prices = Some(prices.clone());
        config.data.synthetic = None;
    }
    if args.synthetic {
        config.data.prices = None;
        config.data.synthetic.get_or_insert_with(SyntheticConfig::default);
    }
    if let Some(v) = &args.formation {
        config.grid.formation_periods = v.clone();
    }
    if let Some(v) = &args.holding {
        config.grid.holding_periods = v.clone();
    }
    if let Some(v) = &args.top {
        config.grid.top_quantiles = v.clone();
    }
    if let Some(v) = &args.bottom {
        config.grid.bottom_quantiles = v.clone();
    }
    if let Some(window) = args.window {
        config.metrics.window = window;
    }
    if let Some(dir) = &args.output_dir {
        config.output.dir = dir.clone();
    }
    if args.per_combination {
        config.output.per_combination = true;
    }

    Ok(config)
}

fn run_cmd(args: RunArgs) -> Result<()> {
    let config = build_config(&args)?;
    let data = prepare(&config)?;

    let total = config.grid.size();
    let step = (total / 10).max(1);
    let mut search = GridSearch::new(&config.grid)
        .with_parallelism(!args.sequential)
        .with_progress(move |done, total, _| {
            if done % step == 0 || done == total {
                info!(done, total, "combinations evaluated");
            }
        });
    if let Some(secs) = args.time_budget_secs {
        search = search.with_time_budget(Duration::from_secs(secs));
    }

    let results = search.run(&data)?;
    print_report(&results, &data);

    if !args.no_save {
        let out = save_sweep(&results, &config.output.dir, config.output.per_combination)?;
        println!("Artifacts saved to: {}", out.display());
    }

    Ok(())
}

fn template_cmd(output: Option<PathBuf>) -> Result<()> {
    let text = BacktestConfig::template()?;
    match output {
        Some(path) => {
            std::fs::write(&path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Config template written to: {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn synth_cmd(
    tickers: usize,
    months: usize,
    start: &str,
    seed: u64,
    missing_rate: f64,
    output: PathBuf,
) -> Result<()> {
    if tickers == 0 || months == 0 {
        bail!("--tickers and --months must be positive");
    }
    if !(0.0..1.0).contains(&missing_rate) {
        bail!("--missing-rate must be in [0, 1)");
    }
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .with_context(|| format!("invalid --start date '{start}'"))?;

    let dataset = generate_synthetic(&SyntheticConfig {
        tickers,
        months,
        start,
        seed,
        missing_rate,
    })?;
    std::fs::write(&output, export_prices_csv(&dataset)?)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "Wrote {} tickers x {} months to {}",
        dataset.num_tickers(),
        dataset.num_dates(),
        output.display()
    );
    Ok(())
}

fn print_report(results: &SweepResults, data: &PreparedData) {
    println!();
    println!("=== Grid Search Result ===");
    println!(
        "Universe:       {} tickers, {} months",
        data.dataset.num_tickers(),
        data.dataset.num_dates()
    );
    println!("Dataset Hash:   {}", data.dataset_hash);
    println!(
        "Combinations:   {} of {} evaluated",
        results.len(),
        results.grid_size
    );

    match results.best() {
        Some(best) => {
            println!();
            println!("--- Best Parameter Combination ---");
            println!("Formation Period:  {} months", best.params.formation_period);
            println!("Holding Period:    {} months", best.params.holding_period);
            println!("Top Quantile:      {}", best.params.top_quantile);
            println!("Bottom Quantile:   {}", best.params.bottom_quantile);
            println!("Cumulative Return: {:.4}", best.cumulative_return);
            println!(
                "Trades:            {} ({} long, {} short) over {} months",
                best.trade_count,
                best.long_count,
                best.short_count,
                best.months()
            );
            println!("Run Id:            {}", best.run_id);
        }
        None => println!("No combination was evaluated."),
    }

    let top = results.top_n(5);
    if top.len() > 1 {
        println!();
        println!("--- Top {} ---", top.len());
        println!(
            "{:>4} {:>5} {:>6} {:>6} {:>12} {:>7}",
            "form", "hold", "top", "bottom", "cum_return", "trades"
        );
        for r in top {
            println!(
                "{:>4} {:>5} {:>6} {:>6} {:>12.4} {:>7}",
                r.params.formation_period,
                r.params.holding_period,
                r.params.top_quantile,
                r.params.bottom_quantile,
                r.cumulative_return,
                r.trade_count
            );
        }
    }

    if results.truncated {
        println!();
        println!("WARNING: time budget exhausted, grid search truncated");
    }
    if data.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    for ticker in &data.missing_tickers {
        println!("WARNING: no price data for {ticker}, dropped from the universe");
    }
    println!();
}
