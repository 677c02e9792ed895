//! Parameter grid search.
//!
//! Combinations are enumerated formation → holding → top → bottom, outermost
//! first. Execution may be parallel, but results are always collected in
//! enumeration order and the best combination is picked by a sequential pass
//! afterwards: a later combination replaces the current best only when its
//! cumulative return is strictly greater.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use momentumlab_core::ParameterCombination;

use crate::runner::{run_backtest, BacktestResult, PreparedData, RunError};

/// The four parameter axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParameterGrid {
    pub formation_periods: Vec<u32>,
    pub holding_periods: Vec<u32>,
    pub top_quantiles: Vec<f64>,
    pub bottom_quantiles: Vec<f64>,
}

impl Default for ParameterGrid {
    /// Formation 6–18 months in steps of 3, holding 1–3 months, both
    /// quantiles 0.10–0.15 in steps of 0.01.
    fn default() -> Self {
        let quantiles = vec![0.10, 0.11, 0.12, 0.13, 0.14, 0.15];
        Self {
            formation_periods: vec![6, 9, 12, 15, 18],
            holding_periods: vec![1, 2, 3],
            top_quantiles: quantiles.clone(),
            bottom_quantiles: quantiles,
        }
    }
}

impl ParameterGrid {
    pub fn new(
        formation_periods: Vec<u32>,
        holding_periods: Vec<u32>,
        top_quantiles: Vec<f64>,
        bottom_quantiles: Vec<f64>,
    ) -> Self {
        Self {
            formation_periods,
            holding_periods,
            top_quantiles,
            bottom_quantiles,
        }
    }

    /// A grid with exactly one combination.
    pub fn single(params: ParameterCombination) -> Self {
        Self::new(
            vec![params.formation_period],
            vec![params.holding_period],
            vec![params.top_quantile],
            vec![params.bottom_quantile],
        )
    }

    /// Total number of combinations.
    pub fn size(&self) -> usize {
        self.formation_periods.len()
            * self.holding_periods.len()
            * self.top_quantiles.len()
            * self.bottom_quantiles.len()
    }

    /// Fails on an empty axis or any out-of-range value.
    pub fn validate(&self) -> Result<(), RunError> {
        let axes = [
            ("formation_periods", self.formation_periods.len()),
            ("holding_periods", self.holding_periods.len()),
            ("top_quantiles", self.top_quantiles.len()),
            ("bottom_quantiles", self.bottom_quantiles.len()),
        ];
        if let Some((name, _)) = axes.iter().find(|(_, len)| *len == 0) {
            return Err(RunError::EmptyGridAxis(*name));
        }

        // One combination per axis value is enough to hit every check.
        let first = ParameterCombination::new(
            self.formation_periods[0],
            self.holding_periods[0],
            self.top_quantiles[0],
            self.bottom_quantiles[0],
        );
        for &formation_period in &self.formation_periods {
            ParameterCombination {
                formation_period,
                ..first
            }
            .validate()?;
        }
        for &holding_period in &self.holding_periods {
            ParameterCombination {
                holding_period,
                ..first
            }
            .validate()?;
        }
        for &top_quantile in &self.top_quantiles {
            ParameterCombination {
                top_quantile,
                ..first
            }
            .validate()?;
        }
        for &bottom_quantile in &self.bottom_quantiles {
            ParameterCombination {
                bottom_quantile,
                ..first
            }
            .validate()?;
        }
        Ok(())
    }

    /// Every combination in enumeration order.
    pub fn combinations(&self) -> Vec<ParameterCombination> {
        let mut combos = Vec::with_capacity(self.size());
        for &formation in &self.formation_periods {
            for &holding in &self.holding_periods {
                for &top in &self.top_quantiles {
                    for &bottom in &self.bottom_quantiles {
                        combos.push(ParameterCombination::new(formation, holding, top, bottom));
                    }
                }
            }
        }
        combos
    }
}

/// Progress callback: (completed, total, result just finished).
pub type ProgressFn<'a> = dyn Fn(usize, usize, &BacktestResult) + Send + Sync + 'a;

/// Grid search executor.
///
/// Runs every combination of a grid over one prepared dataset, in parallel
/// by default.
pub struct GridSearch<'a> {
    grid: &'a ParameterGrid,
    parallel: bool,
    time_budget: Option<Duration>,
    progress: Option<Box<ProgressFn<'a>>>,
}

impl<'a> GridSearch<'a> {
    pub fn new(grid: &'a ParameterGrid) -> Self {
        Self {
            grid,
            parallel: true,
            time_budget: None,
            progress: None,
        }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Combinations not yet started when the budget runs out are skipped and
    /// the results are marked truncated.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Invoked once per completed combination, from the worker that ran it.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize, &BacktestResult) + Send + Sync + 'a,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Executes the search.
    ///
    /// The first failing combination aborts the search with its error.
    pub fn run(&self, data: &PreparedData) -> Result<SweepResults, RunError> {
        self.grid.validate()?;
        let combos = self.grid.combinations();
        let total = combos.len();

        info!(
            combinations = total,
            parallel = self.parallel,
            tickers = data.dataset.num_tickers(),
            dates = data.dataset.num_dates(),
            "grid search started"
        );

        let started = Instant::now();
        let completed = AtomicUsize::new(0);
        let evaluate =
            |params: &ParameterCombination| -> Result<Option<BacktestResult>, RunError> {
                if let Some(budget) = self.time_budget {
                    if started.elapsed() >= budget {
                        return Ok(None);
                    }
                }
                let result = run_backtest(data, params)?;
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(progress) = &self.progress {
                    progress(done, total, &result);
                }
                Ok(Some(result))
            };

        let outcomes: Vec<Option<BacktestResult>> = if self.parallel {
            combos
                .par_iter()
                .map(evaluate)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            combos
                .iter()
                .map(evaluate)
                .collect::<Result<Vec<_>, _>>()?
        };

        let truncated = outcomes.iter().any(Option::is_none);
        let results: Vec<BacktestResult> = outcomes.into_iter().flatten().collect();
        if truncated {
            warn!(
                evaluated = results.len(),
                combinations = total,
                "time budget exhausted, grid search truncated"
            );
        }

        let sweep = SweepResults::new(total, results, truncated);
        match sweep.best() {
            Some(best) => info!(
                params = %best.params,
                cumulative_return = best.cumulative_return,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "grid search finished"
            ),
            None => info!("grid search finished without results"),
        }
        Ok(sweep)
    }
}

/// Results from a grid search, in enumeration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResults {
    /// Number of combinations in the grid, evaluated or not.
    pub grid_size: usize,
    results: Vec<BacktestResult>,
    /// Index into `results` of the best combination.
    best: Option<usize>,
    /// True when the time budget cut the search short.
    pub truncated: bool,
}

impl SweepResults {
    fn new(grid_size: usize, results: Vec<BacktestResult>, truncated: bool) -> Self {
        let mut best: Option<usize> = None;
        let mut best_return = f64::NEG_INFINITY;
        for (idx, result) in results.iter().enumerate() {
            if result.cumulative_return > best_return {
                best_return = result.cumulative_return;
                best = Some(idx);
                info!(
                    params = %result.params,
                    cumulative_return = result.cumulative_return,
                    "new best combination"
                );
            }
        }
        Self {
            grid_size,
            results,
            best,
            truncated,
        }
    }

    /// Returns all results as a slice.
    pub fn all(&self) -> &[BacktestResult] {
        &self.results
    }

    /// Returns the number of evaluated combinations.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The combination with the highest cumulative return; the earliest one on ties.
    pub fn best(&self) -> Option<&BacktestResult> {
        self.best.and_then(|idx| self.results.get(idx))
    }

    /// Gets a result by run id.
    pub fn get(&self, run_id: &str) -> Option<&BacktestResult> {
        self.results.iter().find(|r| r.run_id == run_id)
    }

    /// Top `n` results by cumulative return, enumeration order within ties.
    pub fn top_n(&self, n: usize) -> Vec<&BacktestResult> {
        let mut sorted: Vec<_> = self.results.iter().collect();
        sorted.sort_by(|a, b| {
            b.cumulative_return
                .partial_cmp(&a.cumulative_return)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted.truncate(n);
        sorted
    }
}
