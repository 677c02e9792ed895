//! ParameterCombination — one point of the grid search.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BacktestError;

/// Formation/holding periods in months and the long/short quantile fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterCombination {
    pub formation_period: u32,
    pub holding_period: u32,
    pub top_quantile: f64,
    pub bottom_quantile: f64,
}

impl ParameterCombination {
    pub fn new(
        formation_period: u32,
        holding_period: u32,
        top_quantile: f64,
        bottom_quantile: f64,
    ) -> Self {
        Self {
            formation_period,
            holding_period,
            top_quantile,
            bottom_quantile,
        }
    }

    /// Reject combinations that cannot describe a run.
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.formation_period == 0 {
            return Err(BacktestError::NonPositivePeriod {
                name: "formation_period",
            });
        }
        if self.holding_period == 0 {
            return Err(BacktestError::NonPositivePeriod {
                name: "holding_period",
            });
        }
        check_quantile("top_quantile", self.top_quantile)?;
        check_quantile("bottom_quantile", self.bottom_quantile)?;
        Ok(())
    }
}

impl Default for ParameterCombination {
    fn default() -> Self {
        Self::new(12, 1, 0.1, 0.1)
    }
}

impl fmt::Display for ParameterCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "formation={}m holding={}m top={} bottom={}",
            self.formation_period, self.holding_period, self.top_quantile, self.bottom_quantile
        )
    }
}

fn check_quantile(name: &'static str, value: f64) -> Result<(), BacktestError> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(BacktestError::QuantileOutOfRange { name, value })
    }
}
