//! Risk metrics: VaR, Expected Shortfall, drawdown, and risk-adjusted ratios.
//!
//! Loss convention: returns are signed (more negative = worse); VaR and
//! Expected Shortfall are reported as positive loss magnitudes. ES is the
//! mean of the tail at or below the VaR percentile, never just the
//! boundary value, so ES >= VaR holds by construction.
//!
//! Sharpe and Sortino are computed per-period and annualized once by
//! sqrt(periods per year), so numerator and denominator always share the
//! same periodicity.

use crate::errors::{validate_probability, AnalyticsError, AnalyticsResult};
use crate::math::{self, MIN_VARIANCE};
use crate::montecarlo::SimulationRun;
use crate::series::SampleSeries;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters for risk metric computation, recorded in every result for
/// traceability.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RiskConfig {
    /// Confidence levels for VaR and Expected Shortfall
    pub confidence_levels: Vec<f64>,
    /// Annualization factor for Sharpe and Sortino
    pub periods_per_year: f64,
    /// Per-period risk-free rate for excess returns
    pub risk_free_rate: f64,
    /// Per-period minimum acceptable return for downside deviation
    pub target_return: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            confidence_levels: vec![0.95, 0.99],
            periods_per_year: 252.0,
            risk_free_rate: 0.0,
            target_return: 0.0,
        }
    }
}

impl RiskConfig {
    /// Validate levels and the annualization factor.
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.confidence_levels.is_empty() {
            return Err(AnalyticsError::InvalidParameter {
                parameter: "confidence_levels".to_string(),
                value: 0.0,
                constraint: "at least one level".to_string(),
            });
        }
        for &level in &self.confidence_levels {
            validate_probability(level, "confidence_level")?;
        }
        if !self.periods_per_year.is_finite() || self.periods_per_year <= 0.0 {
            return Err(AnalyticsError::InvalidParameter {
                parameter: "periods_per_year".to_string(),
                value: self.periods_per_year,
                constraint: "finite and positive".to_string(),
            });
        }
        crate::errors::validate_parameter(self.risk_free_rate, -1.0, 1.0, "risk_free_rate")?;
        crate::errors::validate_parameter(self.target_return, -1.0, 1.0, "target_return")?;
        Ok(())
    }
}

/// Where the return series came from, for reproducibility of the metrics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ReturnSource {
    /// Observed historical returns
    Historical {
        /// Source series label, when present
        label: Option<String>,
        /// Number of observations
        observations: usize,
    },
    /// Terminal returns of a Monte Carlo run
    Simulated {
        /// Seed the run used
        seed: u64,
        /// Number of simulated paths
        path_count: usize,
    },
}

/// Computed risk metrics with their inputs recorded.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RiskMetricSet {
    /// Provenance of the return series
    pub source: ReturnSource,
    /// Parameters the computation used
    pub config: RiskConfig,
    /// (confidence level, VaR magnitude) per requested level
    pub var: Vec<(f64, f64)>,
    /// (confidence level, Expected Shortfall magnitude) per level
    pub expected_shortfall: Vec<(f64, f64)>,
    /// Largest peak-to-trough decline of the cumulative return path
    pub max_drawdown: f64,
    /// Annualized Sharpe ratio; `None` when volatility is zero
    pub sharpe: Option<f64>,
    /// Annualized Sortino ratio; `None` when downside deviation is zero
    pub sortino: Option<f64>,
    /// Beta against the benchmark; `None` without a benchmark or when
    /// the benchmark is degenerate
    pub beta: Option<f64>,
}

/// Computes risk metrics from historical or simulated returns.
#[derive(Debug, Clone, Default)]
pub struct RiskMetricsCalculator {
    config: RiskConfig,
}

impl RiskMetricsCalculator {
    /// Calculator with validated parameters.
    pub fn new(config: RiskConfig) -> AnalyticsResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Metrics from a historical return series.
    pub fn from_series(&self, returns: &SampleSeries) -> AnalyticsResult<RiskMetricSet> {
        self.compute(
            returns.values(),
            None,
            ReturnSource::Historical {
                label: returns.label().map(str::to_string),
                observations: returns.len(),
            },
        )
    }

    /// Metrics from a historical return series with a benchmark for beta.
    pub fn from_series_with_benchmark(
        &self,
        returns: &SampleSeries,
        benchmark: &SampleSeries,
    ) -> AnalyticsResult<RiskMetricSet> {
        if returns.len() != benchmark.len() {
            return Err(AnalyticsError::DimensionMismatch {
                left: returns.len(),
                right: benchmark.len(),
            });
        }
        self.compute(
            returns.values(),
            Some(benchmark.values()),
            ReturnSource::Historical {
                label: returns.label().map(str::to_string),
                observations: returns.len(),
            },
        )
    }

    /// Metrics from the terminal returns of a simulation run.
    pub fn from_simulation(&self, run: &SimulationRun) -> AnalyticsResult<RiskMetricSet> {
        self.compute(
            &run.terminal_returns,
            None,
            ReturnSource::Simulated {
                seed: run.config.seed,
                path_count: run.config.path_count,
            },
        )
    }

    fn compute(
        &self,
        returns: &[f64],
        benchmark: Option<&[f64]>,
        source: ReturnSource,
    ) -> AnalyticsResult<RiskMetricSet> {
        crate::errors::validate_data_length(returns, 2, "risk metrics")?;
        crate::errors::validate_all_finite(returns, "returns")?;

        let sorted = math::sorted_copy(returns);
        let mut var = Vec::with_capacity(self.config.confidence_levels.len());
        let mut expected_shortfall = Vec::with_capacity(self.config.confidence_levels.len());
        for &level in &self.config.confidence_levels {
            let (v, es) = tail_risk(&sorted, level);
            var.push((level, v));
            expected_shortfall.push((level, es));
        }

        Ok(RiskMetricSet {
            source,
            config: self.config.clone(),
            var,
            expected_shortfall,
            max_drawdown: max_drawdown(returns),
            sharpe: self.sharpe(returns),
            sortino: self.sortino(returns),
            beta: benchmark.and_then(|b| beta(returns, b)),
        })
    }

    fn sharpe(&self, returns: &[f64]) -> Option<f64> {
        let std_dev = math::sample_std_dev(returns);
        if std_dev * std_dev < MIN_VARIANCE {
            return None;
        }
        let mean_excess = math::mean(returns) - self.config.risk_free_rate;
        Some(mean_excess / std_dev * self.config.periods_per_year.sqrt())
    }

    fn sortino(&self, returns: &[f64]) -> Option<f64> {
        // Downside deviation over sub-target returns, full-sample denominator
        let downside_sq = returns
            .iter()
            .map(|&r| (r - self.config.target_return).min(0.0).powi(2))
            .sum::<f64>()
            / returns.len() as f64;
        if downside_sq < MIN_VARIANCE {
            return None;
        }
        let mean_excess = math::mean(returns) - self.config.risk_free_rate;
        Some(mean_excess / downside_sq.sqrt() * self.config.periods_per_year.sqrt())
    }
}

/// VaR and Expected Shortfall at one confidence level, as positive loss
/// magnitudes.
///
/// VaR is the (1 - level) lower percentile; ES averages every return at
/// or below that percentile value, so it bounds VaR from above.
fn tail_risk(sorted_returns: &[f64], level: f64) -> (f64, f64) {
    let quantile = math::percentile_of_sorted(sorted_returns, 1.0 - level);
    let var = (-quantile).max(0.0);

    // Sorted input: the tail is the leading run of values <= quantile
    let tail_end = sorted_returns.partition_point(|&r| r <= quantile);
    let tail = &sorted_returns[..tail_end.max(1)];
    let es = (-math::mean(tail)).max(0.0);

    (var, es.max(var))
}

/// Largest peak-to-trough decline of the compounded cumulative path.
fn max_drawdown(returns: &[f64]) -> f64 {
    let mut wealth = 1.0f64;
    let mut peak = 1.0f64;
    let mut max_dd = 0.0f64;
    for &r in returns {
        wealth *= 1.0 + r;
        if wealth > peak {
            peak = wealth;
        }
        let dd = (peak - wealth) / peak;
        if dd > max_dd {
            max_dd = dd;
        }
    }
    max_dd
}

/// Beta of `returns` against `benchmark`; `None` when the benchmark has
/// no variance.
fn beta(returns: &[f64], benchmark: &[f64]) -> Option<f64> {
    let benchmark_var = math::sample_variance(benchmark);
    if benchmark_var < MIN_VARIANCE {
        return None;
    }
    Some(math::sample_covariance(returns, benchmark) / benchmark_var)
}
