//! Univariate time-series forecasting with confidence bands.
//!
//! Fits Holt linear-trend exponential smoothing (optionally additive
//! Holt-Winters when a seasonal period is configured) by grid search over
//! the smoothing weights, then projects the requested horizon with bands
//! that widen as sqrt(step) from the in-sample residual variance.

use crate::errors::{validate_positive_count, validate_probability, AnalyticsError, AnalyticsResult};
use crate::series::SampleSeries;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// One forecast step.
///
/// Invariant: `lower <= point <= upper`, enforced at construction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForecastPoint {
    /// Point forecast
    pub point: f64,
    /// Lower confidence bound
    pub lower: f64,
    /// Upper confidence bound
    pub upper: f64,
}

/// The smoothing model a forecast used, with its fitted weights.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FittedModel {
    /// Holt linear trend
    HoltLinear {
        /// Level smoothing weight
        alpha: f64,
        /// Trend smoothing weight
        beta: f64,
    },
    /// Additive Holt-Winters
    HoltWinters {
        /// Level smoothing weight
        alpha: f64,
        /// Trend smoothing weight
        beta: f64,
        /// Seasonal smoothing weight
        gamma: f64,
        /// Seasonal period in observations
        period: usize,
    },
}

/// A projected series with confidence bands.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForecastSeries {
    /// Label of the anchor series, when present
    pub anchor_label: Option<String>,
    /// Number of projected steps
    pub horizon: usize,
    /// Confidence level the bands cover
    pub confidence: f64,
    /// Ordered forecast steps
    pub points: Vec<ForecastPoint>,
    /// In-sample one-step-ahead residual standard deviation
    pub residual_std: f64,
    /// The fitted model and weights
    pub model: FittedModel,
}

/// Fits a smoothing model and projects future points.
#[derive(Debug, Clone)]
pub struct TimeSeriesForecaster {
    history_multiple: usize,
    seasonal_period: Option<usize>,
}

impl Default for TimeSeriesForecaster {
    fn default() -> Self {
        Self {
            history_multiple: 3,
            seasonal_period: None,
        }
    }
}

/// Grid searched for the smoothing weights.
const WEIGHT_GRID: [f64; 19] = [
    0.05, 0.10, 0.15, 0.20, 0.25, 0.30, 0.35, 0.40, 0.45, 0.50, 0.55, 0.60, 0.65, 0.70, 0.75,
    0.80, 0.85, 0.90, 0.95,
];

/// Coarser grid for the seasonal weight, to bound the seasonal search.
const SEASONAL_GRID: [f64; 7] = [0.05, 0.20, 0.35, 0.50, 0.65, 0.80, 0.95];

impl TimeSeriesForecaster {
    /// Forecaster requiring `history_multiple` times the horizon as
    /// history.
    pub fn new(history_multiple: usize) -> Self {
        Self {
            history_multiple: history_multiple.max(1),
            seasonal_period: None,
        }
    }

    /// Enable an additive seasonal component with the given period.
    pub fn with_seasonal_period(mut self, period: usize) -> Self {
        self.seasonal_period = Some(period);
        self
    }

    /// Project `horizon` future points at the given confidence level.
    ///
    /// Fails with [`AnalyticsError::InsufficientHistory`] when the
    /// history is shorter than the configured multiple of the horizon,
    /// or shorter than two seasonal periods when seasonality is enabled.
    pub fn forecast(
        &self,
        series: &SampleSeries,
        horizon: usize,
        confidence: f64,
    ) -> AnalyticsResult<ForecastSeries> {
        validate_positive_count(horizon, "horizon")?;
        validate_probability(confidence, "confidence")?;
        if let Some(period) = self.seasonal_period {
            if period < 2 {
                return Err(AnalyticsError::InvalidParameter {
                    parameter: "seasonal_period".to_string(),
                    value: period as f64,
                    constraint: "at least 2".to_string(),
                });
            }
        }

        let values = series.values();
        let n = values.len();
        let mut required = (self.history_multiple * horizon).max(4);
        if let Some(period) = self.seasonal_period {
            required = required.max(2 * period).max(8);
        }
        if n < required {
            return Err(AnalyticsError::InsufficientHistory {
                required,
                actual: n,
                horizon,
            });
        }

        let (state, model, residual_std) = match self.seasonal_period {
            Some(period) => self.fit_holt_winters(values, period)?,
            None => self.fit_holt(values)?,
        };

        let z = band_quantile(confidence)?;
        let points = (1..=horizon)
            .map(|h| {
                let point = state.project(h);
                let width = z * residual_std * (h as f64).sqrt();
                ForecastPoint {
                    point,
                    lower: point - width,
                    upper: point + width,
                }
            })
            .collect();

        Ok(ForecastSeries {
            anchor_label: series.label().map(str::to_string),
            horizon,
            confidence,
            points,
            residual_std,
            model,
        })
    }

    fn fit_holt(&self, values: &[f64]) -> AnalyticsResult<(SmoothingState, FittedModel, f64)> {
        let mut best: Option<(f64, f64, f64, SmoothingState)> = None;
        for &alpha in &WEIGHT_GRID {
            for &beta in &WEIGHT_GRID {
                let (sse, state) = holt_pass(values, alpha, beta);
                if !sse.is_finite() {
                    continue;
                }
                if best.as_ref().map_or(true, |(b, _, _, _)| sse < *b) {
                    best = Some((sse, alpha, beta, state));
                }
            }
        }

        // Regularization fallback: fixed conservative weights before
        // surfacing as fatal
        let (sse, alpha, beta, state) = match best {
            Some(found) => found,
            None => {
                log::warn!("holt grid search diverged, retrying with fixed weights");
                let (sse, state) = holt_pass(values, 0.5, 0.1);
                if !sse.is_finite() {
                    return Err(AnalyticsError::NumericalInstability {
                        operation: "holt_fit".to_string(),
                        reason: format!(
                            "non-finite SSE even at fallback weights (n = {})",
                            values.len()
                        ),
                    });
                }
                (sse, 0.5, 0.1, state)
            }
        };

        let residual_count = (values.len() - 1) as f64;
        let dof = (residual_count - 2.0).max(1.0);
        Ok((
            state,
            FittedModel::HoltLinear { alpha, beta },
            (sse / dof).sqrt(),
        ))
    }

    fn fit_holt_winters(
        &self,
        values: &[f64],
        period: usize,
    ) -> AnalyticsResult<(SmoothingState, FittedModel, f64)> {
        let mut best: Option<(f64, f64, f64, f64, SmoothingState)> = None;
        for &alpha in &WEIGHT_GRID {
            for &beta in &WEIGHT_GRID {
                for &gamma in &SEASONAL_GRID {
                    let (sse, state) = holt_winters_pass(values, period, alpha, beta, gamma);
                    if !sse.is_finite() {
                        continue;
                    }
                    if best.as_ref().map_or(true, |(b, _, _, _, _)| sse < *b) {
                        best = Some((sse, alpha, beta, gamma, state));
                    }
                }
            }
        }

        let (sse, alpha, beta, gamma, state) =
            best.ok_or_else(|| AnalyticsError::NumericalInstability {
                operation: "holt_winters_fit".to_string(),
                reason: format!(
                    "non-finite SSE across the full weight grid (n = {}, period = {})",
                    values.len(),
                    period
                ),
            })?;

        let residual_count = (values.len() - period) as f64;
        let dof = (residual_count - 3.0).max(1.0);
        Ok((
            state,
            FittedModel::HoltWinters {
                alpha,
                beta,
                gamma,
                period,
            },
            (sse / dof).sqrt(),
        ))
    }
}

/// Terminal smoothing state used to project forward.
#[derive(Debug, Clone)]
struct SmoothingState {
    level: f64,
    trend: f64,
    seasonals: Option<(Vec<f64>, usize)>, // (indices, next offset base)
}

impl SmoothingState {
    fn project(&self, h: usize) -> f64 {
        let base = self.level + h as f64 * self.trend;
        match &self.seasonals {
            Some((seasonal, n)) => {
                let period = seasonal.len();
                base + seasonal[(n + h - 1) % period]
            }
            None => base,
        }
    }
}

/// One Holt pass: returns the one-step-ahead SSE and the terminal state.
fn holt_pass(values: &[f64], alpha: f64, beta: f64) -> (f64, SmoothingState) {
    let mut level = values[0];
    let mut trend = values[1] - values[0];
    let mut sse = 0.0;
    for &x in &values[1..] {
        let forecast = level + trend;
        let error = x - forecast;
        sse += error * error;
        let new_level = alpha * x + (1.0 - alpha) * (level + trend);
        trend = beta * (new_level - level) + (1.0 - beta) * trend;
        level = new_level;
    }
    (
        sse,
        SmoothingState {
            level,
            trend,
            seasonals: None,
        },
    )
}

/// One additive Holt-Winters pass.
fn holt_winters_pass(
    values: &[f64],
    period: usize,
    alpha: f64,
    beta: f64,
    gamma: f64,
) -> (f64, SmoothingState) {
    let n = values.len();
    let first_cycle_mean = values[..period].iter().sum::<f64>() / period as f64;
    let second_cycle_mean = values[period..2 * period].iter().sum::<f64>() / period as f64;

    let mut level = first_cycle_mean;
    let mut trend = (second_cycle_mean - first_cycle_mean) / period as f64;
    let mut seasonal: Vec<f64> = values[..period].iter().map(|&x| x - level).collect();

    let mut sse = 0.0;
    for t in period..n {
        let s = seasonal[t % period];
        let forecast = level + trend + s;
        let error = values[t] - forecast;
        sse += error * error;

        let new_level = alpha * (values[t] - s) + (1.0 - alpha) * (level + trend);
        let new_trend = beta * (new_level - level) + (1.0 - beta) * trend;
        seasonal[t % period] = gamma * (values[t] - new_level) + (1.0 - gamma) * s;
        level = new_level;
        trend = new_trend;
    }

    (
        sse,
        SmoothingState {
            level,
            trend,
            seasonals: Some((seasonal, n)),
        },
    )
}

/// Two-sided band quantile for the given coverage.
fn band_quantile(confidence: f64) -> AnalyticsResult<f64> {
    let normal = Normal::new(0.0, 1.0).map_err(|_| AnalyticsError::NumericalInstability {
        operation: "band_quantile".to_string(),
        reason: "standard normal construction failed".to_string(),
    })?;
    Ok(normal.inverse_cdf(0.5 + confidence / 2.0))
}
