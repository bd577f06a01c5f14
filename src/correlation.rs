//! Pairwise correlation and linear trend estimation.
//!
//! Pearson's r plus an ordinary-least-squares trend line, with a single
//! ridge-stabilized retry when the design is near-singular. Display
//! subsampling only ever thins the returned scatter; the statistics are
//! always computed from the full sample.

use crate::errors::{AnalyticsError, AnalyticsResult};
use crate::math::{self, MIN_VARIANCE};
use crate::series::SampleSeries;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Ridge penalty applied on the stabilized retry, relative to Sxx.
const RIDGE_FACTOR: f64 = 1e-8;

/// Result of correlating two series.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CorrelationResult {
    /// Label of the first series
    pub x_label: Option<String>,
    /// Label of the second series
    pub y_label: Option<String>,
    /// Sample size the statistics were computed from
    pub sample_size: usize,
    /// Pearson correlation coefficient in [-1, 1]
    pub coefficient: f64,
    /// OLS regression slope
    pub slope: f64,
    /// OLS regression intercept
    pub intercept: f64,
    /// Coefficient of determination
    pub r_squared: f64,
    /// Scatter points for display; may be subsampled, never feeds the
    /// statistics above
    pub scatter: Vec<(f64, f64)>,
    /// True when the ridge-stabilized retry produced the trend line
    pub stabilized: bool,
}

/// Computes pairwise correlation and a linear trend between two series.
#[derive(Debug, Clone, Default)]
pub struct CorrelationEngine {
    max_scatter_points: Option<usize>,
}

impl CorrelationEngine {
    /// Engine returning the full scatter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the returned scatter at `max_points` via deterministic
    /// striding. Statistics remain full-sample.
    pub fn with_max_scatter_points(max_points: usize) -> Self {
        Self {
            max_scatter_points: Some(max_points.max(2)),
        }
    }

    /// Correlate two equal-length series.
    ///
    /// Fails with [`AnalyticsError::DimensionMismatch`] on length
    /// differences and [`AnalyticsError::UndefinedStatistic`] when either
    /// series has zero variance (the caller may substitute null).
    pub fn correlate(
        &self,
        x: &SampleSeries,
        y: &SampleSeries,
    ) -> AnalyticsResult<CorrelationResult> {
        let xv = x.values();
        let yv = y.values();

        if xv.len() != yv.len() {
            return Err(AnalyticsError::DimensionMismatch {
                left: xv.len(),
                right: yv.len(),
            });
        }
        if xv.len() < 2 {
            return Err(AnalyticsError::InsufficientData {
                required: 2,
                actual: xv.len(),
            });
        }

        let var_x = math::sample_variance(xv);
        let var_y = math::sample_variance(yv);
        if var_x < MIN_VARIANCE {
            return Err(AnalyticsError::UndefinedStatistic {
                statistic: "pearson correlation".to_string(),
                reason: format!("zero variance in series {:?}", x.label().unwrap_or("x")),
            });
        }
        if var_y < MIN_VARIANCE {
            return Err(AnalyticsError::UndefinedStatistic {
                statistic: "pearson correlation".to_string(),
                reason: format!("zero variance in series {:?}", y.label().unwrap_or("y")),
            });
        }

        let cov = math::sample_covariance(xv, yv);
        // Clamp against floating point drift; |r| cannot exceed 1
        let coefficient = (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0);

        let (slope, intercept, residuals, stabilized) = match math::ols_regression(xv, yv) {
            Ok(fit) => (fit.slope, fit.intercept, fit.residuals, false),
            Err(AnalyticsError::NumericalInstability { .. }) => {
                // One regularized retry before surfacing as fatal
                log::warn!(
                    "near-singular regression for ({:?}, {:?}), retrying with ridge penalty",
                    x.label(),
                    y.label()
                );
                self.ridge_fallback(xv, yv)?
            }
            Err(e) => return Err(e),
        };

        let tss: f64 = var_y * (yv.len() as f64 - 1.0);
        let rss: f64 = residuals.iter().map(|r| r * r).sum();
        let r_squared = if tss > 0.0 {
            (1.0 - rss / tss).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Ok(CorrelationResult {
            x_label: x.label().map(str::to_string),
            y_label: y.label().map(str::to_string),
            sample_size: xv.len(),
            coefficient,
            slope,
            intercept,
            r_squared,
            scatter: self.subsample_scatter(xv, yv),
            stabilized,
        })
    }

    /// Ridge-stabilized slope: Sxy / (Sxx + lambda) with lambda scaled to
    /// the problem. Used once as a fallback, per the retry policy.
    fn ridge_fallback(
        &self,
        xv: &[f64],
        yv: &[f64],
    ) -> AnalyticsResult<(f64, f64, Vec<f64>, bool)> {
        let n = xv.len() as f64;
        let mean_x = math::mean(xv);
        let mean_y = math::mean(yv);
        let sxy: f64 = xv
            .iter()
            .zip(yv)
            .map(|(xi, yi)| (xi - mean_x) * (yi - mean_y))
            .sum();
        let sxx: f64 = xv.iter().map(|xi| (xi - mean_x).powi(2)).sum();

        let lambda = RIDGE_FACTOR * sxx.max(n * MIN_VARIANCE);
        let denominator = sxx + lambda;
        if denominator <= 0.0 || !denominator.is_finite() {
            return Err(AnalyticsError::NumericalInstability {
                operation: "ridge_regression".to_string(),
                reason: format!("degenerate design even under ridge (Sxx = {:.2e})", sxx),
            });
        }

        let slope = sxy / denominator;
        let intercept = mean_y - slope * mean_x;
        if !slope.is_finite() || !intercept.is_finite() {
            return Err(AnalyticsError::NumericalInstability {
                operation: "ridge_regression".to_string(),
                reason: "non-finite stabilized coefficients".to_string(),
            });
        }

        let residuals = xv
            .iter()
            .zip(yv)
            .map(|(xi, yi)| yi - (slope * xi + intercept))
            .collect();
        Ok((slope, intercept, residuals, true))
    }

    fn subsample_scatter(&self, xv: &[f64], yv: &[f64]) -> Vec<(f64, f64)> {
        let n = xv.len();
        match self.max_scatter_points {
            Some(max) if n > max => {
                // Deterministic stride keeps endpoints and spreads evenly
                let step = (n - 1) as f64 / (max - 1) as f64;
                (0..max)
                    .map(|i| {
                        let idx = (i as f64 * step).round() as usize;
                        (xv[idx], yv[idx])
                    })
                    .collect()
            }
            _ => xv.iter().copied().zip(yv.iter().copied()).collect(),
        }
    }
}
