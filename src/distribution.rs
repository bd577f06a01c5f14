//! Distribution analysis: sample moments and kernel density estimation.
//!
//! [`DistributionAnalyzer::fit`] is a pure function of its input: it
//! computes bias-corrected moments and a Gaussian kernel density curve,
//! and produces the [`GeneratingDistribution`] handed to the Monte Carlo
//! simulator.

use crate::errors::{AnalyticsError, AnalyticsResult};
use crate::math;
use crate::rng::SeededRng;
use crate::series::SampleSeries;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Result of fitting a distribution to a sample series.
///
/// Created per analysis request; callers wanting reuse memoize explicitly
/// (see [`crate::cache`]). Refitting the same input yields an identical
/// value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DistributionFit {
    /// Label of the source series, when present
    pub series_label: Option<String>,
    /// Number of observations the fit used
    pub sample_size: usize,
    /// Sample mean
    pub mean: f64,
    /// Unbiased sample variance (n-1 denominator)
    pub variance: f64,
    /// Sample standard deviation
    pub std_dev: f64,
    /// Bias-corrected sample skewness (G1)
    pub skewness: f64,
    /// Bias-corrected excess kurtosis (G2)
    pub excess_kurtosis: f64,
    /// Discretized density curve as ordered (x, density) pairs
    pub density: Vec<(f64, f64)>,
    /// Kernel bandwidth the density used (0 for a degenerate series)
    pub bandwidth: f64,
}

impl DistributionFit {
    /// Bridge to a normal generating distribution with the fitted
    /// mean and standard deviation.
    pub fn to_normal(&self) -> GeneratingDistribution {
        GeneratingDistribution::Normal {
            mean: self.mean,
            std_dev: self.std_dev,
        }
    }
}

/// A distribution the Monte Carlo simulator can draw from.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GeneratingDistribution {
    /// Gaussian returns
    Normal {
        /// Distribution mean
        mean: f64,
        /// Distribution standard deviation (non-negative)
        std_dev: f64,
    },
    /// Student-t returns for heavier tails
    StudentT {
        /// Location parameter
        mean: f64,
        /// Scale parameter (positive)
        scale: f64,
        /// Degrees of freedom (must exceed 2 for a finite variance)
        degrees_of_freedom: f64,
    },
    /// Bootstrap resampling from an observed sample
    Empirical {
        /// Sample to resample from (non-empty, finite)
        sample: Vec<f64>,
    },
}

impl GeneratingDistribution {
    /// Validate the distribution parameters before simulation.
    pub fn validate(&self) -> AnalyticsResult<()> {
        match self {
            Self::Normal { mean, std_dev } => {
                if !mean.is_finite() || !std_dev.is_finite() || *std_dev < 0.0 {
                    return Err(AnalyticsError::InvalidParameter {
                        parameter: "std_dev".to_string(),
                        value: *std_dev,
                        constraint: "finite and non-negative".to_string(),
                    });
                }
            }
            Self::StudentT {
                mean,
                scale,
                degrees_of_freedom,
            } => {
                if !mean.is_finite() || !scale.is_finite() || *scale <= 0.0 {
                    return Err(AnalyticsError::InvalidParameter {
                        parameter: "scale".to_string(),
                        value: *scale,
                        constraint: "finite and positive".to_string(),
                    });
                }
                if !degrees_of_freedom.is_finite() || *degrees_of_freedom <= 2.0 {
                    return Err(AnalyticsError::InvalidParameter {
                        parameter: "degrees_of_freedom".to_string(),
                        value: *degrees_of_freedom,
                        constraint: "> 2 for finite variance".to_string(),
                    });
                }
            }
            Self::Empirical { sample } => {
                if sample.is_empty() {
                    return Err(AnalyticsError::InsufficientData {
                        required: 1,
                        actual: 0,
                    });
                }
                crate::errors::validate_all_finite(sample, "empirical sample")?;
            }
        }
        Ok(())
    }

    /// Draw one value. Callers must have validated the distribution.
    pub fn sample(&self, rng: &mut SeededRng) -> f64 {
        match self {
            Self::Normal { mean, std_dev } => mean + std_dev * rng.standard_normal(),
            Self::StudentT {
                mean,
                scale,
                degrees_of_freedom,
            } => mean + scale * rng.student_t(*degrees_of_freedom),
            Self::Empirical { sample } => sample[rng.usize(0..sample.len())],
        }
    }

    /// Theoretical mean, when the family defines one.
    pub fn theoretical_mean(&self) -> Option<f64> {
        match self {
            Self::Normal { mean, .. } => Some(*mean),
            Self::StudentT { mean, .. } => Some(*mean),
            Self::Empirical { sample } => {
                if sample.is_empty() {
                    None
                } else {
                    Some(math::mean(sample))
                }
            }
        }
    }

    /// Short family name for logs and error context.
    pub fn family(&self) -> &'static str {
        match self {
            Self::Normal { .. } => "normal",
            Self::StudentT { .. } => "student_t",
            Self::Empirical { .. } => "empirical",
        }
    }
}

/// Fits an empirical distribution to a sample series.
#[derive(Debug, Clone)]
pub struct DistributionAnalyzer {
    grid_points: usize,
    span_sigmas: f64,
    bandwidth_override: Option<f64>,
}

impl Default for DistributionAnalyzer {
    fn default() -> Self {
        Self {
            grid_points: 50,
            span_sigmas: 5.0,
            bandwidth_override: None,
        }
    }
}

impl DistributionAnalyzer {
    /// Analyzer with explicit density-grid settings.
    pub fn new(grid_points: usize, span_sigmas: f64) -> Self {
        Self {
            grid_points: grid_points.max(2),
            span_sigmas,
            bandwidth_override: None,
        }
    }

    /// Override the Silverman bandwidth with a fixed value.
    pub fn with_bandwidth(mut self, bandwidth: f64) -> Self {
        self.bandwidth_override = Some(bandwidth);
        self
    }

    /// Fit moments and a Gaussian KDE curve to the series.
    ///
    /// Fails with [`AnalyticsError::InsufficientData`] below 2 points.
    /// A constant series produces zero variance, zero shape moments, and
    /// a single-point density curve at the mean.
    pub fn fit(&self, series: &SampleSeries) -> AnalyticsResult<DistributionFit> {
        let values = series.values();
        if values.len() < 2 {
            return Err(AnalyticsError::InsufficientData {
                required: 2,
                actual: values.len(),
            });
        }

        let mean = math::mean(values);
        let variance = math::sample_variance(values);
        let std_dev = variance.sqrt();
        let skewness = math::sample_skewness(values);
        let excess_kurtosis = math::sample_excess_kurtosis(values);

        let bandwidth = match self.bandwidth_override {
            Some(bw) if bw > 0.0 => bw,
            Some(bw) => {
                return Err(AnalyticsError::InvalidParameter {
                    parameter: "bandwidth".to_string(),
                    value: bw,
                    constraint: "positive".to_string(),
                })
            }
            None => silverman_bandwidth(values, std_dev),
        };

        let density = if bandwidth > 0.0 && std_dev > 0.0 {
            self.kde_curve(values, mean, std_dev, bandwidth)
        } else {
            // Degenerate sample: point mass at the mean
            vec![(mean, 1.0)]
        };

        Ok(DistributionFit {
            series_label: series.label().map(str::to_string),
            sample_size: values.len(),
            mean,
            variance,
            std_dev,
            skewness,
            excess_kurtosis,
            density,
            bandwidth: if std_dev > 0.0 { bandwidth } else { 0.0 },
        })
    }

    fn kde_curve(&self, values: &[f64], mean: f64, std_dev: f64, bandwidth: f64) -> Vec<(f64, f64)> {
        let lo = mean - self.span_sigmas * std_dev;
        let hi = mean + self.span_sigmas * std_dev;
        let step = (hi - lo) / (self.grid_points - 1) as f64;
        let norm = 1.0 / (values.len() as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());

        (0..self.grid_points)
            .map(|i| {
                let x = lo + i as f64 * step;
                let density: f64 = values
                    .iter()
                    .map(|&xi| {
                        let u = (x - xi) / bandwidth;
                        (-0.5 * u * u).exp()
                    })
                    .sum::<f64>()
                    * norm;
                (x, density)
            })
            .collect()
    }
}

/// Silverman's rule-of-thumb bandwidth.
///
/// `0.9 * min(sigma, IQR / 1.34) * n^(-1/5)`, falling back to sigma alone
/// when the interquartile range collapses (heavily tied data).
fn silverman_bandwidth(values: &[f64], std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let sorted = math::sorted_copy(values);
    let iqr = math::iqr_of_sorted(&sorted);
    let spread = if iqr > 0.0 {
        std_dev.min(iqr / 1.34)
    } else {
        std_dev
    };
    0.9 * spread * (values.len() as f64).powf(-0.2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn series(values: &[f64]) -> SampleSeries {
        SampleSeries::new(values.to_vec()).unwrap()
    }

    #[test]
    fn test_fit_requires_two_points() {
        let s = series(&[1.0]);
        assert!(matches!(
            DistributionAnalyzer::default().fit(&s),
            Err(AnalyticsError::InsufficientData {
                required: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_fit_moments() {
        let s = series(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let fit = DistributionAnalyzer::default().fit(&s).unwrap();
        assert_approx_eq!(fit.mean, 5.0, 1e-12);
        assert_approx_eq!(fit.variance, 32.0 / 7.0, 1e-12);
        assert_eq!(fit.sample_size, 8);
        assert!(fit.skewness > 0.0); // right tail from the 9
    }

    #[test]
    fn test_fit_is_idempotent() {
        let s = series(&[0.4, -1.2, 0.3, 2.2, -0.7, 1.1, 0.0, -0.3]);
        let analyzer = DistributionAnalyzer::default();
        let a = analyzer.fit(&s).unwrap();
        let b = analyzer.fit(&s).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_density_grid_shape() {
        let s = series(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let fit = DistributionAnalyzer::default().fit(&s).unwrap();
        assert_eq!(fit.density.len(), 50);
        // Grid spans mean +/- 5 sigma and is ordered
        let xs: Vec<f64> = fit.density.iter().map(|p| p.0).collect();
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
        assert_approx_eq!(xs[0], fit.mean - 5.0 * fit.std_dev, 1e-9);
        assert_approx_eq!(xs[49], fit.mean + 5.0 * fit.std_dev, 1e-9);
        // Densities are non-negative and peak somewhere in the middle
        assert!(fit.density.iter().all(|p| p.1 >= 0.0));
    }

    #[test]
    fn test_density_integrates_to_one() {
        let s = series(&[0.1, -0.4, 0.7, 1.2, -0.8, 0.3, 0.9, -0.2, 0.5, -0.6]);
        let fit = DistributionAnalyzer::new(200, 6.0).fit(&s).unwrap();
        // Trapezoidal integral of the KDE over the grid should be close to 1
        let integral: f64 = fit
            .density
            .windows(2)
            .map(|w| 0.5 * (w[0].1 + w[1].1) * (w[1].0 - w[0].0))
            .sum();
        assert!((integral - 1.0).abs() < 0.05, "integral = {}", integral);
    }

    #[test]
    fn test_degenerate_series_point_mass() {
        let s = series(&[3.0, 3.0, 3.0, 3.0]);
        let fit = DistributionAnalyzer::default().fit(&s).unwrap();
        assert_eq!(fit.variance, 0.0);
        assert_eq!(fit.skewness, 0.0);
        assert_eq!(fit.excess_kurtosis, 0.0);
        assert_eq!(fit.bandwidth, 0.0);
        assert_eq!(fit.density, vec![(3.0, 1.0)]);
    }

    #[test]
    fn test_generating_distribution_validation() {
        assert!(GeneratingDistribution::Normal {
            mean: 0.0,
            std_dev: 1.0
        }
        .validate()
        .is_ok());
        assert!(GeneratingDistribution::Normal {
            mean: 0.0,
            std_dev: -1.0
        }
        .validate()
        .is_err());
        assert!(GeneratingDistribution::StudentT {
            mean: 0.0,
            scale: 1.0,
            degrees_of_freedom: 2.0
        }
        .validate()
        .is_err());
        assert!(GeneratingDistribution::Empirical { sample: vec![] }
            .validate()
            .is_err());
    }

    #[test]
    fn test_sampling_is_seed_deterministic() {
        let dist = GeneratingDistribution::Normal {
            mean: 0.0,
            std_dev: 1.0,
        };
        let mut a = SeededRng::with_seed(5);
        let mut b = SeededRng::with_seed(5);
        for _ in 0..20 {
            assert_eq!(dist.sample(&mut a), dist.sample(&mut b));
        }
    }

    #[test]
    fn test_to_normal_bridges_fit() {
        let s = series(&[1.0, 2.0, 3.0, 4.0]);
        let fit = DistributionAnalyzer::default().fit(&s).unwrap();
        match fit.to_normal() {
            GeneratingDistribution::Normal { mean, std_dev } => {
                assert_approx_eq!(mean, fit.mean, 1e-12);
                assert_approx_eq!(std_dev, fit.std_dev, 1e-12);
            }
            _ => panic!("expected normal"),
        }
    }
}
