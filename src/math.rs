//! Scalar statistics kernel shared by all analysis components.
//!
//! Provides NaN-safe ordering, quantile interpolation, numerically stable
//! moment estimators, and an ordinary-least-squares regression with
//! centering and near-singular detection.

use crate::errors::{AnalyticsError, AnalyticsResult};

/// Variance below this threshold is treated as zero for stability checks.
pub const MIN_VARIANCE: f64 = 1e-14;

/// Safe comparison for floating point values (handles NaN)
pub fn float_total_cmp(a: &f64, b: &f64) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater, // push NaN to end
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => a.partial_cmp(b).unwrap(),
    }
}

/// Return a sorted copy of the input.
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(float_total_cmp);
    v
}

/// Calculate median of already-sorted data (handles even-length correctly)
pub fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Calculate median (handles even-length correctly)
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    median_of_sorted(&sorted_copy(values))
}

/// Calculate percentile from sorted data using linear interpolation.
///
/// This implements the standard percentile calculation used in statistical
/// packages, with linear interpolation between data points when the
/// percentile falls between observed values. `p` is a fraction in [0, 1].
pub fn percentile_of_sorted(sorted_data: &[f64], p: f64) -> f64 {
    if sorted_data.is_empty() {
        return f64::NAN;
    }
    if p <= 0.0 {
        return sorted_data[0];
    }
    if p >= 1.0 {
        return sorted_data[sorted_data.len() - 1];
    }

    let n = sorted_data.len();
    let index = p * (n - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        sorted_data[lower]
    } else {
        let weight = index - lower as f64;
        sorted_data[lower] * (1.0 - weight) + sorted_data[upper] * weight
    }
}

/// Interquartile range of sorted data.
pub fn iqr_of_sorted(sorted_data: &[f64]) -> f64 {
    percentile_of_sorted(sorted_data, 0.75) - percentile_of_sorted(sorted_data, 0.25)
}

/// Arithmetic mean. Returns NaN for empty input.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Unbiased sample variance (n-1 denominator) via Welford's single-pass
/// algorithm for numerical stability.
///
/// Returns 0.0 for inputs with fewer than two points or constant data.
pub fn sample_variance(data: &[f64]) -> f64 {
    if data.len() <= 1 {
        return 0.0;
    }

    let mut mean = 0.0;
    let mut m2 = 0.0;
    for (i, &value) in data.iter().enumerate() {
        let count = (i + 1) as f64;
        let delta = value - mean;
        mean += delta / count;
        m2 += delta * (value - mean);
    }

    let variance = m2 / (data.len() as f64 - 1.0);
    variance.max(0.0)
}

/// Sample standard deviation (n-1 denominator).
pub fn sample_std_dev(data: &[f64]) -> f64 {
    sample_variance(data).sqrt()
}

/// Sample covariance (n-1 denominator) of two equal-length slices.
pub fn sample_covariance(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n <= 1 || n != y.len() {
        return 0.0;
    }
    let mx = mean(x);
    let my = mean(y);
    let sum: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| (xi - mx) * (yi - my))
        .sum();
    sum / (n as f64 - 1.0)
}

/// Bias-corrected sample skewness (adjusted Fisher-Pearson G1).
///
/// Returns 0.0 when fewer than 3 points are available or the series is
/// degenerate (zero variance).
pub fn sample_skewness(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 3 {
        return 0.0;
    }
    let nf = n as f64;
    let m = mean(data);
    let m2 = data.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / nf;
    if m2 < MIN_VARIANCE {
        return 0.0;
    }
    let m3 = data.iter().map(|&x| (x - m).powi(3)).sum::<f64>() / nf;
    let g1 = m3 / m2.powf(1.5);
    g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0)
}

/// Bias-corrected sample excess kurtosis (G2).
///
/// Returns 0.0 when fewer than 4 points are available or the series is
/// degenerate (zero variance).
pub fn sample_excess_kurtosis(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 4 {
        return 0.0;
    }
    let nf = n as f64;
    let m = mean(data);
    let m2 = data.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / nf;
    if m2 < MIN_VARIANCE {
        return 0.0;
    }
    let m4 = data.iter().map(|&x| (x - m).powi(4)).sum::<f64>() / nf;
    let g2 = m4 / (m2 * m2) - 3.0;
    ((nf + 1.0) * g2 + 6.0) * (nf - 1.0) / ((nf - 2.0) * (nf - 3.0))
}

/// Ordinary least squares fit of `y = slope * x + intercept`.
#[derive(Debug, Clone)]
pub struct OlsFit {
    /// Estimated slope
    pub slope: f64,
    /// Estimated intercept
    pub intercept: f64,
    /// Residuals y - (slope * x + intercept)
    pub residuals: Vec<f64>,
    /// Centered sum of squares of the predictor, for downstream
    /// conditioning diagnostics
    pub sxx: f64,
}

/// Ordinary least squares regression with centered computation.
///
/// Centering the data before computing the cross products prevents
/// catastrophic cancellation when values are large but their variance is
/// small. Fails with [`AnalyticsError::NumericalInstability`] when the
/// design is singular or near-singular; callers wanting a ridge fallback
/// should catch that variant (see [`crate::correlation`]).
pub fn ols_regression(x: &[f64], y: &[f64]) -> AnalyticsResult<OlsFit> {
    if x.len() != y.len() {
        return Err(AnalyticsError::DimensionMismatch {
            left: x.len(),
            right: y.len(),
        });
    }
    if x.len() < 2 {
        return Err(AnalyticsError::InsufficientData {
            required: 2,
            actual: x.len(),
        });
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let sxy: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| (xi - mean_x) * (yi - mean_y))
        .sum();
    let sxx: f64 = x.iter().map(|xi| (xi - mean_x).powi(2)).sum();

    if sxx < MIN_VARIANCE * n {
        return Err(AnalyticsError::NumericalInstability {
            operation: "ols_regression".to_string(),
            reason: format!(
                "near-singular design matrix, predictor variance {:.2e}",
                sxx / n
            ),
        });
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    if !slope.is_finite() || !intercept.is_finite() {
        return Err(AnalyticsError::NumericalInstability {
            operation: "ols_regression".to_string(),
            reason: "non-finite regression coefficients".to_string(),
        });
    }

    let residuals: Vec<f64> = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| yi - (slope * xi + intercept))
        .collect();

    Ok(OlsFit {
        slope,
        intercept,
        residuals,
        sxx,
    })
}

/// Standard normal cumulative distribution function.
pub fn standard_normal_cdf(x: f64) -> f64 {
    // Extreme values clamp for numerical stability
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Error function approximation (Abramowitz & Stegun formula 7.1.26).
///
/// Maximum absolute error below 1.5e-7 for all real x, which is ample for
/// the p-value and band computations in this crate.
pub fn erf(x: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    if x.abs() > 6.0 {
        return if x > 0.0 { 1.0 } else { -1.0 };
    }

    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_percentile_interpolation() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_approx_eq!(percentile_of_sorted(&sorted, 0.0), 1.0, 1e-12);
        assert_approx_eq!(percentile_of_sorted(&sorted, 0.5), 3.0, 1e-12);
        assert_approx_eq!(percentile_of_sorted(&sorted, 1.0), 5.0, 1e-12);
        assert_approx_eq!(percentile_of_sorted(&sorted, 0.25), 2.0, 1e-12);
        // Between grid points: interpolated
        assert_approx_eq!(percentile_of_sorted(&sorted, 0.1), 1.4, 1e-12);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_approx_eq!(median(&[3.0, 1.0, 2.0]), 2.0, 1e-12);
        assert_approx_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5, 1e-12);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn test_sample_variance_unbiased() {
        // Known variance: [2, 4, 4, 4, 5, 5, 7, 9] has sample variance 32/7
        let data = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_approx_eq!(sample_variance(&data), 32.0 / 7.0, 1e-12);
    }

    #[test]
    fn test_sample_variance_degenerate() {
        assert_eq!(sample_variance(&[5.0]), 0.0);
        assert_eq!(sample_variance(&[3.0, 3.0, 3.0, 3.0]), 0.0);
    }

    #[test]
    fn test_welford_stability_large_offset() {
        // Same spread, huge offset: naive two-pass accumulates error here
        let data: Vec<f64> = [1.0, 2.0, 3.0, 4.0, 5.0]
            .iter()
            .map(|x| x + 1e9)
            .collect();
        assert_approx_eq!(sample_variance(&data), 2.5, 1e-6);
    }

    #[test]
    fn test_skewness_symmetric_is_zero() {
        let data = vec![-2.0, -1.0, 0.0, 1.0, 2.0];
        assert_approx_eq!(sample_skewness(&data), 0.0, 1e-12);
    }

    #[test]
    fn test_skewness_right_tail_positive() {
        let data = vec![1.0, 1.0, 1.0, 1.0, 10.0];
        assert!(sample_skewness(&data) > 0.0);
    }

    #[test]
    fn test_excess_kurtosis_constant_is_zero() {
        assert_eq!(sample_excess_kurtosis(&[1.0, 1.0, 1.0, 1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_ols_perfect_fit() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        let fit = ols_regression(&x, &y).unwrap();
        assert_approx_eq!(fit.slope, 2.0, 1e-10);
        assert_approx_eq!(fit.intercept, 0.0, 1e-10);
        for r in fit.residuals {
            assert_approx_eq!(r, 0.0, 1e-10);
        }
    }

    #[test]
    fn test_ols_constant_predictor_fails() {
        let x = vec![2.0, 2.0, 2.0, 2.0];
        let y = vec![1.0, 2.0, 3.0, 4.0];
        assert!(matches!(
            ols_regression(&x, &y),
            Err(AnalyticsError::NumericalInstability { .. })
        ));
    }

    #[test]
    fn test_ols_dimension_mismatch() {
        let x = vec![1.0, 2.0, 3.0];
        let y = vec![1.0, 2.0];
        assert!(matches!(
            ols_regression(&x, &y),
            Err(AnalyticsError::DimensionMismatch { left: 3, right: 2 })
        ));
    }

    #[test]
    fn test_ols_large_offset_stability() {
        // Centered computation keeps precision with a large common offset
        let x: Vec<f64> = (0..100).map(|i| 1e8 + i as f64).collect();
        let y: Vec<f64> = x.iter().map(|xi| 3.0 * xi + 7.0).collect();
        let fit = ols_regression(&x, &y).unwrap();
        assert_approx_eq!(fit.slope, 3.0, 1e-6);
    }

    #[test]
    fn test_erf_properties() {
        assert_eq!(erf(0.0), 0.0);
        assert_approx_eq!(erf(1.0), 0.8427007929, 1e-6);
        assert_approx_eq!(erf(-1.0), -erf(1.0), 1e-12);
        assert_approx_eq!(erf(10.0), 1.0, 1e-12);
    }

    #[test]
    fn test_standard_normal_cdf() {
        assert_approx_eq!(standard_normal_cdf(0.0), 0.5, 1e-9);
        assert_approx_eq!(standard_normal_cdf(1.96), 0.975, 1e-3);
        assert_approx_eq!(standard_normal_cdf(-1.96), 0.025, 1e-3);
        assert_eq!(standard_normal_cdf(-10.0), 0.0);
        assert_eq!(standard_normal_cdf(10.0), 1.0);
    }

    #[test]
    fn test_covariance_matches_variance() {
        let data = vec![1.0, 2.0, 4.0, 8.0];
        assert_approx_eq!(
            sample_covariance(&data, &data),
            sample_variance(&data),
            1e-12
        );
    }
}
