//! Sample series data model.
//!
//! [`SampleSeries`] is the single input contract shared by every analysis
//! component: an ordered, validated, immutable sequence of real numbers
//! with optional timestamps and a label. Validation happens once at
//! construction; downstream components can assume finite data.

use crate::errors::{validate_all_finite, AnalyticsError, AnalyticsResult};
use crate::math;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// An ordered sequence of real observations.
///
/// Invariants enforced at construction:
/// - non-empty
/// - every value finite (no NaN, no infinities)
/// - timestamps, when present, match the value count
///
/// The series is immutable once constructed; derived statistics are
/// computed on demand and never mutate the series.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SampleSeries {
    values: Vec<f64>,
    timestamps: Option<Vec<i64>>,
    label: Option<String>,
}

impl SampleSeries {
    /// Construct a series from raw values, validating the invariants.
    pub fn new(values: Vec<f64>) -> AnalyticsResult<Self> {
        if values.is_empty() {
            return Err(AnalyticsError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        validate_all_finite(&values, "series values")?;
        Ok(Self {
            values,
            timestamps: None,
            label: None,
        })
    }

    /// Construct a labeled series.
    pub fn with_label(values: Vec<f64>, label: impl Into<String>) -> AnalyticsResult<Self> {
        let mut series = Self::new(values)?;
        series.label = Some(label.into());
        Ok(series)
    }

    /// Attach timestamps (epoch units chosen by the caller). The count
    /// must match the value count.
    pub fn with_timestamps(mut self, timestamps: Vec<i64>) -> AnalyticsResult<Self> {
        if timestamps.len() != self.values.len() {
            return Err(AnalyticsError::DimensionMismatch {
                left: self.values.len(),
                right: timestamps.len(),
            });
        }
        self.timestamps = Some(timestamps);
        Ok(self)
    }

    /// Observation values, in order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of observations. Always at least 1.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// A constructed series is never empty; provided for slice-like APIs.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Optional label identifying the series.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Optional per-observation timestamps.
    pub fn timestamps(&self) -> Option<&[i64]> {
        self.timestamps.as_deref()
    }

    /// Arithmetic mean of the series.
    pub fn mean(&self) -> f64 {
        math::mean(&self.values)
    }

    /// Unbiased sample variance (n-1 denominator).
    pub fn variance(&self) -> f64 {
        math::sample_variance(&self.values)
    }

    /// Sample standard deviation.
    pub fn std_dev(&self) -> f64 {
        math::sample_std_dev(&self.values)
    }

    /// Period-over-period simple returns: `v[t] / v[t-1] - 1`.
    ///
    /// Requires at least 2 observations and nonzero predecessors; a zero
    /// level would make the return undefined.
    pub fn simple_returns(&self) -> AnalyticsResult<SampleSeries> {
        if self.values.len() < 2 {
            return Err(AnalyticsError::InsufficientData {
                required: 2,
                actual: self.values.len(),
            });
        }
        if let Some(i) = self.values[..self.values.len() - 1]
            .iter()
            .position(|&v| v == 0.0)
        {
            return Err(AnalyticsError::UndefinedStatistic {
                statistic: "simple returns".to_string(),
                reason: format!("zero level at index {}", i),
            });
        }
        let returns: Vec<f64> = self
            .values
            .windows(2)
            .map(|w| w[1] / w[0] - 1.0)
            .collect();
        validate_all_finite(&returns, "simple returns")?;
        Ok(SampleSeries {
            values: returns,
            timestamps: self.timestamps.as_ref().map(|ts| ts[1..].to_vec()),
            label: self.label.clone(),
        })
    }

    /// Log returns: `ln(v[t] / v[t-1])`. Requires strictly positive levels.
    pub fn log_returns(&self) -> AnalyticsResult<SampleSeries> {
        if self.values.len() < 2 {
            return Err(AnalyticsError::InsufficientData {
                required: 2,
                actual: self.values.len(),
            });
        }
        if let Some(i) = self.values.iter().position(|&v| v <= 0.0) {
            return Err(AnalyticsError::UndefinedStatistic {
                statistic: "log returns".to_string(),
                reason: format!("non-positive level at index {}", i),
            });
        }
        let returns: Vec<f64> = self.values.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        Ok(SampleSeries {
            values: returns,
            timestamps: self.timestamps.as_ref().map(|ts| ts[1..].to_vec()),
            label: self.label.clone(),
        })
    }

    /// Content hash over the value bit patterns, label, and timestamps.
    ///
    /// Used as the input half of result-cache keys; equal series hash
    /// equally because f64 bits are hashed, not rounded displays.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for v in &self.values {
            v.to_bits().hash(&mut hasher);
        }
        self.label.hash(&mut hasher);
        self.timestamps.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(
            SampleSeries::new(vec![]),
            Err(AnalyticsError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(matches!(
            SampleSeries::new(vec![1.0, f64::NAN]),
            Err(AnalyticsError::NonFiniteInput { .. })
        ));
        assert!(matches!(
            SampleSeries::new(vec![f64::INFINITY]),
            Err(AnalyticsError::NonFiniteInput { .. })
        ));
    }

    #[test]
    fn test_timestamps_must_match_length() {
        let series = SampleSeries::new(vec![1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(
            series.with_timestamps(vec![1, 2]),
            Err(AnalyticsError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_basic_statistics() {
        let series = SampleSeries::new(vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_approx_eq!(series.mean(), 3.0, 1e-12);
        assert_approx_eq!(series.variance(), 2.5, 1e-12);
    }

    #[test]
    fn test_simple_returns() {
        let series = SampleSeries::new(vec![100.0, 110.0, 99.0]).unwrap();
        let returns = series.simple_returns().unwrap();
        assert_eq!(returns.len(), 2);
        assert_approx_eq!(returns.values()[0], 0.10, 1e-12);
        assert_approx_eq!(returns.values()[1], -0.10, 1e-12);
    }

    #[test]
    fn test_simple_returns_zero_level() {
        let series = SampleSeries::new(vec![100.0, 0.0, 99.0]).unwrap();
        assert!(matches!(
            series.simple_returns(),
            Err(AnalyticsError::UndefinedStatistic { .. })
        ));
    }

    #[test]
    fn test_log_returns_require_positive_levels() {
        let series = SampleSeries::new(vec![100.0, -5.0]).unwrap();
        assert!(matches!(
            series.log_returns(),
            Err(AnalyticsError::UndefinedStatistic { .. })
        ));

        let series = SampleSeries::new(vec![100.0, 105.0]).unwrap();
        let returns = series.log_returns().unwrap();
        assert_approx_eq!(returns.values()[0], (105.0f64 / 100.0).ln(), 1e-12);
    }

    #[test]
    fn test_returns_drop_first_timestamp() {
        let series = SampleSeries::new(vec![1.0, 2.0, 4.0])
            .unwrap()
            .with_timestamps(vec![10, 20, 30])
            .unwrap();
        let returns = series.simple_returns().unwrap();
        assert_eq!(returns.timestamps(), Some(&[20, 30][..]));
    }

    #[test]
    fn test_content_hash_distinguishes_data() {
        let a = SampleSeries::new(vec![1.0, 2.0, 3.0]).unwrap();
        let b = SampleSeries::new(vec![1.0, 2.0, 3.0]).unwrap();
        let c = SampleSeries::new(vec![1.0, 2.0, 3.5]).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
    }
}
