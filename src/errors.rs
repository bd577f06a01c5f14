//! Error types and validation functions for the analytics engine.
//!
//! Every analysis validates its inputs at the component boundary and fails
//! fast with a typed error; battery-style operations isolate per-test
//! failures instead of aborting (see [`crate::hypothesis`]).

use thiserror::Error;

/// Error taxonomy for all analytics operations.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum AnalyticsError {
    /// Insufficient data for the requested analysis.
    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData {
        /// Minimum required data points
        required: usize,
        /// Actual number of data points provided
        actual: usize,
    },

    /// Insufficient history for the requested forecast horizon.
    #[error("Insufficient history: horizon {horizon} needs at least {required} points, got {actual}")]
    InsufficientHistory {
        /// Minimum required history length
        required: usize,
        /// Actual history length
        actual: usize,
        /// Requested forecast horizon
        horizon: usize,
    },

    /// Two paired series have different lengths.
    #[error("Dimension mismatch: left series has {left} points, right has {right}")]
    DimensionMismatch {
        /// Length of the first series
        left: usize,
        /// Length of the second series
        right: usize,
    },

    /// Invalid parameter value for an analysis configuration.
    #[error("Invalid parameter: {parameter} = {value}, expected {constraint}")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value provided
        value: f64,
        /// Valid range or constraint description
        constraint: String,
    },

    /// Input contains a NaN or infinite value.
    #[error("Non-finite input: {name} contains {value_desc} at index {index}")]
    NonFiniteInput {
        /// Input name for error reporting
        name: String,
        /// Index of the offending value
        index: usize,
        /// Description of the value (NaN, Infinity, -Infinity)
        value_desc: String,
    },

    /// A statistic is mathematically undefined for the given input
    /// (e.g. correlation of a zero-variance series). Recoverable: the
    /// caller may substitute a sentinel and continue.
    #[error("Undefined statistic: {statistic} ({reason})")]
    UndefinedStatistic {
        /// Name of the undefined statistic
        statistic: String,
        /// Why it is undefined for this input
        reason: String,
    },

    /// Numerical instability detected in a computation, after any
    /// regularization fallback has been exhausted.
    #[error("Numerical instability in {operation}: {reason}")]
    NumericalInstability {
        /// Operation that failed
        operation: String,
        /// Detailed reason
        reason: String,
    },

    /// A sub-test of the hypothesis battery is not applicable to the
    /// supplied data. Never aborts the remaining battery.
    #[error("Test not applicable: {test} ({reason})")]
    TestNotApplicable {
        /// Name of the inapplicable test
        test: String,
        /// Why the test could not run
        reason: String,
    },

    /// A job result was polled before the job reached a terminal state.
    #[error("Job {job_id} is not complete (status: {status})")]
    JobNotComplete {
        /// Job identifier
        job_id: u64,
        /// Current lifecycle status
        status: String,
    },

    /// An unknown job identifier was supplied.
    #[error("Job {job_id} not found")]
    JobNotFound {
        /// Job identifier
        job_id: u64,
    },

    /// An operation was cancelled cooperatively; partial output is
    /// discarded because a cancelled run is not reproducible.
    #[error("Operation cancelled: {operation} (seed {seed})")]
    Cancelled {
        /// Operation that was cancelled
        operation: String,
        /// Seed the cancelled run was using, for traceability
        seed: u64,
    },

    /// Shared resource could not be accessed.
    #[error("Concurrent access failed: {resource}")]
    ConcurrencyError {
        /// Resource that couldn't be accessed
        resource: String,
    },
}

/// Result type for analytics operations.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// Validates that data has sufficient length for an analysis.
pub fn validate_data_length(
    data: &[f64],
    min_required: usize,
    _operation: &str,
) -> AnalyticsResult<()> {
    if data.len() < min_required {
        Err(AnalyticsError::InsufficientData {
            required: min_required,
            actual: data.len(),
        })
    } else {
        Ok(())
    }
}

/// Validates that all values in a slice are finite.
///
/// Returns on the first non-finite value; the index and a description of
/// the offending value are reported so corrupt inputs can be located.
pub fn validate_all_finite(data: &[f64], name: &str) -> AnalyticsResult<()> {
    if let Some((i, &value)) = data.iter().enumerate().find(|(_, &v)| !v.is_finite()) {
        let value_desc = if value.is_nan() {
            "NaN".to_string()
        } else if value.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };
        return Err(AnalyticsError::NonFiniteInput {
            name: name.to_string(),
            index: i,
            value_desc,
        });
    }
    Ok(())
}

/// Validates that a parameter is finite and within inclusive bounds.
pub fn validate_parameter(value: f64, min: f64, max: f64, name: &str) -> AnalyticsResult<()> {
    if value.is_nan() {
        return Err(AnalyticsError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: "must not be NaN".to_string(),
        });
    }
    if value < min || value > max {
        return Err(AnalyticsError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: format!("[{}, {}]", min, max),
        });
    }
    Ok(())
}

/// Validates that a count parameter is strictly positive.
pub fn validate_positive_count(count: usize, name: &str) -> AnalyticsResult<()> {
    if count == 0 {
        return Err(AnalyticsError::InvalidParameter {
            parameter: name.to_string(),
            value: 0.0,
            constraint: "must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// Validates that a probability-like parameter lies strictly inside (0, 1).
pub fn validate_probability(value: f64, name: &str) -> AnalyticsResult<()> {
    if !value.is_finite() || value <= 0.0 || value >= 1.0 {
        return Err(AnalyticsError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: "(0, 1) exclusive".to_string(),
        });
    }
    Ok(())
}
