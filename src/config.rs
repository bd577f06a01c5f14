//! Engine-wide configuration.
//!
//! Analysis-specific parameters (path counts, horizons, confidence levels)
//! travel with each request; [`EngineConfig`] holds the defaults and the
//! resource-model knobs shared across analyses.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the analytics engine.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Significance threshold for hypothesis test verdicts
    pub significance_level: f64,
    /// Number of grid points for kernel density curves
    pub kde_grid_points: usize,
    /// Density grid span in standard deviations around the mean
    pub kde_span_sigmas: f64,
    /// Path count at or above which Monte Carlo generation parallelizes
    pub parallel_threshold: usize,
    /// Fixed Monte Carlo chunk size; aggregates depend on this, never on
    /// worker count
    pub chunk_size: usize,
    /// Annualization factor for risk ratios (252 trading days by default)
    pub periods_per_year: f64,
    /// Per-period risk-free rate used for excess returns
    pub risk_free_rate: f64,
    /// Required history length as a multiple of the forecast horizon
    pub forecast_history_multiple: usize,
    /// Enable the keyed read-through result cache
    pub enable_cache: bool,
    /// Maximum number of cached results before eviction
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            kde_grid_points: 50,
            kde_span_sigmas: 5.0,
            parallel_threshold: 100_000,
            chunk_size: 8192,
            periods_per_year: 252.0,
            risk_free_rate: 0.0,
            forecast_history_multiple: 3,
            enable_cache: true,
            cache_capacity: 128,
        }
    }
}

impl EngineConfig {
    /// Interactive preset: small caches, low parallel threshold so even
    /// modest simulations use all cores.
    pub fn interactive() -> Self {
        Self {
            parallel_threshold: 10_000,
            cache_capacity: 32,
            ..Self::default()
        }
    }

    /// Batch preset: caching disabled (each input is seen once) and a
    /// high parallel threshold to avoid thread churn on small jobs.
    pub fn batch() -> Self {
        Self {
            enable_cache: false,
            parallel_threshold: 250_000,
            ..Self::default()
        }
    }

    /// Override the significance threshold for hypothesis verdicts.
    pub fn with_significance_level(mut self, alpha: f64) -> Self {
        self.significance_level = alpha;
        self
    }

    /// Override the annualization factor.
    pub fn with_periods_per_year(mut self, periods: f64) -> Self {
        self.periods_per_year = periods;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.significance_level, 0.05);
        assert_eq!(config.kde_grid_points, 50);
        assert_eq!(config.parallel_threshold, 100_000);
        assert!(config.enable_cache);
    }

    #[test]
    fn test_batch_preset_disables_cache() {
        let config = EngineConfig::batch();
        assert!(!config.enable_cache);
        assert!(config.parallel_threshold > EngineConfig::default().parallel_threshold);
    }

    #[test]
    fn test_builder_overrides() {
        let config = EngineConfig::default()
            .with_significance_level(0.01)
            .with_periods_per_year(365.0);
        assert_eq!(config.significance_level, 0.01);
        assert_eq!(config.periods_per_year, 365.0);
    }
}
