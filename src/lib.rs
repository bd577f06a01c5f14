//! # Statistical & Risk Analytics Engine
//!
//! A computation core for analytics dashboards: distribution analysis,
//! correlation and hypothesis testing, seeded Monte Carlo simulation with
//! Value-at-Risk and Expected Shortfall, and univariate time-series
//! forecasting with confidence bands.
//!
//! The engine is presentation-agnostic. Callers hand it one or two
//! [`SampleSeries`] plus explicit analysis parameters and receive flat,
//! typed result records suitable for direct chart consumption; all
//! selection state lives with the caller.
//!
//! ## Key Properties
//!
//! - **Reproducibility as a contract**: every stochastic computation runs
//!   on a seeded ChaCha20 generator. A simulation rerun with the same seed
//!   and parameters is byte-identical, and parallel execution cannot
//!   change results because each path derives its own seed.
//! - **Typed failure taxonomy**: input validation fails fast at component
//!   boundaries; undefined statistics (zero-variance correlation) are
//!   distinct, recoverable errors rather than silent zeros; battery-style
//!   operations isolate per-test failures.
//! - **Stateless between calls**: apart from an optional keyed result
//!   cache of immutable entries and the background job registry, no state
//!   survives a request.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use risk_analytics::{
//!     AnalyticsEngine, AnalysisRequest, AnalysisResult, SampleSeries,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = AnalyticsEngine::default();
//!     let returns = SampleSeries::with_label(
//!         vec![0.012, -0.004, 0.008, -0.011, 0.005, 0.009, -0.002, 0.003],
//!         "PORTFOLIO",
//!     )?;
//!
//!     match engine.analyze(AnalysisRequest::Distribution { series: returns })? {
//!         AnalysisResult::Distribution(fit) => {
//!             println!(
//!                 "mean {:.4}, std {:.4}, skew {:.3}, excess kurtosis {:.3}",
//!                 fit.mean, fit.std_dev, fit.skewness, fit.excess_kurtosis
//!             );
//!         }
//!         _ => unreachable!(),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Analyses
//!
//! | Request | Component | Result |
//! |---|---|---|
//! | `Distribution` | [`DistributionAnalyzer`] | moments + Gaussian KDE curve |
//! | `Correlation` | [`CorrelationEngine`] | Pearson r + OLS trend line |
//! | `Hypothesis` | [`HypothesisTestSuite`] | fixed five-test battery |
//! | `MonteCarlo` | [`MonteCarloSimulator`] | seeded simulated return paths |
//! | `Risk` | [`RiskMetricsCalculator`] | VaR, ES, drawdown, Sharpe, Sortino, beta |
//! | `Forecast` | [`TimeSeriesForecaster`] | point forecasts + widening bands |
//!
//! Long-running Monte Carlo work goes through the asynchronous job model
//! ([`JobManager`]): submit, poll status, fetch the result, with
//! cooperative cancellation that always discards partial output.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation modules
pub mod cache;
pub mod config;
pub mod errors;
pub mod math;
pub mod rng;
pub mod series;

// Analysis components
pub mod correlation;
pub mod distribution;
pub mod forecast;
pub mod hypothesis;
pub mod montecarlo;
pub mod risk;

// Orchestration
pub mod engine;
pub mod jobs;

// Re-exports for convenience - main public API
pub use cache::{CacheKey, CacheStats, ResultCache};
pub use config::EngineConfig;
pub use correlation::{CorrelationEngine, CorrelationResult};
pub use distribution::{DistributionAnalyzer, DistributionFit, GeneratingDistribution};
pub use engine::{AnalysisRequest, AnalysisResult, AnalyticsEngine};
pub use errors::{AnalyticsError, AnalyticsResult};
pub use forecast::{FittedModel, ForecastPoint, ForecastSeries, TimeSeriesForecaster};
pub use hypothesis::{
    BatteryOutcome, BatteryReport, HypothesisTestResult, HypothesisTestSuite, TestKind,
};
pub use jobs::{JobId, JobManager, JobStatus};
pub use montecarlo::{MonteCarloSimulator, SimulationConfig, SimulationRun};
pub use risk::{ReturnSource, RiskConfig, RiskMetricSet, RiskMetricsCalculator};
pub use rng::SeededRng;
pub use series::SampleSeries;
