//! Request/response facade over the analysis components.
//!
//! The presentation layer talks to [`AnalyticsEngine`] through a narrow
//! contract: an [`AnalysisRequest`] carrying the input series and the
//! analysis parameters, answered by a flat, serializable
//! [`AnalysisResult`]. The engine is stateless between calls apart from
//! an optional read-through result cache and the background job registry.

use crate::cache::{CacheKey, ResultCache};
use crate::config::EngineConfig;
use crate::correlation::{CorrelationEngine, CorrelationResult};
use crate::distribution::{DistributionAnalyzer, DistributionFit, GeneratingDistribution};
use crate::errors::AnalyticsResult;
use crate::forecast::{ForecastSeries, TimeSeriesForecaster};
use crate::hypothesis::{BatteryReport, HypothesisTestSuite};
use crate::jobs::{JobId, JobManager, JobStatus};
use crate::montecarlo::{MonteCarloSimulator, SimulationConfig, SimulationRun};
use crate::risk::{RiskConfig, RiskMetricSet, RiskMetricsCalculator};
use crate::series::SampleSeries;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// One analysis request, carrying its inputs and parameters.
///
/// Selection state (active analysis, date range) lives with the caller;
/// the engine only ever sees explicit parameters.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnalysisRequest {
    /// Fit moments and a density curve
    Distribution {
        /// Input series
        series: SampleSeries,
    },
    /// Correlate two series and fit a trend line
    Correlation {
        /// First series
        x: SampleSeries,
        /// Second series
        y: SampleSeries,
        /// Optional display-scatter cap; never affects the statistics
        max_scatter_points: Option<usize>,
    },
    /// Run the fixed hypothesis-test battery
    Hypothesis {
        /// Primary series
        series: SampleSeries,
        /// Comparison groups
        groups: Vec<SampleSeries>,
    },
    /// Run a Monte Carlo simulation synchronously
    MonteCarlo {
        /// Generating distribution
        distribution: GeneratingDistribution,
        /// Simulation parameters (path count, horizon, seed, levels)
        config: SimulationConfig,
    },
    /// Compute risk metrics from a return series
    Risk {
        /// Return series
        returns: SampleSeries,
        /// Optional benchmark for beta
        benchmark: Option<SampleSeries>,
        /// Risk parameters (levels, annualization, targets)
        config: RiskConfig,
    },
    /// Forecast future points with confidence bands
    Forecast {
        /// Historical anchor series
        series: SampleSeries,
        /// Steps to project
        horizon: usize,
        /// Band confidence level
        confidence: f64,
        /// Optional seasonal period for an additive component
        seasonal_period: Option<usize>,
    },
}

/// Typed result of an analysis, one variant per request kind.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnalysisResult {
    /// Distribution fit
    Distribution(DistributionFit),
    /// Correlation and trend
    Correlation(CorrelationResult),
    /// Hypothesis battery report
    Hypothesis(BatteryReport),
    /// Completed simulation run
    MonteCarlo(SimulationRun),
    /// Risk metric set
    Risk(RiskMetricSet),
    /// Forecast with bands
    Forecast(ForecastSeries),
}

/// The analytics engine facade.
pub struct AnalyticsEngine {
    config: EngineConfig,
    cache: Option<ResultCache<AnalysisResult>>,
    jobs: JobManager,
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl AnalyticsEngine {
    /// Engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        let cache = config
            .enable_cache
            .then(|| ResultCache::new(config.cache_capacity));
        Self {
            config,
            cache,
            jobs: JobManager::new(),
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Risk parameters seeded from the engine defaults.
    pub fn default_risk_config(&self) -> RiskConfig {
        RiskConfig {
            periods_per_year: self.config.periods_per_year,
            risk_free_rate: self.config.risk_free_rate,
            ..RiskConfig::default()
        }
    }

    /// Run one analysis synchronously.
    ///
    /// Results are served from the cache when an identical request
    /// (inputs and parameters) was answered before; every analysis is a
    /// deterministic function of its request, so cached entries never go
    /// stale.
    pub fn analyze(&self, request: AnalysisRequest) -> AnalyticsResult<AnalysisResult> {
        match &self.cache {
            Some(cache) => {
                let key = self.cache_key(&request);
                cache.get_or_compute(key, || self.dispatch(&request))
            }
            None => self.dispatch(&request),
        }
    }

    /// Submit a Monte Carlo run for background execution.
    pub fn submit_monte_carlo(
        &self,
        distribution: GeneratingDistribution,
        config: SimulationConfig,
    ) -> JobId {
        self.jobs.submit(distribution, config)
    }

    /// Lifecycle status of a background job.
    pub fn job_status(&self, job_id: JobId) -> AnalyticsResult<JobStatus> {
        self.jobs.status(job_id)
    }

    /// Result of a completed background job.
    pub fn job_result(&self, job_id: JobId) -> AnalyticsResult<SimulationRun> {
        self.jobs.result(job_id)
    }

    /// Request cooperative cancellation of a background job.
    pub fn cancel_job(&self, job_id: JobId) -> AnalyticsResult<()> {
        self.jobs.cancel(job_id)
    }

    /// Background job registry, for callers that poll with timeouts.
    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    fn dispatch(&self, request: &AnalysisRequest) -> AnalyticsResult<AnalysisResult> {
        match request {
            AnalysisRequest::Distribution { series } => {
                let analyzer =
                    DistributionAnalyzer::new(self.config.kde_grid_points, self.config.kde_span_sigmas);
                Ok(AnalysisResult::Distribution(analyzer.fit(series)?))
            }
            AnalysisRequest::Correlation {
                x,
                y,
                max_scatter_points,
            } => {
                let engine = match max_scatter_points {
                    Some(max) => CorrelationEngine::with_max_scatter_points(*max),
                    None => CorrelationEngine::new(),
                };
                Ok(AnalysisResult::Correlation(engine.correlate(x, y)?))
            }
            AnalysisRequest::Hypothesis { series, groups } => {
                let suite = HypothesisTestSuite::new(self.config.significance_level)?;
                Ok(AnalysisResult::Hypothesis(suite.run_battery(series, groups)?))
            }
            AnalysisRequest::MonteCarlo {
                distribution,
                config,
            } => Ok(AnalysisResult::MonteCarlo(
                MonteCarloSimulator::new().simulate(distribution, config)?,
            )),
            AnalysisRequest::Risk {
                returns,
                benchmark,
                config,
            } => {
                let calculator = RiskMetricsCalculator::new(config.clone())?;
                let metrics = match benchmark {
                    Some(b) => calculator.from_series_with_benchmark(returns, b)?,
                    None => calculator.from_series(returns)?,
                };
                Ok(AnalysisResult::Risk(metrics))
            }
            AnalysisRequest::Forecast {
                series,
                horizon,
                confidence,
                seasonal_period,
            } => {
                let mut forecaster =
                    TimeSeriesForecaster::new(self.config.forecast_history_multiple);
                if let Some(period) = seasonal_period {
                    forecaster = forecaster.with_seasonal_period(*period);
                }
                Ok(AnalysisResult::Forecast(forecaster.forecast(
                    series,
                    *horizon,
                    *confidence,
                )?))
            }
        }
    }

    /// Build the cache key for a request: kind, input content hash, and
    /// parameter hash (engine-level knobs included where they shape the
    /// result).
    fn cache_key(&self, request: &AnalysisRequest) -> CacheKey {
        let mut params = DefaultHasher::new();
        let (kind, input_hash) = match request {
            AnalysisRequest::Distribution { series } => {
                self.config.kde_grid_points.hash(&mut params);
                hash_f64(&mut params, self.config.kde_span_sigmas);
                ("distribution", series.content_hash())
            }
            AnalysisRequest::Correlation {
                x,
                y,
                max_scatter_points,
            } => {
                max_scatter_points.hash(&mut params);
                ("correlation", combine(x.content_hash(), y.content_hash()))
            }
            AnalysisRequest::Hypothesis { series, groups } => {
                hash_f64(&mut params, self.config.significance_level);
                let mut input = series.content_hash();
                for group in groups {
                    input = combine(input, group.content_hash());
                }
                ("hypothesis", input)
            }
            AnalysisRequest::MonteCarlo {
                distribution,
                config,
            } => {
                hash_simulation_config(&mut params, config);
                ("montecarlo", hash_distribution(distribution))
            }
            AnalysisRequest::Risk {
                returns,
                benchmark,
                config,
            } => {
                hash_risk_config(&mut params, config);
                let input = match benchmark {
                    Some(b) => combine(returns.content_hash(), b.content_hash()),
                    None => returns.content_hash(),
                };
                ("risk", input)
            }
            AnalysisRequest::Forecast {
                series,
                horizon,
                confidence,
                seasonal_period,
            } => {
                horizon.hash(&mut params);
                hash_f64(&mut params, *confidence);
                seasonal_period.hash(&mut params);
                self.config.forecast_history_multiple.hash(&mut params);
                ("forecast", series.content_hash())
            }
        };
        CacheKey {
            kind,
            input_hash,
            param_hash: params.finish(),
        }
    }
}

fn hash_f64(hasher: &mut DefaultHasher, value: f64) {
    value.to_bits().hash(hasher);
}

fn combine(left: u64, right: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    left.hash(&mut hasher);
    right.hash(&mut hasher);
    hasher.finish()
}

fn hash_distribution(distribution: &GeneratingDistribution) -> u64 {
    let mut hasher = DefaultHasher::new();
    match distribution {
        GeneratingDistribution::Normal { mean, std_dev } => {
            0u8.hash(&mut hasher);
            hash_f64(&mut hasher, *mean);
            hash_f64(&mut hasher, *std_dev);
        }
        GeneratingDistribution::StudentT {
            mean,
            scale,
            degrees_of_freedom,
        } => {
            1u8.hash(&mut hasher);
            hash_f64(&mut hasher, *mean);
            hash_f64(&mut hasher, *scale);
            hash_f64(&mut hasher, *degrees_of_freedom);
        }
        GeneratingDistribution::Empirical { sample } => {
            2u8.hash(&mut hasher);
            for v in sample {
                v.to_bits().hash(&mut hasher);
            }
        }
    }
    hasher.finish()
}

fn hash_simulation_config(hasher: &mut DefaultHasher, config: &SimulationConfig) {
    config.path_count.hash(hasher);
    config.horizon.hash(hasher);
    config.seed.hash(hasher);
    config.keep_paths.hash(hasher);
    for level in &config.confidence_levels {
        hash_f64(hasher, *level);
    }
}

fn hash_risk_config(hasher: &mut DefaultHasher, config: &RiskConfig) {
    for level in &config.confidence_levels {
        hash_f64(hasher, *level);
    }
    hash_f64(hasher, config.periods_per_year);
    hash_f64(hasher, config.risk_free_rate);
    hash_f64(hasher, config.target_return);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AnalyticsError;

    fn series(values: &[f64]) -> SampleSeries {
        SampleSeries::new(values.to_vec()).unwrap()
    }

    #[test]
    fn test_dispatch_each_request_kind() {
        let engine = AnalyticsEngine::default();
        let s = series(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);

        let fit = engine
            .analyze(AnalysisRequest::Distribution { series: s.clone() })
            .unwrap();
        assert!(matches!(fit, AnalysisResult::Distribution(_)));

        let corr = engine
            .analyze(AnalysisRequest::Correlation {
                x: s.clone(),
                y: s.clone(),
                max_scatter_points: None,
            })
            .unwrap();
        assert!(matches!(corr, AnalysisResult::Correlation(_)));

        let battery = engine
            .analyze(AnalysisRequest::Hypothesis {
                series: s.clone(),
                groups: vec![],
            })
            .unwrap();
        assert!(matches!(battery, AnalysisResult::Hypothesis(_)));

        let mc = engine
            .analyze(AnalysisRequest::MonteCarlo {
                distribution: GeneratingDistribution::Normal {
                    mean: 0.0,
                    std_dev: 1.0,
                },
                config: SimulationConfig {
                    path_count: 256,
                    ..Default::default()
                },
            })
            .unwrap();
        assert!(matches!(mc, AnalysisResult::MonteCarlo(_)));

        let returns = series(&[0.01, -0.02, 0.015, 0.0, -0.01]);
        let risk = engine
            .analyze(AnalysisRequest::Risk {
                returns,
                benchmark: None,
                config: engine.default_risk_config(),
            })
            .unwrap();
        assert!(matches!(risk, AnalysisResult::Risk(_)));

        let history = series(&(0..40).map(|i| i as f64).collect::<Vec<_>>());
        let forecast = engine
            .analyze(AnalysisRequest::Forecast {
                series: history,
                horizon: 5,
                confidence: 0.95,
                seasonal_period: None,
            })
            .unwrap();
        assert!(matches!(forecast, AnalysisResult::Forecast(_)));
    }

    #[test]
    fn test_errors_pass_through_uncached() {
        let engine = AnalyticsEngine::default();
        let short = series(&[1.0]);
        let err = engine
            .analyze(AnalysisRequest::Distribution { series: short })
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientData { .. }));
    }

    #[test]
    fn test_cache_distinguishes_parameters() {
        let engine = AnalyticsEngine::new(EngineConfig::default());
        let s = series(&(0..40).map(|i| i as f64 * 1.1).collect::<Vec<_>>());

        let a = engine
            .analyze(AnalysisRequest::Forecast {
                series: s.clone(),
                horizon: 4,
                confidence: 0.90,
                seasonal_period: None,
            })
            .unwrap();
        let b = engine
            .analyze(AnalysisRequest::Forecast {
                series: s,
                horizon: 4,
                confidence: 0.99,
                seasonal_period: None,
            })
            .unwrap();

        match (a, b) {
            (AnalysisResult::Forecast(narrow), AnalysisResult::Forecast(wide)) => {
                assert!(wide.points[0].upper - wide.points[0].lower
                    > narrow.points[0].upper - narrow.points[0].lower);
            }
            _ => panic!("expected forecasts"),
        }
    }

    #[test]
    fn test_cached_and_uncached_agree() {
        let cached = AnalyticsEngine::new(EngineConfig::default());
        let uncached = AnalyticsEngine::new(EngineConfig {
            enable_cache: false,
            ..EngineConfig::default()
        });
        let s = series(&[0.5, 1.5, 0.7, 2.2, 1.1, 0.9, 1.8, 0.3]);

        let request = |s: &SampleSeries| AnalysisRequest::Distribution { series: s.clone() };
        let a = cached.analyze(request(&s)).unwrap();
        let a2 = cached.analyze(request(&s)).unwrap(); // cache hit
        let b = uncached.analyze(request(&s)).unwrap();

        match (a, a2, b) {
            (
                AnalysisResult::Distribution(x),
                AnalysisResult::Distribution(y),
                AnalysisResult::Distribution(z),
            ) => {
                assert_eq!(x, y);
                assert_eq!(x, z);
            }
            _ => panic!("expected distribution fits"),
        }
    }

    #[test]
    fn test_background_job_roundtrip() {
        let engine = AnalyticsEngine::default();
        let job_id = engine.submit_monte_carlo(
            GeneratingDistribution::Normal {
                mean: 0.0,
                std_dev: 1.0,
            },
            SimulationConfig {
                path_count: 2000,
                seed: 5,
                ..Default::default()
            },
        );
        let status = engine
            .jobs()
            .wait(job_id, std::time::Duration::from_secs(30))
            .unwrap();
        assert!(status.is_terminal());
        let run = engine.job_result(job_id).unwrap();
        assert_eq!(run.terminal_returns.len(), 2000);
    }
}
