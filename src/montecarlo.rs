//! Seeded Monte Carlo simulation of return paths.
//!
//! Every path derives its own generator seed from the master seed and the
//! path index, so a run is a pure function of (distribution, config):
//! bit-for-bit identical under rerun, and invariant to chunk size and
//! worker count. Chunks exist only to partition work for `rayon` and to
//! give cooperative cancellation a boundary to observe.

use crate::distribution::GeneratingDistribution;
use crate::errors::{
    validate_positive_count, validate_probability, AnalyticsError, AnalyticsResult,
};
use crate::math;
use crate::rng::{derive_stream_seed, SeededRng};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Configuration of a simulation run. Recorded verbatim in the result so
/// any run can be reproduced.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Number of independent paths to generate
    pub path_count: usize,
    /// Periods per path; terminal returns compound over the horizon
    pub horizon: usize,
    /// Confidence levels downstream risk metrics will evaluate
    pub confidence_levels: Vec<f64>,
    /// Master seed; identical seed and parameters reproduce the run
    pub seed: u64,
    /// Work-partition size for parallel generation and cancellation
    /// checks; does not affect the generated values
    pub chunk_size: usize,
    /// Path count at or above which generation parallelizes
    pub parallel_threshold: usize,
    /// Retain full per-period paths, not just terminal returns
    pub keep_paths: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            path_count: 10_000,
            horizon: 1,
            confidence_levels: vec![0.95, 0.99],
            seed: 42,
            chunk_size: 8192,
            parallel_threshold: 100_000,
            keep_paths: false,
        }
    }
}

impl SimulationConfig {
    /// Validate counts, levels, and partition sizes.
    pub fn validate(&self) -> AnalyticsResult<()> {
        validate_positive_count(self.path_count, "path_count")?;
        validate_positive_count(self.horizon, "horizon")?;
        validate_positive_count(self.chunk_size, "chunk_size")?;
        for &level in &self.confidence_levels {
            validate_probability(level, "confidence_level")?;
        }
        Ok(())
    }
}

/// Result of a completed simulation run.
///
/// Immutable after generation; rerunning with the same seed and
/// parameters is byte-identical.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationRun {
    /// Configuration the run used
    pub config: SimulationConfig,
    /// Distribution the draws came from
    pub distribution: GeneratingDistribution,
    /// Ordered terminal returns, one per path
    pub terminal_returns: Vec<f64>,
    /// Full per-period return paths when `keep_paths` was set
    pub paths: Option<Vec<Vec<f64>>>,
}

impl SimulationRun {
    /// Sample mean of the terminal returns.
    pub fn sample_mean(&self) -> f64 {
        math::mean(&self.terminal_returns)
    }

    /// Sample standard deviation of the terminal returns.
    pub fn sample_std_dev(&self) -> f64 {
        math::sample_std_dev(&self.terminal_returns)
    }
}

/// Generates independent simulated return paths from a distribution.
#[derive(Debug, Clone, Default)]
pub struct MonteCarloSimulator;

impl MonteCarloSimulator {
    /// Simulator with default behavior; all knobs live on the config.
    pub fn new() -> Self {
        Self
    }

    /// Run a simulation to completion.
    pub fn simulate(
        &self,
        distribution: &GeneratingDistribution,
        config: &SimulationConfig,
    ) -> AnalyticsResult<SimulationRun> {
        self.simulate_with_cancel(distribution, config, None)
    }

    /// Run a simulation with a cooperative cancellation flag.
    ///
    /// The flag is observed between chunks; a chunk already in flight
    /// finishes, but its output is discarded along with everything else,
    /// since a cancelled run's partial output is not reproducible.
    pub fn simulate_with_cancel(
        &self,
        distribution: &GeneratingDistribution,
        config: &SimulationConfig,
        cancel: Option<&AtomicBool>,
    ) -> AnalyticsResult<SimulationRun> {
        distribution.validate()?;
        config.validate()?;

        let chunk_count = (config.path_count + config.chunk_size - 1) / config.chunk_size;
        let chunk_indices: Vec<usize> = (0..chunk_count).collect();

        let run_chunk = |&chunk_idx: &usize| -> AnalyticsResult<ChunkOutput> {
            if let Some(flag) = cancel {
                if flag.load(Ordering::SeqCst) {
                    return Err(AnalyticsError::Cancelled {
                        operation: "monte_carlo_simulation".to_string(),
                        seed: config.seed,
                    });
                }
            }
            Ok(generate_chunk(distribution, config, chunk_idx))
        };

        let chunks: Vec<ChunkOutput> = if config.path_count >= config.parallel_threshold {
            chunk_indices
                .par_iter()
                .map(run_chunk)
                .collect::<AnalyticsResult<Vec<_>>>()?
        } else {
            chunk_indices
                .iter()
                .map(run_chunk)
                .collect::<AnalyticsResult<Vec<_>>>()?
        };

        // Final cancellation check so a cancel raised during the last
        // chunk still discards the output
        if let Some(flag) = cancel {
            if flag.load(Ordering::SeqCst) {
                return Err(AnalyticsError::Cancelled {
                    operation: "monte_carlo_simulation".to_string(),
                    seed: config.seed,
                });
            }
        }

        let mut terminal_returns = Vec::with_capacity(config.path_count);
        let mut paths = config.keep_paths.then(|| Vec::with_capacity(config.path_count));
        for chunk in chunks {
            terminal_returns.extend(chunk.terminal_returns);
            if let (Some(all), Some(chunk_paths)) = (paths.as_mut(), chunk.paths) {
                all.extend(chunk_paths);
            }
        }

        Ok(SimulationRun {
            config: config.clone(),
            distribution: distribution.clone(),
            terminal_returns,
            paths,
        })
    }
}

struct ChunkOutput {
    terminal_returns: Vec<f64>,
    paths: Option<Vec<Vec<f64>>>,
}

/// Generate the paths belonging to one chunk.
///
/// Each path seeds its own generator from the master seed and the global
/// path index, so output never depends on chunking or scheduling.
fn generate_chunk(
    distribution: &GeneratingDistribution,
    config: &SimulationConfig,
    chunk_idx: usize,
) -> ChunkOutput {
    let start = chunk_idx * config.chunk_size;
    let end = (start + config.chunk_size).min(config.path_count);

    let mut terminal_returns = Vec::with_capacity(end - start);
    let mut paths = config.keep_paths.then(|| Vec::with_capacity(end - start));

    for path_idx in start..end {
        let mut rng = SeededRng::with_seed(derive_stream_seed(config.seed, path_idx as u64));
        if config.horizon == 1 {
            let draw = distribution.sample(&mut rng);
            terminal_returns.push(draw);
            if let Some(p) = paths.as_mut() {
                p.push(vec![draw]);
            }
        } else {
            let mut wealth = 1.0f64;
            let mut path = config.keep_paths.then(|| Vec::with_capacity(config.horizon));
            for _ in 0..config.horizon {
                let draw = distribution.sample(&mut rng);
                wealth *= 1.0 + draw;
                if let Some(p) = path.as_mut() {
                    p.push(draw);
                }
            }
            terminal_returns.push(wealth - 1.0);
            if let (Some(all), Some(p)) = (paths.as_mut(), path) {
                all.push(p);
            }
        }
    }

    ChunkOutput {
        terminal_returns,
        paths,
    }
}
