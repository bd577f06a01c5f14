//! Reproducibility and statistical-consistency tests for the Monte Carlo
//! subsystem. Seed determinism is a hard contract here, not a nicety.

use risk_analytics::{
    AnalyticsError, GeneratingDistribution, JobStatus, MonteCarloSimulator, SimulationConfig,
};
use std::time::Duration;

fn standard_normal() -> GeneratingDistribution {
    GeneratingDistribution::Normal {
        mean: 0.0,
        std_dev: 1.0,
    }
}

#[test]
fn test_identical_seed_identical_run() {
    let sim = MonteCarloSimulator::new();
    let config = SimulationConfig {
        path_count: 10_000,
        seed: 42,
        ..Default::default()
    };
    let a = sim.simulate(&standard_normal(), &config).unwrap();
    let b = sim.simulate(&standard_normal(), &config).unwrap();
    // Byte-identical, not merely statistically close
    assert_eq!(a.terminal_returns, b.terminal_returns);
    assert_eq!(a, b);
}

#[test]
fn test_different_seed_distribution_consistent() {
    let sim = MonteCarloSimulator::new();
    let a = sim
        .simulate(
            &standard_normal(),
            &SimulationConfig {
                path_count: 100_000,
                seed: 42,
                ..Default::default()
            },
        )
        .unwrap();
    let b = sim
        .simulate(
            &standard_normal(),
            &SimulationConfig {
                path_count: 100_000,
                seed: 43,
                ..Default::default()
            },
        )
        .unwrap();

    assert_ne!(a.terminal_returns, b.terminal_returns);
    // Both samples agree with N(0,1) within a few standard errors
    for run in [&a, &b] {
        assert!(run.sample_mean().abs() < 0.05, "mean = {}", run.sample_mean());
        assert!(
            (run.sample_std_dev() - 1.0).abs() < 0.05,
            "std = {}",
            run.sample_std_dev()
        );
    }
}

#[test]
fn test_aggregate_invariant_to_partitioning() {
    let sim = MonteCarloSimulator::new();
    let base = SimulationConfig {
        path_count: 30_000,
        seed: 123,
        ..Default::default()
    };

    let variants = [
        SimulationConfig {
            chunk_size: 128,
            ..base.clone()
        },
        SimulationConfig {
            chunk_size: 9999,
            ..base.clone()
        },
        // Force parallel execution
        SimulationConfig {
            parallel_threshold: 1,
            ..base.clone()
        },
        // Force sequential execution
        SimulationConfig {
            parallel_threshold: usize::MAX,
            ..base.clone()
        },
    ];

    let reference = sim.simulate(&standard_normal(), &base).unwrap();
    for config in &variants {
        let run = sim.simulate(&standard_normal(), config).unwrap();
        assert_eq!(
            run.terminal_returns, reference.terminal_returns,
            "partitioning changed the aggregate (chunk {}, threshold {})",
            config.chunk_size, config.parallel_threshold
        );
    }
}

#[test]
fn test_student_t_runs_have_heavier_tails() {
    let sim = MonteCarloSimulator::new();
    let config = SimulationConfig {
        path_count: 100_000,
        seed: 5,
        ..Default::default()
    };
    let normal = sim.simulate(&standard_normal(), &config).unwrap();
    let heavy = sim
        .simulate(
            &GeneratingDistribution::StudentT {
                mean: 0.0,
                scale: 1.0,
                degrees_of_freedom: 4.0,
            },
            &config,
        )
        .unwrap();

    let tail_count = |run: &risk_analytics::SimulationRun| {
        run.terminal_returns.iter().filter(|r| r.abs() > 4.0).count()
    };
    assert!(
        tail_count(&heavy) > 5 * tail_count(&normal).max(1),
        "student-t tails: {} vs normal: {}",
        tail_count(&heavy),
        tail_count(&normal)
    );
}

#[test]
fn test_empirical_bootstrap_reproduces_sample_range() {
    let sample = vec![-0.03, -0.01, 0.0, 0.02, 0.05];
    let run = MonteCarloSimulator::new()
        .simulate(
            &GeneratingDistribution::Empirical {
                sample: sample.clone(),
            },
            &SimulationConfig {
                path_count: 10_000,
                seed: 9,
                ..Default::default()
            },
        )
        .unwrap();
    assert!(run.terminal_returns.iter().all(|r| sample.contains(r)));
    // Every sample value should appear in 10k draws
    for v in &sample {
        assert!(run.terminal_returns.contains(v));
    }
}

#[test]
fn test_job_result_reproduces_synchronous_run() {
    let engine = risk_analytics::AnalyticsEngine::default();
    let config = SimulationConfig {
        path_count: 8000,
        seed: 31,
        ..Default::default()
    };

    let job_id = engine.submit_monte_carlo(standard_normal(), config.clone());
    let status = engine.jobs().wait(job_id, Duration::from_secs(30)).unwrap();
    assert_eq!(status, JobStatus::Completed);

    let job_run = engine.job_result(job_id).unwrap();
    let direct = MonteCarloSimulator::new()
        .simulate(&standard_normal(), &config)
        .unwrap();
    assert_eq!(job_run.terminal_returns, direct.terminal_returns);
}

#[test]
fn test_cancelled_job_yields_no_output() {
    let engine = risk_analytics::AnalyticsEngine::default();
    let config = SimulationConfig {
        path_count: 20_000_000,
        chunk_size: 4096,
        parallel_threshold: usize::MAX,
        seed: 77,
        ..Default::default()
    };

    let job_id = engine.submit_monte_carlo(standard_normal(), config);
    engine.cancel_job(job_id).unwrap();

    let status = engine.jobs().wait(job_id, Duration::from_secs(60)).unwrap();
    assert_eq!(status, JobStatus::Cancelled);
    match engine.job_result(job_id) {
        Err(AnalyticsError::Cancelled { seed, .. }) => assert_eq!(seed, 77),
        other => panic!("expected Cancelled with seed context, got {:?}", other),
    }
}

#[test]
fn test_failure_carries_seed_and_parameters() {
    let result = MonteCarloSimulator::new().simulate(
        &GeneratingDistribution::Normal {
            mean: 0.0,
            std_dev: -1.0,
        },
        &SimulationConfig {
            seed: 1234,
            ..Default::default()
        },
    );
    let err = result.unwrap_err();
    // Parameter errors name the offending parameter and value
    let message = err.to_string();
    assert!(message.contains("std_dev"), "message: {}", message);
}
