//! Held-out coverage validation for forecast confidence bands.
//!
//! Rolling-origin evaluation on a seeded random walk with drift: the
//! fraction of held-out observations falling inside the band should
//! approximate the stated confidence level.

use risk_analytics::{SampleSeries, SeededRng, TimeSeriesForecaster};

/// Random walk with drift, deterministic for a given seed.
fn random_walk(n: usize, drift: f64, noise_std: f64, seed: u64) -> Vec<f64> {
    let mut rng = SeededRng::with_seed(seed);
    let mut level = 100.0;
    let mut values = Vec::with_capacity(n);
    for _ in 0..n {
        level += drift + noise_std * rng.standard_normal();
        values.push(level);
    }
    values
}

/// Rolling-origin coverage of the h-step band at one confidence level.
fn band_coverage(values: &[f64], horizon: usize, confidence: f64) -> f64 {
    let forecaster = TimeSeriesForecaster::default();
    let mut inside = 0usize;
    let mut total = 0usize;

    let mut origin = 100;
    while origin + horizon <= values.len() {
        let history = SampleSeries::new(values[..origin].to_vec()).unwrap();
        let forecast = forecaster.forecast(&history, horizon, confidence).unwrap();
        for (step, point) in forecast.points.iter().enumerate() {
            let actual = values[origin + step];
            if actual >= point.lower && actual <= point.upper {
                inside += 1;
            }
            total += 1;
        }
        origin += 5;
    }

    inside as f64 / total as f64
}

#[test]
fn test_95_percent_band_coverage() {
    let values = random_walk(400, 0.2, 1.0, 2024);
    let coverage = band_coverage(&values, 4, 0.95);
    assert!(
        (0.85..=1.0).contains(&coverage),
        "95% band covered {:.1}% of held-out points",
        coverage * 100.0
    );
}

#[test]
fn test_80_percent_band_coverage() {
    let values = random_walk(400, 0.1, 1.5, 7);
    let coverage = band_coverage(&values, 3, 0.80);
    assert!(
        (0.65..=0.97).contains(&coverage),
        "80% band covered {:.1}% of held-out points",
        coverage * 100.0
    );
}

#[test]
fn test_wider_confidence_covers_more() {
    let values = random_walk(350, 0.15, 1.2, 11);
    let narrow = band_coverage(&values, 3, 0.60);
    let wide = band_coverage(&values, 3, 0.99);
    assert!(
        wide > narrow,
        "99% coverage {:.2} should exceed 60% coverage {:.2}",
        wide,
        narrow
    );
    assert!(wide > 0.9);
}
