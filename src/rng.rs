//! Seeded random number generation for reproducible simulation.
//!
//! All stochastic output in this crate flows through [`SeededRng`], a
//! ChaCha20-backed generator. Identical seeds produce identical streams,
//! which upgrades reproducibility from a debugging convenience to a
//! correctness contract: a [`crate::montecarlo::SimulationRun`] must be
//! byte-identical when rerun with the same seed and parameters.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, StandardNormal};

/// Seeded pseudo-random generator used by all simulation paths.
///
/// Wraps ChaCha20, seeded through `seed_from_u64` which cryptographically
/// expands the 64-bit seed into the full 256-bit generator state.
#[derive(Clone, Debug)]
pub struct SeededRng {
    rng: ChaCha20Rng,
    seed: u64,
}

impl SeededRng {
    /// Create a generator from an explicit seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Create a generator from OS entropy, reporting the seed that was
    /// drawn so the run remains reproducible after the fact.
    pub fn from_entropy() -> Self {
        let seed = ChaCha20Rng::from_entropy().gen::<u64>();
        Self::with_seed(seed)
    }

    /// The seed this generator was constructed with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generate a random f64 in [0, 1).
    pub fn f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Generate a random index in the given range (no modulo bias).
    pub fn usize(&mut self, range: std::ops::Range<usize>) -> usize {
        self.rng.gen_range(range)
    }

    /// Draw from the standard normal distribution.
    pub fn standard_normal(&mut self) -> f64 {
        StandardNormal.sample(&mut self.rng)
    }

    /// Draw from a Student-t distribution with the given degrees of freedom.
    pub fn student_t(&mut self, degrees_of_freedom: f64) -> f64 {
        // rand_distr validates df > 0 at construction; callers validate first
        rand_distr::StudentT::new(degrees_of_freedom)
            .expect("degrees of freedom validated by caller")
            .sample(&mut self.rng)
    }

    /// Fill a buffer with uniform [0, 1) draws.
    pub fn fill_f64(&mut self, buffer: &mut [f64]) {
        for value in buffer.iter_mut() {
            *value = self.rng.gen::<f64>();
        }
    }
}

/// Derive an independent stream seed from a master seed and a stream index.
///
/// Uses the SplitMix64 finalizer so adjacent chunk indices map to
/// statistically independent ChaCha20 seeds. Chunked Monte Carlo
/// generation seeds chunk `i` with `derive_stream_seed(master, i)`, making
/// the aggregate output a pure function of `(master, chunk_size)` and
/// insensitive to how many workers execute the chunks.
pub fn derive_stream_seed(master_seed: u64, stream_index: u64) -> u64 {
    let mut z = master_seed
        .wrapping_add(stream_index.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
