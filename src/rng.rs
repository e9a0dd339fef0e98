//! Seedable random number generator for retransmit jitter.
//!
//! When a seed is provided via [`Config::rng_seed`](crate::Config::rng_seed),
//! retransmit intervals become deterministic, which the tests rely on.

use rand::distributions::{Distribution, Standard};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Total spread of the jitter factor, centered on 1.0.
const JITTER_RANGE: f32 = 0.25;

pub(crate) struct SeededRng {
    inner: Option<StdRng>,
}

impl SeededRng {
    /// Seeded when `seed` is `Some`, otherwise backed by the thread-local RNG.
    pub fn new(seed: Option<u64>) -> Self {
        let inner = seed.map(StdRng::seed_from_u64);
        Self { inner }
    }

    pub fn random<T>(&mut self) -> T
    where
        Standard: Distribution<T>,
    {
        match self.inner.as_mut() {
            Some(rng) => rng.gen(),
            None => rand::random(),
        }
    }

    /// A factor between 0.875 and 1.125.
    pub fn jitter_factor(&mut self) -> f32 {
        1.0 + self.random::<f32>() * JITTER_RANGE - (JITTER_RANGE / 2.0)
    }
}

impl std::fmt::Debug for SeededRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeededRng")
            .field("seeded", &self.inner.is_some())
            .finish()
    }
}
