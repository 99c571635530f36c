//! Per-fixture selection of detector mode

use fnv::FnvHasher;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hash::Hasher;

use crate::execution::ExecutionMode;

/// Decides, per fixture, whether the memory detector wraps the run.
///
/// Each decision is a Bernoulli trial drawn from an RNG seeded with the run
/// seed and the fixture name, so it does not depend on which worker handles the
/// fixture or in what order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorSampler {
    rate: f64,
    seed: u64,
}

impl DetectorSampler {
    /// `rate` must lie in [0, 1]; out-of-range values are clamped.
    pub fn new(rate: f64, seed: u64) -> Self {
        Self { rate: rate.clamp(0.0, 1.0), seed }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn mode_for(&self, fixture_name: &str) -> ExecutionMode {
        if self.should_check(fixture_name) {
            ExecutionMode::Detector
        } else {
            ExecutionMode::Plain
        }
    }

    pub fn should_check(&self, fixture_name: &str) -> bool {
        if self.rate >= 1.0 {
            return true;
        }
        if self.rate <= 0.0 {
            return false;
        }

        let mut hasher = FnvHasher::with_key(self.seed);
        hasher.write(fixture_name.as_bytes());
        let mut rng = StdRng::seed_from_u64(hasher.finish());
        rng.gen_bool(self.rate)
    }
}
