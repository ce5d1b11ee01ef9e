use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

/// Picks bounded random subsets of candidate lists.
///
/// A seeded sampler replays the same choices for the same inputs.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: StdRng,
}

impl RandomSampler {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Independent sampler whose seed is drawn from this one.
    pub fn fork(&mut self) -> Self {
        Self::seeded(self.rng.random())
    }

    /// Uniform subset of `min(count, candidates.len())` items, without
    /// replacement. Order carries no meaning; `candidates` is left untouched.
    pub fn sample<T: Clone>(&mut self, candidates: &[T], count: usize) -> Vec<T> {
        candidates
            .choose_multiple(&mut self.rng, count)
            .cloned()
            .collect()
    }
}

impl Default for RandomSampler {
    fn default() -> Self {
        Self::new()
    }
}
