//! Exponential backoff and level-geometric RNG (C2).

use ordered_set_core::MAX_BACKOFF;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint;

/// Spins for roughly `O(attempt)` cycles, capped at [`MAX_BACKOFF`].
///
/// Used after a contention-induced restart in the skip-list and BST
/// traversals, mirroring `optik.c`'s `cpause(rand() % (nr << 1))` pattern
/// without the syscall-weight of an actual thread yield.
pub fn backoff(attempt: u32) {
    let spins = attempt.saturating_mul(16).min(MAX_BACKOFF);
    for _ in 0..spins {
        hint::spin_loop();
    }
}

/// Per-set random level generator for skip-list towers.
///
/// Samples a geometric distribution with parameter 1/2 (spec.md §4.2),
/// capped at `max_level`. Grounded in `ferrisdb-storage`'s
/// `SkipList::random_height`, which protects a `StdRng` behind a
/// `parking_lot::Mutex` so the RNG itself needs no atomics; we generalize
/// its branching factor from 1/4 to 1/2 and its cap from `MAX_HEIGHT = 12`
/// to the spec's `MAX_LEVEL = 64`.
pub struct LevelRng {
    rng: Mutex<StdRng>,
    max_level: usize,
}

impl LevelRng {
    /// Creates a generator seeded from system entropy.
    pub fn new(max_level: usize) -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            max_level,
        }
    }

    /// Creates a generator with a fixed seed, for reproducible tests and
    /// benchmarks.
    pub fn with_seed(max_level: usize, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            max_level,
        }
    }

    /// Draws a tower height in `[1, max_level]`.
    pub fn random_level(&self) -> usize {
        let mut level = 1;
        let mut rng = self.rng.lock();
        while level < self.max_level && rng.gen_ratio(1, 2) {
            level += 1;
        }
        level
    }
}
