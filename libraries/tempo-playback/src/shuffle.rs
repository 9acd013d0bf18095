//! Seeded shuffle order
//!
//! Shuffle order is derived from a string key so that the same key and list
//! length always give the same permutation. The generator is the classic
//! `frac(sin(n) * 10000)` sequence seeded by a 31-multiplier string hash;
//! it is reproducible, not random in any statistical sense.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Deterministic pseudo-random sequence keyed by a string
#[derive(Debug, Clone)]
pub struct SeededRandom {
    state: f64,
}

impl SeededRandom {
    /// Create a generator seeded from `seed`
    pub fn new(seed: &str) -> Self {
        Self {
            state: f64::from(hash_seed(seed)),
        }
    }

    /// Next value in `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        let x = self.state.sin() * 10_000.0;
        self.state += 1.0;
        x - x.floor()
    }
}

/// 32-bit signed polynomial hash over UTF-16 code units
///
/// `hash = hash * 31 + unit`, wrapping at every step.
pub fn hash_seed(seed: &str) -> i32 {
    seed.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_mul(31).wrapping_add(i32::from(unit))
    })
}

/// Fisher-Yates permutation of `0..length` driven by [`SeededRandom`]
///
/// Swaps run from the last index down to 1, each with
/// `j = floor(random * (i + 1))`.
pub fn shuffled_indices(length: usize, seed: &str) -> Vec<usize> {
    let mut random = SeededRandom::new(seed);
    let mut indices: Vec<usize> = (0..length).collect();

    for i in (1..length).rev() {
        let j = (random.next_f64() * (i + 1) as f64).floor() as usize;
        indices.swap(i, j.min(i));
    }

    indices
}

/// Fresh shuffle key for turning shuffle on
pub fn generate_shuffle_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}
