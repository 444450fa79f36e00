//! `DeterministicRng` - Seeded Random Number Generator
//!
//! TigerStyle: ChaCha20-based RNG so that every fault roll and every
//! generated payload is reproducible from one seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::constants::{DST_FORK_SEED_MULTIPLIER, DST_RANDOM_BYTES_COUNT_MAX};

/// A deterministic random number generator.
///
/// TigerStyle:
/// - Same seed always produces same sequence
/// - Fork creates independent streams (one per simulated store)
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    rng: ChaCha20Rng,
    seed: u64,
    fork_counter: u64,
}

impl DeterministicRng {
    /// Create a new RNG with the given seed.
    ///
    /// # Example
    /// ```
    /// use roost_core::dst::DeterministicRng;
    /// let mut rng = DeterministicRng::new(42);
    /// assert!(rng.next_float() < 1.0);
    /// ```
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            seed,
            fork_counter: 0,
        }
    }

    /// Get the original seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generate a random float in [0, 1).
    pub fn next_float(&mut self) -> f64 {
        let value = self.rng.gen::<f64>();

        // Postcondition
        assert!((0.0..1.0).contains(&value), "float must be in [0, 1)");
        value
    }

    /// Generate a random u64.
    pub fn next_u64(&mut self) -> u64 {
        self.rng.gen()
    }

    /// Generate a random usize in [min, max] (inclusive).
    ///
    /// # Panics
    /// Panics if min > max.
    pub fn next_usize(&mut self, min: usize, max: usize) -> usize {
        // Precondition
        assert!(min <= max, "min ({min}) must be <= max ({max})");

        self.rng.gen_range(min..=max)
    }

    /// Generate a random boolean with the given probability of true.
    ///
    /// # Panics
    /// Panics if probability is not in [0, 1].
    pub fn next_bool(&mut self, probability: f64) -> bool {
        // Precondition
        assert!(
            (0.0..=1.0).contains(&probability),
            "probability must be in [0, 1], got {probability}"
        );

        self.next_float() < probability
    }

    /// Choose a random element from a slice.
    ///
    /// # Panics
    /// Panics if the slice is empty.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        // Precondition
        assert!(!items.is_empty(), "cannot choose from empty slice");

        let index = self.next_usize(0, items.len() - 1);
        &items[index]
    }

    /// Create an independent fork of this RNG.
    ///
    /// Fork seeds are derived from the parent seed and a fork counter, so the
    /// n-th fork of a given seed is always the same stream.
    pub fn fork(&mut self) -> Self {
        self.fork_counter += 1;
        let fork_seed = self
            .seed
            .wrapping_add(self.fork_counter.wrapping_mul(DST_FORK_SEED_MULTIPLIER));

        Self::new(fork_seed)
    }

    /// Generate random bytes.
    ///
    /// # Panics
    /// Panics if `len` exceeds `DST_RANDOM_BYTES_COUNT_MAX`.
    pub fn next_bytes(&mut self, len: usize) -> Vec<u8> {
        // Precondition
        assert!(
            len <= DST_RANDOM_BYTES_COUNT_MAX,
            "len must be <= {DST_RANDOM_BYTES_COUNT_MAX}"
        );

        let mut bytes = vec![0u8; len];
        self.rng.fill(&mut bytes[..]);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(12345);

        for _ in 0..100 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_different_seeds_different_sequence() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(54321);

        let differs = (0..10).any(|_| rng1.next_u64() != rng2.next_u64());
        assert!(differs, "different seeds should produce different sequences");
    }

    #[test]
    fn test_next_bool_extremes() {
        let mut rng = DeterministicRng::new(42);

        for _ in 0..100 {
            assert!(!rng.next_bool(0.0));
            assert!(rng.next_bool(1.0));
        }
    }

    #[test]
    fn test_fork_is_reproducible() {
        let mut parent_a = DeterministicRng::new(42);
        let mut parent_b = DeterministicRng::new(42);

        let mut fork_a = parent_a.fork();
        let mut fork_b = parent_b.fork();

        assert_eq!(fork_a.seed(), fork_b.seed());
        assert_eq!(fork_a.next_bytes(16), fork_b.next_bytes(16));
    }

    #[test]
    fn test_forks_are_independent() {
        let mut rng = DeterministicRng::new(42);

        let fork1 = rng.fork();
        let fork2 = rng.fork();

        assert_ne!(fork1.seed(), fork2.seed());
    }

    #[test]
    fn test_choose_stays_in_slice() {
        let mut rng = DeterministicRng::new(7);
        let items = ["indexeddb", "localstorage"];

        for _ in 0..50 {
            assert!(items.contains(rng.choose(&items)));
        }
    }

    #[test]
    #[should_panic(expected = "probability must be in [0, 1]")]
    fn test_next_bool_invalid_probability() {
        let mut rng = DeterministicRng::new(42);
        rng.next_bool(1.5);
    }

    #[test]
    #[should_panic(expected = "cannot choose from empty slice")]
    fn test_choose_empty() {
        let mut rng = DeterministicRng::new(42);
        let items: Vec<i32> = vec![];
        rng.choose(&items);
    }
}
