//! `SimConfig` - Simulation Configuration
//!
//! TigerStyle: one seed per run, logged so a failing run can be replayed.

use std::env;

use rand::Rng;

use crate::constants::DST_SEED_ENV_VAR;

/// Configuration for a simulation run.
///
/// Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    seed: u64,
}

impl SimConfig {
    /// Create config with explicit seed.
    ///
    /// # Example
    /// ```
    /// use roost_core::dst::SimConfig;
    /// let config = SimConfig::with_seed(12345);
    /// assert_eq!(config.seed(), 12345);
    /// ```
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// Create config from `DST_SEED` or a fresh random seed.
    ///
    /// A random seed is logged so the run can be replayed with
    /// `DST_SEED=<seed>`.
    ///
    /// # Panics
    /// Panics if `DST_SEED` is set but is not a valid u64.
    #[must_use]
    pub fn from_env_or_random() -> Self {
        let seed = match env::var(DST_SEED_ENV_VAR) {
            Ok(seed_str) => seed_str.parse::<u64>().unwrap_or_else(|_| {
                panic!("{DST_SEED_ENV_VAR} must be a valid u64, got: {seed_str}")
            }),
            Err(_) => {
                let seed = rand::thread_rng().gen::<u64>();
                tracing::info!(seed, "DST: generated random seed (replay with DST_SEED={seed})");
                seed
            }
        };

        Self::with_seed(seed)
    }

    /// Get the seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::from_env_or_random()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_seed() {
        assert_eq!(SimConfig::with_seed(0).seed(), 0);
        assert_eq!(SimConfig::with_seed(u64::MAX).seed(), u64::MAX);
    }

    #[test]
    fn test_configs_with_same_seed_are_equal() {
        assert_eq!(SimConfig::with_seed(9), SimConfig::with_seed(9));
        assert_ne!(SimConfig::with_seed(9), SimConfig::with_seed(10));
    }
}
