//! Simulation - DST Test Harness
//!
//! TigerStyle: one seed builds the clock, the RNG streams and the shared
//! fault injector that every simulated store in a run draws from.

use std::future::Future;
use std::sync::Arc;

use super::clock::SimClock;
use super::config::SimConfig;
use super::fault::{FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType};
use super::rng::DeterministicRng;

/// Environment provided to simulation tests.
pub struct SimEnvironment {
    /// Simulation configuration
    pub config: SimConfig,
    /// Simulated clock
    pub clock: SimClock,
    /// Deterministic RNG for test-side randomness
    pub rng: DeterministicRng,
    /// Fault injector shared by every store built from this environment
    pub faults: Arc<FaultInjector>,
}

impl SimEnvironment {
    /// Advance simulated time in milliseconds.
    pub fn advance_time_ms(&self, ms: u64) -> u64 {
        self.clock.advance_ms(ms)
    }

    /// Get current simulated time in milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

/// DST simulation harness.
///
/// # Example
///
/// ```rust
/// use roost_core::dst::{FaultConfig, FaultType, SimConfig, Simulation};
///
/// let env = Simulation::new(SimConfig::with_seed(42))
///     .with_fault(FaultConfig::new(FaultType::StorageQuotaExceeded, 1.0).with_filter("kv_write"))
///     .build();
///
/// assert_eq!(env.config.seed(), 42);
/// assert!(env.faults.is_armed());
/// ```
pub struct Simulation {
    config: SimConfig,
    fault_configs: Vec<FaultConfig>,
}

impl Simulation {
    /// Create a new simulation with the given configuration.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            fault_configs: Vec::new(),
        }
    }

    /// Register a fault to inject during simulation.
    #[must_use]
    pub fn with_fault(mut self, fault_config: FaultConfig) -> Self {
        self.fault_configs.push(fault_config);
        self
    }

    /// Add read and write faults on every store.
    #[must_use]
    pub fn with_storage_faults(self, probability: f64) -> Self {
        self.with_fault(FaultConfig::new(FaultType::StorageWriteFail, probability).with_filter("write"))
            .with_fault(FaultConfig::new(FaultType::StorageReadFail, probability).with_filter("read"))
    }

    /// Run the simulation with the given test function.
    ///
    /// # Errors
    /// Returns any error from the test function.
    pub async fn run<F, Fut, E>(self, test_fn: F) -> Result<(), E>
    where
        F: FnOnce(SimEnvironment) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let seed = self.config.seed();
        let env = self.build();
        let result = test_fn(env).await;

        if result.is_err() {
            tracing::warn!(seed, "simulation failed (replay with DST_SEED={seed})");
        }
        result
    }

    /// Build the simulation environment without running a test.
    #[must_use]
    pub fn build(self) -> SimEnvironment {
        let mut rng = DeterministicRng::new(self.config.seed());

        let faults = self
            .fault_configs
            .into_iter()
            .fold(FaultInjectorBuilder::new(rng.fork()), FaultInjectorBuilder::with_fault)
            .build();

        SimEnvironment {
            config: self.config,
            clock: SimClock::new(),
            rng,
            faults: Arc::new(faults),
        }
    }
}

/// Create a simulation with an explicit seed, or one from `DST_SEED`/random.
#[must_use]
pub fn create_simulation(seed: Option<u64>) -> Simulation {
    let config = seed.map_or_else(SimConfig::from_env_or_random, SimConfig::with_seed);
    Simulation::new(config)
}
