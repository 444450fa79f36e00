//! DST - Deterministic Simulation Testing
//!
//! Seeded RNG, simulated time and fault injection for storage models.
//!
//! # Usage
//!
//! ```rust
//! use roost_core::dst::{FaultConfig, FaultType, SimConfig, Simulation};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let sim = Simulation::new(SimConfig::with_seed(42))
//!     .with_fault(FaultConfig::new(FaultType::StorageOpenFail, 1.0).with_filter("structured_open"));
//!
//! sim.run(|env| async move {
//!     assert!(env.faults.should_inject("structured_open").is_some());
//!     Ok::<(), String>(())
//! })
//! .await
//! .unwrap();
//! # }
//! ```
//!
//! Run with explicit seed for reproducibility:
//! ```bash
//! DST_SEED=12345 cargo test
//! ```

mod clock;
mod config;
mod fault;
mod rng;
mod simulation;

pub use clock::SimClock;
pub use config::SimConfig;
pub use fault::{FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType};
pub use rng::DeterministicRng;
pub use simulation::{create_simulation, SimEnvironment, Simulation};
