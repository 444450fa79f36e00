//! Roost Core - Deterministic Simulation for Client-Side Storage
//!
//! TigerStyle simulation-first primitives shared by the roost storage layer.
//!
//! # Philosophy
//!
//! > "If a storage backend can fail, the test harness must be able to make it fail."
//!
//! Browser storage APIs are individually unreliable: they may be missing,
//! blocked by privacy settings, out of quota, or fail mid-transaction. Every
//! storage model in `roost-storage` routes its I/O through a shared
//! [`FaultInjector`](dst::FaultInjector) so those failures are reproducible
//! from a single seed.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Roost Core                     │
//! ├─────────────────────────────────────────────┤
//! │  DeterministicRng       │ ChaCha20, forkable│
//! │  SimClock               │ Controlled time   │
//! │  FaultInjector          │ Storage faults    │
//! │  Simulation             │ Seeded harness    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use roost_core::dst::{FaultConfig, FaultType, SimConfig, Simulation};
//!
//! let env = Simulation::new(SimConfig::with_seed(42))
//!     .with_fault(FaultConfig::new(FaultType::StorageWriteFail, 1.0).with_filter("kv_write"))
//!     .build();
//!
//! assert_eq!(env.faults.should_inject("kv_write"), Some(FaultType::StorageWriteFail));
//! assert_eq!(env.faults.should_inject("kv_read"), None);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
pub mod dst;

pub use constants::*;
pub use dst::{
    create_simulation, DeterministicRng, FaultConfig, FaultInjector, FaultInjectorBuilder,
    FaultType, SimClock, SimConfig, SimEnvironment, Simulation,
};
