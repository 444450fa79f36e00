//! Platform - Browser Storage API Models
//!
//! TigerStyle: the two browser APIs the backends sit on, modelled in-process
//! so every availability and failure mode can be reproduced from a seed.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                 StorageEnvironment                     │
//! ├──────────────────────────┬────────────────────────────┤
//! │  ObjectDbFactory          │  KeyValueArea              │
//! │  (transactional, named    │  (string keys/values,      │
//! │   databases, versioned)   │   per-origin byte quota)   │
//! ├──────────────────────────┴────────────────────────────┤
//! │        FaultInjector (shared, roost-core)              │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! Either API may be missing (older engines), denied (privacy settings) or
//! present. Data lives in the environment, not in the backends, so a second
//! set of backends built from the same environment sees the same data, which
//! is how tests model a page reload.

mod kv_area;
mod object_db;

use std::sync::Arc;

use roost_core::dst::{FaultInjector, FaultType, SimClock, SimEnvironment};

use crate::constants::KEY_VALUE_QUOTA_BYTES_DEFAULT;
use crate::storage::{StorageError, StorageResult};

pub use kv_area::KeyValueArea;
pub use object_db::{ObjectDatabase, ObjectDbFactory, Record, Transaction, TransactionMode};

/// Whether a storage API exists and may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiSupport {
    /// API exists and is usable
    Present,
    /// API does not exist in this environment
    Missing,
    /// API exists but every access is refused
    Denied,
}

/// The storage APIs visible to the application in one environment.
#[derive(Debug, Clone)]
pub struct StorageEnvironment {
    structured: Option<Arc<ObjectDbFactory>>,
    key_value: Option<Arc<KeyValueArea>>,
}

impl StorageEnvironment {
    /// Environment with both APIs present, no faults.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::builder().build()
    }

    /// Environment with both APIs present, sharing a simulation's faults and clock.
    #[must_use]
    pub fn from_simulation(env: &SimEnvironment) -> Self {
        Self::builder()
            .with_faults(Arc::clone(&env.faults))
            .with_clock(env.clock.clone())
            .build()
    }

    /// Start building an environment.
    #[must_use]
    pub fn builder() -> StorageEnvironmentBuilder {
        StorageEnvironmentBuilder::default()
    }

    /// The object database factory, if the API exists.
    #[must_use]
    pub fn structured(&self) -> Option<Arc<ObjectDbFactory>> {
        self.structured.clone()
    }

    /// The key-value area, if the API exists.
    #[must_use]
    pub fn key_value(&self) -> Option<Arc<KeyValueArea>> {
        self.key_value.clone()
    }
}

/// Builder for `StorageEnvironment`.
#[derive(Debug)]
pub struct StorageEnvironmentBuilder {
    faults: Arc<FaultInjector>,
    clock: SimClock,
    structured: ApiSupport,
    key_value: ApiSupport,
    key_value_quota_bytes: usize,
}

impl Default for StorageEnvironmentBuilder {
    fn default() -> Self {
        Self {
            faults: Arc::new(FaultInjector::disabled()),
            clock: SimClock::new(),
            structured: ApiSupport::Present,
            key_value: ApiSupport::Present,
            key_value_quota_bytes: KEY_VALUE_QUOTA_BYTES_DEFAULT,
        }
    }
}

impl StorageEnvironmentBuilder {
    /// Share a fault injector with every store.
    #[must_use]
    pub fn with_faults(mut self, faults: Arc<FaultInjector>) -> Self {
        self.faults = faults;
        self
    }

    /// Stamp records with the given clock.
    #[must_use]
    pub fn with_clock(mut self, clock: SimClock) -> Self {
        self.clock = clock;
        self
    }

    /// Set support for the structured (object database) API.
    #[must_use]
    pub fn structured(mut self, support: ApiSupport) -> Self {
        self.structured = support;
        self
    }

    /// Set support for the key-value API.
    #[must_use]
    pub fn key_value(mut self, support: ApiSupport) -> Self {
        self.key_value = support;
        self
    }

    /// Set the key-value quota in bytes.
    #[must_use]
    pub fn key_value_quota_bytes(mut self, bytes: usize) -> Self {
        self.key_value_quota_bytes = bytes;
        self
    }

    /// Build the environment.
    #[must_use]
    pub fn build(self) -> StorageEnvironment {
        let structured = match self.structured {
            ApiSupport::Missing => None,
            support => Some(Arc::new(ObjectDbFactory::new(
                Arc::clone(&self.faults),
                self.clock.clone(),
                support == ApiSupport::Denied,
            ))),
        };
        let key_value = match self.key_value {
            ApiSupport::Missing => None,
            support => Some(Arc::new(KeyValueArea::new(
                Arc::clone(&self.faults),
                self.key_value_quota_bytes,
                support == ApiSupport::Denied,
            ))),
        };

        StorageEnvironment {
            structured,
            key_value,
        }
    }
}

/// What an operation should do after consulting the fault injector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FaultOutcome {
    Clear,
    Corrupt,
}

/// Roll for a fault on `operation` and map it to the error the real API raises.
pub(crate) fn roll_fault(faults: &FaultInjector, operation: &str) -> StorageResult<FaultOutcome> {
    match faults.should_inject(operation) {
        Some(fault) => fault_outcome(fault, operation),
        None => Ok(FaultOutcome::Clear),
    }
}

/// Map an injected fault to the error the real API raises.
pub(crate) fn fault_outcome(fault: FaultType, operation: &str) -> StorageResult<FaultOutcome> {
    let detail = format!("injected {} during {operation}", fault.as_str());
    match fault {
        FaultType::StorageCorruption => Ok(FaultOutcome::Corrupt),
        FaultType::StorageOpenFail => Err(StorageError::OpenFailed(detail)),
        FaultType::StorageAccessDenied => Err(StorageError::access_denied(operation)),
        FaultType::StorageReadFail => Err(StorageError::ReadFailed(detail)),
        FaultType::StorageWriteFail | FaultType::StorageCommitFail => {
            Err(StorageError::WriteFailed(detail))
        }
        FaultType::StorageQuotaExceeded | FaultType::BackupDeliveryFail => {
            Err(StorageError::simulated_fault(detail))
        }
    }
}
