//! `FaultInjector` - Probabilistic Fault Injection
//!
//! TigerStyle: explicit fault injection for the storage APIs a browser may
//! refuse, throttle or break.

use std::collections::HashMap;
use std::sync::Mutex;

use super::rng::DeterministicRng;
use crate::constants::DST_FAULT_PROBABILITY_MAX;

/// Types of faults that can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultType {
    /// Opening the underlying store fails (e.g. private browsing mode)
    StorageOpenFail,
    /// Access to the store is denied by the environment
    StorageAccessDenied,
    /// Read operation fails
    StorageReadFail,
    /// Write operation fails
    StorageWriteFail,
    /// Transaction commit aborts; nothing from the transaction is applied
    StorageCommitFail,
    /// Quota exceeded while writing
    StorageQuotaExceeded,
    /// Written data is silently garbled
    StorageCorruption,
    /// Delivering a backup archive to the user fails
    BackupDeliveryFail,
}

impl FaultType {
    /// Get the fault type name as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StorageOpenFail => "storage_open_fail",
            Self::StorageAccessDenied => "storage_access_denied",
            Self::StorageReadFail => "storage_read_fail",
            Self::StorageWriteFail => "storage_write_fail",
            Self::StorageCommitFail => "storage_commit_fail",
            Self::StorageQuotaExceeded => "storage_quota_exceeded",
            Self::StorageCorruption => "storage_corruption",
            Self::BackupDeliveryFail => "backup_delivery_fail",
        }
    }
}

/// Configuration for a specific fault.
#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// The type of fault
    pub fault_type: FaultType,
    /// Probability of injection (0.0 to 1.0)
    pub probability: f64,
    /// Optional operation filter (substring match)
    pub operation_filter: Option<String>,
    /// Maximum number of injections (None = unlimited)
    pub max_injections: Option<u64>,
}

impl FaultConfig {
    /// Create a new fault configuration.
    ///
    /// # Panics
    /// Panics if probability is not in [0, 1].
    #[must_use]
    pub fn new(fault_type: FaultType, probability: f64) -> Self {
        // Precondition
        assert!(
            (0.0..=DST_FAULT_PROBABILITY_MAX).contains(&probability),
            "probability must be in [0, {DST_FAULT_PROBABILITY_MAX}], got {probability}"
        );

        Self {
            fault_type,
            probability,
            operation_filter: None,
            max_injections: None,
        }
    }

    /// Restrict the fault to operations whose name contains `filter`.
    ///
    /// Operation names are `<store>_<verb>`, e.g. `structured_commit` or
    /// `kv_write`.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.operation_filter = Some(filter.into());
        self
    }

    /// Set maximum number of injections.
    ///
    /// # Panics
    /// Panics if `max` is zero.
    #[must_use]
    pub fn with_max_injections(mut self, max: u64) -> Self {
        // Precondition
        assert!(max > 0, "max_injections must be positive");
        self.max_injections = Some(max);
        self
    }

    fn matches(&self, operation: &str) -> bool {
        self.operation_filter
            .as_deref()
            .map_or(true, |filter| operation.contains(filter))
    }
}

/// Fault injector shared (via `Arc`) by every simulated store in a run.
///
/// Registration happens before sharing; rolls and counters use interior
/// mutability so `should_inject` works through `&self`.
#[derive(Debug)]
pub struct FaultInjector {
    rng: Mutex<DeterministicRng>,
    configs: Vec<FaultConfig>,
    injection_counts: Mutex<HashMap<FaultType, u64>>,
}

impl FaultInjector {
    /// Create a new fault injector with the given RNG.
    #[must_use]
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            configs: Vec::new(),
            injection_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Create an injector that never injects anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(DeterministicRng::new(0))
    }

    /// Register a fault configuration.
    pub fn register(&mut self, config: FaultConfig) {
        self.injection_counts
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(config.fault_type)
            .or_insert(0);
        self.configs.push(config);
    }

    /// Check if a fault should be injected for the given operation.
    ///
    /// Configs are consulted in registration order; the first one that
    /// matches the operation, has budget left and wins its roll is returned.
    pub fn should_inject(&self, operation: &str) -> Option<FaultType> {
        let mut counts = self
            .injection_counts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        for config in &self.configs {
            if !config.matches(operation) {
                continue;
            }

            let count = counts.get(&config.fault_type).copied().unwrap_or(0);
            if config.max_injections.is_some_and(|max| count >= max) {
                continue;
            }

            if rng.next_bool(config.probability) {
                *counts.entry(config.fault_type).or_insert(0) += 1;
                tracing::debug!(
                    operation,
                    fault = config.fault_type.as_str(),
                    "fault injected"
                );
                return Some(config.fault_type);
            }
        }

        None
    }

    /// Whether any fault is registered at all.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        !self.configs.is_empty()
    }

    /// Get injection counts keyed by fault name.
    #[must_use]
    pub fn injection_stats(&self) -> HashMap<String, u64> {
        self.injection_counts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|(fault_type, count)| (fault_type.as_str().to_string(), *count))
            .collect()
    }

    /// Get total number of injections.
    #[must_use]
    pub fn total_injections(&self) -> u64 {
        self.injection_counts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .sum()
    }
}

/// Builder for `FaultInjector`.
///
/// TigerStyle: configure completely, then wrap in `Arc` and share.
pub struct FaultInjectorBuilder {
    rng: DeterministicRng,
    configs: Vec<FaultConfig>,
}

impl FaultInjectorBuilder {
    /// Create a new builder with the given RNG.
    #[must_use]
    pub fn new(rng: DeterministicRng) -> Self {
        Self {
            rng,
            configs: Vec::new(),
        }
    }

    /// Add a fault configuration.
    #[must_use]
    pub fn with_fault(mut self, config: FaultConfig) -> Self {
        self.configs.push(config);
        self
    }

    /// Add read and write faults at the given probability on every store.
    #[must_use]
    pub fn with_storage_faults(self, probability: f64) -> Self {
        self.with_fault(FaultConfig::new(FaultType::StorageWriteFail, probability).with_filter("write"))
            .with_fault(FaultConfig::new(FaultType::StorageReadFail, probability).with_filter("read"))
    }

    /// Build the `FaultInjector`.
    #[must_use]
    pub fn build(self) -> FaultInjector {
        let mut injector = FaultInjector::new(self.rng);
        for config in self.configs {
            injector.register(config);
        }
        injector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_no_faults_registered() {
        let injector = FaultInjector::disabled();

        assert!(!injector.is_armed());
        for _ in 0..100 {
            assert!(injector.should_inject("structured_commit").is_none());
        }
    }

    #[test]
    fn test_always_inject() {
        let mut injector = FaultInjector::new(DeterministicRng::new(42));
        injector.register(FaultConfig::new(FaultType::StorageWriteFail, 1.0));

        for _ in 0..10 {
            assert_eq!(
                injector.should_inject("kv_write"),
                Some(FaultType::StorageWriteFail)
            );
        }
    }

    #[test]
    fn test_operation_filter() {
        let mut injector = FaultInjector::new(DeterministicRng::new(42));
        injector.register(FaultConfig::new(FaultType::StorageOpenFail, 1.0).with_filter("structured_open"));

        assert_eq!(
            injector.should_inject("structured_open"),
            Some(FaultType::StorageOpenFail)
        );
        assert!(injector.should_inject("kv_open").is_none());
    }

    #[test]
    fn test_max_injections() {
        let mut injector = FaultInjector::new(DeterministicRng::new(42));
        injector.register(FaultConfig::new(FaultType::StorageCommitFail, 1.0).with_max_injections(2));

        assert!(injector.should_inject("structured_commit").is_some());
        assert!(injector.should_inject("structured_commit").is_some());
        assert!(injector.should_inject("structured_commit").is_none());
        assert_eq!(injector.total_injections(), 2);
    }

    #[test]
    fn test_first_matching_config_wins() {
        let injector = FaultInjectorBuilder::new(DeterministicRng::new(1))
            .with_fault(FaultConfig::new(FaultType::StorageQuotaExceeded, 1.0).with_filter("kv_write"))
            .with_fault(FaultConfig::new(FaultType::StorageWriteFail, 1.0))
            .build();

        assert_eq!(
            injector.should_inject("kv_write"),
            Some(FaultType::StorageQuotaExceeded)
        );
        assert_eq!(
            injector.should_inject("structured_write"),
            Some(FaultType::StorageWriteFail)
        );
    }

    #[test]
    fn test_injection_stats() {
        let injector = FaultInjectorBuilder::new(DeterministicRng::new(42))
            .with_fault(FaultConfig::new(FaultType::StorageReadFail, 1.0))
            .build();

        injector.should_inject("kv_read");
        injector.should_inject("kv_read");

        let stats = injector.injection_stats();
        assert_eq!(stats.get("storage_read_fail"), Some(&2));
    }

    #[test]
    fn test_storage_faults_respect_verbs() {
        let injector = FaultInjectorBuilder::new(DeterministicRng::new(3))
            .with_storage_faults(1.0)
            .build();

        assert_eq!(
            injector.should_inject("kv_write"),
            Some(FaultType::StorageWriteFail)
        );
        assert_eq!(
            injector.should_inject("structured_read"),
            Some(FaultType::StorageReadFail)
        );
        assert!(injector.should_inject("structured_open").is_none());
    }

    #[test]
    fn test_arc_sharing() {
        let injector = Arc::new(
            FaultInjectorBuilder::new(DeterministicRng::new(42))
                .with_fault(FaultConfig::new(FaultType::BackupDeliveryFail, 1.0))
                .build(),
        );
        let shared = Arc::clone(&injector);

        assert!(injector.should_inject("backup_deliver").is_some());
        assert!(shared.should_inject("backup_deliver").is_some());
        assert_eq!(injector.total_injections(), 2);
    }

    #[test]
    #[should_panic(expected = "probability must be in")]
    fn test_invalid_probability() {
        let _ = FaultConfig::new(FaultType::StorageWriteFail, 1.5);
    }

    #[test]
    #[should_panic(expected = "max_injections must be positive")]
    fn test_invalid_max_injections() {
        let _ = FaultConfig::new(FaultType::StorageWriteFail, 0.5).with_max_injections(0);
    }

    #[test]
    fn test_fault_type_as_str() {
        assert_eq!(FaultType::StorageCommitFail.as_str(), "storage_commit_fail");
        assert_eq!(FaultType::BackupDeliveryFail.as_str(), "backup_delivery_fail");
    }
}
