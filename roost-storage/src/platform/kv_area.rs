//! Key-Value Area - Quota-Bounded String Store
//!
//! `TigerStyle`: string keys to string values, synchronous, with a byte quota
//! counted over keys plus values.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use roost_core::dst::{FaultInjector, FaultType};

use crate::storage::{StorageError, StorageResult};

use super::{fault_outcome, roll_fault, FaultOutcome};

/// A per-origin key-value area.
#[derive(Debug)]
pub struct KeyValueArea {
    items: RwLock<BTreeMap<String, String>>,
    faults: Arc<FaultInjector>,
    quota_bytes: usize,
    denied: bool,
}

impl KeyValueArea {
    pub(crate) fn new(faults: Arc<FaultInjector>, quota_bytes: usize, denied: bool) -> Self {
        assert!(quota_bytes > 0, "quota must be positive");

        Self {
            items: RwLock::new(BTreeMap::new()),
            faults,
            quota_bytes,
            denied,
        }
    }

    fn check_access(&self) -> StorageResult<()> {
        if self.denied {
            return Err(StorageError::access_denied("key-value area"));
        }
        Ok(())
    }

    /// Read a value.
    ///
    /// # Errors
    /// `AccessDenied` or an injected read fault.
    pub fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.check_access()?;
        let outcome = roll_fault(&self.faults, "kv_read")?;

        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        let value = items.get(key).cloned();
        if outcome == FaultOutcome::Corrupt {
            return Ok(value.map(|v| {
                String::from_utf8_lossy(&v.as_bytes()[..v.len() / 2]).into_owned()
            }));
        }
        Ok(value)
    }

    /// Store a value, replacing any previous one.
    ///
    /// # Errors
    /// `AccessDenied`, `QuotaExceeded`, or an injected write fault.
    pub fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check_access()?;
        if let Some(fault) = self.faults.should_inject("kv_write") {
            if fault == FaultType::StorageQuotaExceeded {
                tracing::debug!(key, "injected quota failure");
                return Err(StorageError::QuotaExceeded {
                    required: self.used_bytes() + key.len() + value.len(),
                    quota: self.quota_bytes,
                });
            }
            fault_outcome(fault, "kv_write")?;
        }

        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let current: usize = items.iter().map(|(k, v)| k.len() + v.len()).sum();
        let replaced = items.get(key).map_or(0, |v| key.len() + v.len());
        let required = current - replaced + key.len() + value.len();
        if required > self.quota_bytes {
            return Err(StorageError::QuotaExceeded {
                required,
                quota: self.quota_bytes,
            });
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Remove a value. Removing a missing key is not an error.
    ///
    /// # Errors
    /// `AccessDenied` or an injected write fault.
    pub fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.check_access()?;
        roll_fault(&self.faults, "kv_write")?;
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    /// All keys starting with `prefix`, sorted.
    ///
    /// # Errors
    /// `AccessDenied` or an injected read fault.
    pub fn keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.check_access()?;
        roll_fault(&self.faults, "kv_read")?;
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        Ok(items
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    /// Bytes currently counted against the quota.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    /// Quota in bytes.
    #[must_use]
    pub fn quota_bytes(&self) -> usize {
        self.quota_bytes
    }

    /// Number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the area holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
