//! Backend Registry - Probing and Priority Selection
//!
//! `TigerStyle`: every backend is probed once when added; the result is
//! recorded and only `mark_unavailable` can change it afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;

use crate::storage::Backend;
use crate::telemetry::{StorageEvent, TelemetrySink};

/// Resolved availability of one candidate slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Probed usable and not overridden
    Available,
    /// Usable or not, an override excludes it
    ForcedUnavailable,
    /// Probe failed, backend never added, or marked unusable
    Unavailable,
}

impl Availability {
    /// Whether the slot may be selected.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// One position in the priority list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSlot {
    /// Backend name
    pub backend: String,
    /// Override forcing this slot unavailable
    pub forced_unavailable: bool,
}

impl CandidateSlot {
    /// Slot for `backend` with no override.
    #[must_use]
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            forced_unavailable: false,
        }
    }

    /// Set the override.
    #[must_use]
    pub fn forced_unavailable(mut self, forced: bool) -> Self {
        self.forced_unavailable = forced;
        self
    }
}

struct Registered {
    backend: Arc<dyn Backend>,
    available: bool,
}

/// Probed backends by name.
pub struct BackendRegistry {
    backends: HashMap<String, Registered>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self
            .backends
            .iter()
            .map(|(name, r)| (name.as_str(), r.available))
            .collect();
        names.sort_unstable();
        f.debug_struct("BackendRegistry").field("backends", &names).finish()
    }
}

impl BackendRegistry {
    /// Create an empty registry reporting to `telemetry`.
    #[must_use]
    pub fn new(telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            backends: HashMap::new(),
            telemetry,
        }
    }

    fn record(&mut self, backend: Arc<dyn Backend>, available: bool) {
        let name = backend.name().to_string();
        assert!(!name.is_empty(), "backend name must not be empty");

        if available {
            tracing::info!(backend = %name, "backend available");
        } else {
            tracing::warn!(backend = %name, "backend not supported");
            self.telemetry.track(StorageEvent::BackendUnsupported {
                backend: name.clone(),
            });
        }
        self.backends.insert(name, Registered { backend, available });
    }

    /// Probe and record one backend.
    pub async fn add_backend(&mut self, backend: Arc<dyn Backend>) -> bool {
        let available = backend.probe().await;
        self.record(backend, available);
        available
    }

    /// Probe several backends concurrently and record them all.
    ///
    /// Results are in input order.
    pub async fn add_backends(&mut self, backends: Vec<Arc<dyn Backend>>) -> Vec<bool> {
        let results = join_all(backends.iter().map(|backend| backend.probe())).await;
        debug_assert_eq!(results.len(), backends.len());

        for (backend, available) in backends.into_iter().zip(results.iter().copied()) {
            self.record(backend, available);
        }
        results
    }

    /// Availability of one slot.
    #[must_use]
    pub fn availability(&self, slot: &CandidateSlot) -> Availability {
        if slot.forced_unavailable {
            return Availability::ForcedUnavailable;
        }
        match self.backends.get(&slot.backend) {
            Some(registered) if registered.available => Availability::Available,
            Some(_) => Availability::Unavailable,
            None => {
                tracing::warn!(backend = %slot.backend, "candidate was never added");
                Availability::Unavailable
            }
        }
    }

    /// First slot, in priority order, that is available.
    #[must_use]
    pub fn select_backend(&self, candidates: &[CandidateSlot]) -> Option<Arc<dyn Backend>> {
        for slot in candidates {
            let availability = self.availability(slot);
            tracing::debug!(backend = %slot.backend, ?availability, "candidate");
            if availability.is_available() {
                return self.get(&slot.backend);
            }
        }
        None
    }

    /// Exclude a backend from selection for the rest of the session.
    pub fn mark_unavailable(&mut self, name: &str) {
        if let Some(registered) = self.backends.get_mut(name) {
            tracing::warn!(backend = name, "backend marked unavailable");
            registered.available = false;
        }
    }

    /// Registered backend by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Backend>> {
        self.backends.get(name).map(|r| Arc::clone(&r.backend))
    }

    /// Whether `name` was added and is currently usable.
    #[must_use]
    pub fn is_available(&self, name: &str) -> bool {
        self.backends.get(name).is_some_and(|r| r.available)
    }

    /// Number of registered backends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether no backend has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
