//! Telemetry - Storage Events and Sinks
//!
//! `TigerStyle`: fire-and-forget. Tracking never fails and never blocks a
//! storage decision.
//!
//! Events are handed to an injected [`TelemetrySink`]. Process-level log and
//! trace export setup lives in the `exporter` submodule.

mod exporter;

use std::fmt;
use std::sync::{Mutex, PoisonError};

pub use exporter::{
    init_logging, init_telemetry, Result, TelemetryConfig, TelemetryConfigBuilder, TelemetryError,
    TelemetryGuard,
};

// =============================================================================
// Events
// =============================================================================

/// Event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// Backend probing and activation
    Storage,
    /// Migration outcome
    Migrate,
    /// Backup download
    Backup,
    /// Startup sequence
    Preload,
}

impl EventCategory {
    /// Get category as string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storage => "Storage",
            Self::Migrate => "Migrate",
            Self::Backup => "Backup",
            Self::Preload => "Preload",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A storage lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageEvent {
    /// A backend's probe resolved false
    BackendUnsupported {
        /// Backend name
        backend: String,
    },
    /// A backend was handed to the host
    BackendActivated {
        /// Backend name
        backend: String,
    },
    /// No candidate backend was available
    NoSupportedStorage,
    /// A migration finished
    MigrationResult {
        /// Whether every workspace copied and verified
        success: bool,
    },
    /// A migration step failed
    MigrationError {
        /// Failure summary
        message: String,
    },
    /// A backup archive was delivered
    BackupDownloaded {
        /// Delivered file name
        file_name: String,
    },
    /// A backup could not be produced or delivered
    BackupFailed {
        /// Failure summary
        message: String,
    },
    /// The startup sequence hit an unexpected error
    LoadFailed {
        /// Failure summary
        message: String,
    },
}

impl StorageEvent {
    /// Event category.
    #[must_use]
    pub fn category(&self) -> EventCategory {
        match self {
            Self::BackendUnsupported { .. }
            | Self::BackendActivated { .. }
            | Self::NoSupportedStorage => EventCategory::Storage,
            Self::MigrationResult { .. } | Self::MigrationError { .. } => EventCategory::Migrate,
            Self::BackupDownloaded { .. } | Self::BackupFailed { .. } => EventCategory::Backup,
            Self::LoadFailed { .. } => EventCategory::Preload,
        }
    }

    /// Event action.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::BackendActivated { .. } => "activate",
            Self::MigrationResult { .. } => "result",
            Self::BackupDownloaded { .. } => "download",
            Self::BackendUnsupported { .. }
            | Self::NoSupportedStorage
            | Self::MigrationError { .. }
            | Self::BackupFailed { .. }
            | Self::LoadFailed { .. } => "error",
        }
    }

    /// Event name (label), if any.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        match self {
            Self::BackendUnsupported { backend } => Some(format!("{backend} not supported")),
            Self::BackendActivated { backend } => Some(backend.clone()),
            Self::NoSupportedStorage => Some("no supported storage".to_string()),
            Self::MigrationResult { success } => {
                Some(if *success { "success" } else { "fail" }.to_string())
            }
            Self::BackupDownloaded { file_name } => Some(file_name.clone()),
            Self::MigrationError { message }
            | Self::BackupFailed { message }
            | Self::LoadFailed { message } => Some(message.clone()),
        }
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// Receives storage events.
pub trait TelemetrySink: Send + Sync {
    /// Record an event. Must not fail or block.
    fn track(&self, event: StorageEvent);
}

/// Emits each event as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn track(&self, event: StorageEvent) {
        let category = event.category();
        let action = event.action();
        let name = event.name().unwrap_or_default();

        if action == "error" {
            tracing::warn!(target: "roost_storage::telemetry", %category, action, name = %name, "storage event");
        } else {
            tracing::info!(target: "roost_storage::telemetry", %category, action, name = %name, "storage event");
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn track(&self, _event: StorageEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<StorageEvent>>,
}

impl RecordingTelemetry {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<StorageEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether `event` was recorded.
    #[must_use]
    pub fn contains(&self, event: &StorageEvent) -> bool {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(event)
    }

    /// Number of recorded events in `category`.
    #[must_use]
    pub fn count(&self, category: EventCategory) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| event.category() == category)
            .count()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn track(&self, event: StorageEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
