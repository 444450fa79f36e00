//! Preload - Storage Decision Controller
//!
//! `TigerStyle`: the startup sequence as an explicit state machine. Each step
//! checks the current state, so probe, prompt, migrate and select can only
//! happen in that order and the host is started at most once.
//!
//! # States
//!
//! ```text
//!            probe()                    choose()
//! Probing ─────────► AwaitingUserChoice ────────► Loading
//!    │                                              ▲  │ load()
//!    └──────────────────────────────────────────────┘  ├──► Ready
//!                                                      └──► Unsupported
//! (any step error) ──► Failed
//! ```

mod host;
mod overrides;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::config::StorageConfig;
use crate::constants::{HARD_REFRESH_MESSAGE, UNSUPPORTED_MESSAGE};
use crate::migration::{migration_test_data, populate_workspace, BackupSink, MigrationRecord, MigrationUtility};
use crate::platform::StorageEnvironment;
use crate::registry::{BackendRegistry, CandidateSlot};
use crate::storage::{Backend, StorageError};
use crate::telemetry::{StorageEvent, TelemetrySink};

pub use host::{BackupChoice, BackupPrompt, Host};
pub use overrides::EnvironmentOverrides;

// =============================================================================
// State and Errors
// =============================================================================

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadState {
    /// Backends not yet probed
    Probing,
    /// Legacy data found; waiting for backup/skip decision
    AwaitingUserChoice,
    /// Ready to select a backend
    Loading,
    /// A backend was selected (terminal)
    Ready,
    /// No backend available (terminal)
    Unsupported,
    /// Startup failed (terminal)
    Failed,
}

impl PreloadState {
    /// Whether no further step is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Unsupported | Self::Failed)
    }
}

impl fmt::Display for PreloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Errors from controller steps.
#[derive(Debug, Error)]
pub enum PreloadError {
    /// Step called from the wrong state
    #[error("cannot {operation} while {state}")]
    InvalidTransition {
        /// Step attempted
        operation: &'static str,
        /// State at the time
        state: PreloadState,
    },

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Host failed to start
    #[error("host failed to start: {0}")]
    Host(#[source] anyhow::Error),
}

/// What `probe` found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    /// Preferred backend probed usable and not forced unavailable
    pub preferred_available: bool,
    /// Legacy backend probed usable and not forced unavailable
    pub legacy_available: bool,
    /// Preferred backend holds a non-empty workspace
    pub preferred_has_workspace: bool,
    /// Legacy backend holds a non-empty workspace
    pub legacy_has_workspace: bool,
    /// Synthetic test data was seeded into the legacy backend
    pub seeded: bool,
}

impl ProbeReport {
    /// Legacy data exists and the preferred backend is usable but empty.
    #[must_use]
    pub fn needs_user_choice(&self) -> bool {
        self.preferred_available
            && !self.preferred_has_workspace
            && self.legacy_available
            && self.legacy_has_workspace
    }
}

/// Result of a full `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreloadOutcome {
    /// Host started on this backend
    Ready {
        /// Backend name
        backend: String,
    },
    /// No backend could be activated
    Unsupported {
        /// User-facing message
        message: &'static str,
    },
    /// Startup failed
    Failed {
        /// User-facing remediation message
        message: &'static str,
        /// Underlying error
        error: String,
    },
}

// =============================================================================
// Preloader
// =============================================================================

/// Chooses the storage backend and hands it to the host.
pub struct Preloader {
    state: PreloadState,
    registry: BackendRegistry,
    preferred: Arc<dyn Backend>,
    legacy: Arc<dyn Backend>,
    overrides: EnvironmentOverrides,
    migration: MigrationUtility,
    telemetry: Arc<dyn TelemetrySink>,
    report: Option<ProbeReport>,
    active: Option<Arc<dyn Backend>>,
}

impl fmt::Debug for Preloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preloader")
            .field("state", &self.state)
            .field("preferred", &self.preferred.name())
            .field("legacy", &self.legacy.name())
            .field("overrides", &self.overrides)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl Preloader {
    /// Create a controller over a preferred and a legacy backend.
    #[must_use]
    pub fn new(
        preferred: Arc<dyn Backend>,
        legacy: Arc<dyn Backend>,
        migration: MigrationUtility,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        assert_ne!(
            preferred.name(),
            legacy.name(),
            "preferred and legacy backends must differ"
        );

        Self {
            state: PreloadState::Probing,
            registry: BackendRegistry::new(Arc::clone(&telemetry)),
            preferred,
            legacy,
            overrides: EnvironmentOverrides::none(),
            migration,
            telemetry,
            report: None,
            active: None,
        }
    }

    /// Build both backends and the migration utility from `config`.
    #[must_use]
    pub fn from_config(
        config: &StorageConfig,
        env: &StorageEnvironment,
        sink: Arc<dyn BackupSink>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        let migration = MigrationUtility::new(config, sink, Arc::clone(&telemetry));
        Self::new(
            Arc::new(config.structured_backend(env)),
            Arc::new(config.key_value_backend(env)),
            migration,
            telemetry,
        )
    }

    /// Apply test overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: EnvironmentOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PreloadState {
        self.state
    }

    /// Overrides in effect.
    #[must_use]
    pub fn overrides(&self) -> EnvironmentOverrides {
        self.overrides
    }

    /// Result of the probe step, once run.
    #[must_use]
    pub fn report(&self) -> Option<ProbeReport> {
        self.report
    }

    /// Backend selected by `load`, if any.
    #[must_use]
    pub fn active_backend(&self) -> Option<Arc<dyn Backend>> {
        self.active.clone()
    }

    /// The backend registry.
    #[must_use]
    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    fn expect_state(&self, expected: PreloadState, operation: &'static str) -> Result<(), PreloadError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PreloadError::InvalidTransition {
                operation,
                state: self.state,
            })
        }
    }

    /// Move to `Failed` on a step error other than a wrong-state call.
    fn settle<T>(&mut self, result: Result<T, PreloadError>) -> Result<T, PreloadError> {
        if let Err(e) = &result {
            if !matches!(e, PreloadError::InvalidTransition { .. }) {
                self.state = PreloadState::Failed;
            }
        }
        result
    }

    fn candidates(&self) -> [CandidateSlot; 2] {
        [
            CandidateSlot::new(self.preferred.name())
                .forced_unavailable(self.overrides.preferred_forced_unavailable()),
            CandidateSlot::new(self.legacy.name())
                .forced_unavailable(self.overrides.legacy_forced_unavailable()),
        ]
    }

    /// Probe both backends, seed test data if asked, and look for workspaces.
    ///
    /// # Errors
    /// `InvalidTransition` outside `Probing`; `Storage` if seeding or a
    /// workspace check fails (the controller is then `Failed`).
    #[tracing::instrument(skip(self), fields(state = %self.state))]
    pub async fn probe(&mut self) -> Result<ProbeReport, PreloadError> {
        self.expect_state(PreloadState::Probing, "probe")?;
        let result = self.probe_backends().await;
        let report = self.settle(result)?;

        self.report = Some(report);
        self.state = if report.needs_user_choice() {
            PreloadState::AwaitingUserChoice
        } else {
            PreloadState::Loading
        };
        tracing::info!(?report, next = %self.state, "probe complete");
        Ok(report)
    }

    async fn probe_backends(&mut self) -> Result<ProbeReport, PreloadError> {
        let probed = self
            .registry
            .add_backends(vec![Arc::clone(&self.preferred), Arc::clone(&self.legacy)])
            .await;
        let (preferred_probed, legacy_probed) = (probed[0], probed[1]);

        let mut seeded = false;
        if self.overrides.migration_test && legacy_probed {
            populate_workspace(&migration_test_data(), self.legacy.as_ref()).await?;
            seeded = true;
        }

        let preferred_has_workspace = preferred_probed && self.preferred.has_workspace().await?;
        let legacy_has_workspace = legacy_probed && self.legacy.has_workspace().await?;

        let [preferred_slot, legacy_slot] = self.candidates();
        Ok(ProbeReport {
            preferred_available: self.registry.availability(&preferred_slot).is_available(),
            legacy_available: self.registry.availability(&legacy_slot).is_available(),
            preferred_has_workspace,
            legacy_has_workspace,
            seeded,
        })
    }

    /// Act on the user's backup decision, then migrate legacy data.
    ///
    /// A failed backup is tracked and ignored. A failed migration is tracked
    /// and excludes the preferred backend from selection.
    ///
    /// # Errors
    /// `InvalidTransition` outside `AwaitingUserChoice`.
    #[tracing::instrument(skip(self), fields(state = %self.state))]
    pub async fn choose(&mut self, choice: BackupChoice) -> Result<MigrationRecord, PreloadError> {
        self.expect_state(PreloadState::AwaitingUserChoice, "choose")?;

        if choice == BackupChoice::DownloadBackup {
            if let Err(e) = self.migration.download_backup(self.legacy.as_ref()).await {
                tracing::warn!(error = %e, "continuing migration without backup");
            }
        }

        let record = self
            .migration
            .migrate_with_record(self.legacy.as_ref(), self.preferred.as_ref())
            .await;
        self.telemetry.track(StorageEvent::MigrationResult {
            success: record.success,
        });
        if !record.success {
            if let Some(message) = record.summary() {
                self.telemetry.track(StorageEvent::MigrationError { message });
            }
            self.registry.mark_unavailable(self.preferred.name());
        }

        self.state = PreloadState::Loading;
        Ok(record)
    }

    /// Select the highest-priority available backend.
    ///
    /// Returns the backend on `Ready`, `None` on `Unsupported`.
    ///
    /// # Errors
    /// `InvalidTransition` outside `Loading`.
    #[tracing::instrument(skip(self), fields(state = %self.state))]
    pub fn load(&mut self) -> Result<Option<Arc<dyn Backend>>, PreloadError> {
        self.expect_state(PreloadState::Loading, "load")?;

        match self.registry.select_backend(&self.candidates()) {
            Some(backend) => {
                tracing::info!(backend = backend.name(), "storage activated");
                self.telemetry.track(StorageEvent::BackendActivated {
                    backend: backend.name().to_string(),
                });
                self.active = Some(Arc::clone(&backend));
                self.state = PreloadState::Ready;
                Ok(Some(backend))
            }
            None => {
                tracing::warn!("no supported storage");
                self.telemetry.track(StorageEvent::NoSupportedStorage);
                self.state = PreloadState::Unsupported;
                Ok(None)
            }
        }
    }

    /// Drive the whole sequence and start `host` on the chosen backend.
    ///
    /// Never returns an error: failures end in `PreloadOutcome::Failed` and a
    /// `LoadFailed` event. Called outside `Probing`, it reports failure
    /// without touching state.
    pub async fn run(&mut self, prompt: &dyn BackupPrompt, host: &dyn Host) -> PreloadOutcome {
        if self.state != PreloadState::Probing {
            let error = PreloadError::InvalidTransition {
                operation: "run",
                state: self.state,
            };
            return PreloadOutcome::Failed {
                message: HARD_REFRESH_MESSAGE,
                error: error.to_string(),
            };
        }

        match self.drive(prompt, host).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state = PreloadState::Failed;
                tracing::error!(error = %e, "error loading application");
                self.telemetry.track(StorageEvent::LoadFailed {
                    message: e.to_string(),
                });
                PreloadOutcome::Failed {
                    message: HARD_REFRESH_MESSAGE,
                    error: e.to_string(),
                }
            }
        }
    }

    async fn drive(&mut self, prompt: &dyn BackupPrompt, host: &dyn Host) -> Result<PreloadOutcome, PreloadError> {
        self.probe().await?;

        if self.state == PreloadState::AwaitingUserChoice {
            let choice = prompt.choose().await;
            self.choose(choice).await?;
        }

        match self.load()? {
            Some(backend) => {
                let name = backend.name().to_string();
                host.start(backend).await.map_err(PreloadError::Host)?;
                Ok(PreloadOutcome::Ready { backend: name })
            }
            None => Ok(PreloadOutcome::Unsupported {
                message: UNSUPPORTED_MESSAGE,
            }),
        }
    }
}
