//! Migration - Backup, Copy and Verify
//!
//! `TigerStyle`: copy forward, never delete. A failed copy leaves the source
//! exactly as it was and is reported, never raised.
//!
//! # Workflow
//!
//! ```text
//! legacy ──entries──► tar.gz ──► BackupSink         (optional, read-only)
//! legacy ──dirs, then files──► preferred
//! preferred ──re-read──► SHA-256 == source digest?  (verification)
//! ```

mod archive;
mod fixtures;
mod sink;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use roost_core::dst::SimClock;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::StorageConfig;
use crate::storage::{Backend, EntryKind, StorageError, StorageResult};
use crate::telemetry::{StorageEvent, TelemetrySink};

pub use archive::{backup_file_name, build_archive, unpack_archive, ArchiveEntry};
pub use fixtures::{migration_test_data, populate_workspace};
pub use sink::{BackupSink, Delivery, DirectorySink, MemorySink};

// =============================================================================
// Errors and Records
// =============================================================================

/// Errors from backup production and delivery.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Reading the source failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The archive could not be built or read
    #[error("archive error: {0}")]
    Archive(String),

    /// The sink refused the archive
    #[error("backup delivery failed: {0}")]
    Delivery(String),
}

impl MigrationError {
    /// Create an archive error.
    #[must_use]
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive(message.into())
    }

    /// Create a delivery error.
    #[must_use]
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery(message.into())
    }
}

/// A delivered backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReceipt {
    /// File name given to the sink
    pub file_name: String,
    /// Archive size
    pub bytes: usize,
    /// Source entries archived (readme excluded)
    pub entries: usize,
}

/// One entry that failed to copy or verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFailure {
    /// Normalised path
    pub path: String,
    /// What went wrong
    pub reason: String,
}

impl fmt::Display for MigrationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Outcome of one migration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    /// Every entry copied and every file verified
    pub success: bool,
    /// Source backend name
    pub source: String,
    /// Destination backend name
    pub destination: String,
    /// Non-empty workspaces found in the source
    pub workspaces: Vec<String>,
    /// Entries written to the destination
    pub entries_copied: usize,
    /// Per-entry failures
    pub failures: Vec<MigrationFailure>,
}

impl MigrationRecord {
    fn new(source: &dyn Backend, destination: &dyn Backend) -> Self {
        Self {
            success: false,
            source: source.name().to_string(),
            destination: destination.name().to_string(),
            workspaces: Vec::new(),
            entries_copied: 0,
            failures: Vec::new(),
        }
    }

    fn fail(&mut self, path: impl Into<String>, reason: impl fmt::Display) {
        self.failures.push(MigrationFailure {
            path: path.into(),
            reason: reason.to_string(),
        });
    }

    /// First failure, for reporting.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        let first = self.failures.first()?;
        Some(if self.failures.len() == 1 {
            first.to_string()
        } else {
            format!("{first} (and {} more)", self.failures.len() - 1)
        })
    }
}

// =============================================================================
// MigrationUtility
// =============================================================================

/// Backs up, copies and verifies workspace data between backends.
pub struct MigrationUtility {
    sink: Arc<dyn BackupSink>,
    telemetry: Arc<dyn TelemetrySink>,
    clock: Option<SimClock>,
    backup_file_prefix: String,
    verify: bool,
}

impl fmt::Debug for MigrationUtility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationUtility")
            .field("backup_file_prefix", &self.backup_file_prefix)
            .field("verify", &self.verify)
            .finish_non_exhaustive()
    }
}

impl MigrationUtility {
    /// Create a utility using `config`'s backup prefix and verification toggle.
    #[must_use]
    pub fn new(
        config: &StorageConfig,
        sink: Arc<dyn BackupSink>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        assert!(
            !config.backup_file_prefix.is_empty(),
            "backup file prefix must not be empty"
        );

        Self {
            sink,
            telemetry,
            clock: None,
            backup_file_prefix: config.backup_file_prefix.clone(),
            verify: config.verify_migration,
        }
    }

    /// Name backups from a simulated clock instead of wall time.
    #[must_use]
    pub fn with_clock(mut self, clock: SimClock) -> Self {
        self.clock = Some(clock);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.as_ref().map_or_else(Utc::now, SimClock::now)
    }

    /// Archive every entry of `source` and deliver it to the sink.
    ///
    /// Read-only over `source`. Tracks `BackupDownloaded` or `BackupFailed`.
    ///
    /// # Errors
    /// `Storage` if the source cannot be listed or read, `Archive` if the
    /// archive cannot be built, `Delivery` if the sink refuses it.
    #[tracing::instrument(skip(self, source), fields(backend = source.name()))]
    pub async fn download_backup(&self, source: &dyn Backend) -> Result<BackupReceipt, MigrationError> {
        match self.build_and_deliver(source).await {
            Ok(receipt) => {
                tracing::info!(file = %receipt.file_name, bytes = receipt.bytes, entries = receipt.entries, "backup delivered");
                self.telemetry.track(StorageEvent::BackupDownloaded {
                    file_name: receipt.file_name.clone(),
                });
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!(error = %e, "backup failed");
                self.telemetry.track(StorageEvent::BackupFailed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn build_and_deliver(&self, source: &dyn Backend) -> Result<BackupReceipt, MigrationError> {
        let mut archived = Vec::new();
        for entry in source.entries("").await? {
            if entry.is_file() {
                let data = source.read(&entry.path).await?;
                archived.push(ArchiveEntry::file(entry.path, data));
            } else {
                archived.push(ArchiveEntry::directory(entry.path));
            }
        }

        let bytes = build_archive(&archived).map_err(|e| MigrationError::archive(e.to_string()))?;
        let file_name = backup_file_name(&self.backup_file_prefix, self.now());
        self.sink.deliver(&file_name, &bytes).await?;

        Ok(BackupReceipt {
            file_name,
            bytes: bytes.len(),
            entries: archived.len(),
        })
    }

    /// Copy all data from `source` to `destination`; `true` on full success.
    pub async fn migrate(&self, source: &dyn Backend, destination: &dyn Backend) -> bool {
        self.migrate_with_record(source, destination).await.success
    }

    /// Copy all data from `source` to `destination` and report per-entry outcomes.
    ///
    /// Directories are created first, then files, both in path order. Existing
    /// destination entries are overwritten, so re-running is safe. Nothing is
    /// ever removed from `source`.
    #[tracing::instrument(skip(self, source, destination), fields(from = source.name(), to = destination.name()))]
    pub async fn migrate_with_record(
        &self,
        source: &dyn Backend,
        destination: &dyn Backend,
    ) -> MigrationRecord {
        let mut record = MigrationRecord::new(source, destination);

        match source.workspaces().await {
            Ok(names) if names.is_empty() => {
                tracing::info!("source has no workspace, nothing to migrate");
                record.success = true;
                return record;
            }
            Ok(names) => record.workspaces = names,
            Err(e) => {
                record.fail("", e);
                return record;
            }
        }

        let entries = match source.entries("").await {
            Ok(entries) => entries,
            Err(e) => {
                record.fail("", e);
                return record;
            }
        };
        let (files, dirs): (Vec<_>, Vec<_>) = entries.into_iter().partition(|e| e.is_file());

        for dir in &dirs {
            match destination.create_dir(&dir.path).await {
                Ok(()) => record.entries_copied += 1,
                Err(e) => record.fail(&dir.path, e),
            }
        }

        let mut copied = Vec::with_capacity(files.len());
        for file in &files {
            let data = match source.read(&file.path).await {
                Ok(data) => data,
                Err(e) => {
                    record.fail(&file.path, e);
                    continue;
                }
            };
            match destination.write(&file.path, &data).await {
                Ok(()) => {
                    record.entries_copied += 1;
                    copied.push((file.path.as_str(), Sha256::digest(&data)));
                }
                Err(e) => record.fail(&file.path, e),
            }
        }

        if self.verify {
            for (path, expected) in copied {
                if let Err(reason) = verify_copy(destination, path, &expected).await {
                    record.fail(path, reason);
                }
            }
        }

        record.success = record.failures.is_empty();
        if record.success {
            tracing::info!(workspaces = ?record.workspaces, entries = record.entries_copied, "migration complete");
        } else {
            tracing::warn!(failures = record.failures.len(), first = ?record.summary(), "migration incomplete");
        }
        record
    }

    /// Unpack a backup produced by `download_backup` into `destination`.
    ///
    /// Returns the number of entries restored; the readme is skipped.
    ///
    /// # Errors
    /// `Serialization` for a malformed archive, or any backend error.
    #[tracing::instrument(skip(self, archive, destination), fields(backend = destination.name(), bytes = archive.len()))]
    pub async fn restore_backup(&self, archive: &[u8], destination: &dyn Backend) -> StorageResult<usize> {
        let entries = unpack_archive(archive)
            .map_err(|e| StorageError::Serialization(format!("backup archive: {e}")))?;

        for entry in &entries {
            if entry.kind == EntryKind::Directory {
                destination.create_dir(&entry.path).await?;
            } else {
                destination.write(&entry.path, &entry.data).await?;
            }
        }
        tracing::info!(entries = entries.len(), "backup restored");
        Ok(entries.len())
    }
}

async fn verify_copy(
    destination: &dyn Backend,
    path: &str,
    expected: &[u8],
) -> Result<(), String> {
    let data = destination.read(path).await.map_err(|e| e.to_string())?;
    let actual = Sha256::digest(&data);
    if actual.as_slice() == expected {
        Ok(())
    } else {
        Err(format!(
            "digest mismatch: expected {}, found {}",
            hex::encode(expected),
            hex::encode(actual)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::StorageEnvironment;
    use crate::storage::{KeyValueBackend, StructuredBackend};
    use crate::telemetry::RecordingTelemetry;
    use roost_core::dst::{FaultConfig, FaultType, SimConfig, Simulation};

    struct Fixture {
        legacy: KeyValueBackend,
        preferred: StructuredBackend,
        sink: Arc<MemorySink>,
        telemetry: Arc<RecordingTelemetry>,
        utility: MigrationUtility,
    }

    async fn fixture(env: &StorageEnvironment, sink: MemorySink) -> Fixture {
        let legacy = KeyValueBackend::new(env);
        let preferred = StructuredBackend::new(env);
        assert!(legacy.probe().await);
        assert!(preferred.probe().await);

        let sink = Arc::new(sink);
        let telemetry = Arc::new(RecordingTelemetry::new());
        let utility = MigrationUtility::new(
            &StorageConfig::default(),
            Arc::clone(&sink) as Arc<dyn BackupSink>,
            Arc::clone(&telemetry) as Arc<dyn TelemetrySink>,
        )
        .with_clock(SimClock::at_ms(0));

        Fixture {
            legacy,
            preferred,
            sink,
            telemetry,
            utility,
        }
    }

    #[tokio::test]
    async fn test_migrate_copies_and_verifies() {
        let env = StorageEnvironment::in_memory();
        let f = fixture(&env, MemorySink::new()).await;
        populate_workspace(&migration_test_data(), &f.legacy).await.unwrap();

        let record = f.utility.migrate_with_record(&f.legacy, &f.preferred).await;

        assert!(record.success, "{:?}", record.failures);
        assert_eq!(record.workspaces, vec!["workspace_test"]);
        assert_eq!(record.entries_copied, 11);
        assert_eq!(
            f.legacy.entries("").await.unwrap(),
            f.preferred.entries("").await.unwrap()
        );
        assert!(f.preferred.has_workspace().await.unwrap());
    }

    #[tokio::test]
    async fn test_migrate_empty_source_is_trivial() {
        let env = StorageEnvironment::in_memory();
        let f = fixture(&env, MemorySink::new()).await;
        f.legacy.create_dir(".workspaces/emptyspace").await.unwrap();

        let record = f.utility.migrate_with_record(&f.legacy, &f.preferred).await;
        assert!(record.success);
        assert_eq!(record.entries_copied, 0);
        assert!(f.preferred.entries("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let env = StorageEnvironment::in_memory();
        let f = fixture(&env, MemorySink::new()).await;
        populate_workspace(&migration_test_data(), &f.legacy).await.unwrap();

        assert!(f.utility.migrate(&f.legacy, &f.preferred).await);
        let first = f.preferred.entries("").await.unwrap();
        assert!(f.utility.migrate(&f.legacy, &f.preferred).await);
        assert_eq!(f.preferred.entries("").await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_migrate_reports_unopened_source() {
        let env = StorageEnvironment::in_memory();
        let f = fixture(&env, MemorySink::new()).await;
        let unopened = KeyValueBackend::with_prefix(&env, "other:");

        let record = f.utility.migrate_with_record(&unopened, &f.preferred).await;
        assert!(!record.success);
        assert!(record.summary().unwrap().contains("not open"));
    }

    #[tokio::test]
    async fn test_corrupting_destination_fails_verification() {
        let sim = Simulation::new(SimConfig::with_seed(42))
            .with_fault(FaultConfig::new(FaultType::StorageCorruption, 1.0).with_filter("structured_write"))
            .build();
        let env = StorageEnvironment::from_simulation(&sim);
        let f = fixture(&env, MemorySink::new()).await;
        f.legacy.write(".workspaces/w/a.txt", b"content").await.unwrap();

        let record = f.utility.migrate_with_record(&f.legacy, &f.preferred).await;
        assert!(!record.success);
        assert!(record.failures.iter().any(|fail| fail.reason.contains("digest mismatch")));
        assert_eq!(f.legacy.read(".workspaces/w/a.txt").await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn test_download_backup_and_restore() {
        let env = StorageEnvironment::in_memory();
        let f = fixture(&env, MemorySink::new()).await;
        populate_workspace(&migration_test_data(), &f.legacy).await.unwrap();
        let before = f.legacy.entries("").await.unwrap();

        let receipt = f.utility.download_backup(&f.legacy).await.unwrap();
        assert_eq!(receipt.file_name, "workspace-backup-at-0h0min-1970-1-1.tar.gz");
        assert_eq!(receipt.entries, 11);
        assert_eq!(f.legacy.entries("").await.unwrap(), before);
        assert!(f.telemetry.contains(&StorageEvent::BackupDownloaded {
            file_name: receipt.file_name.clone()
        }));

        let delivered = f.sink.last().unwrap();
        assert_eq!(delivered.bytes.len(), receipt.bytes);
        let restored = f.utility.restore_backup(&delivered.bytes, &f.preferred).await.unwrap();
        assert_eq!(restored, 11);
        assert_eq!(f.preferred.entries("").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_download_backup_failure_is_tracked() {
        let sim = Simulation::new(SimConfig::with_seed(42))
            .with_fault(FaultConfig::new(FaultType::BackupDeliveryFail, 1.0).with_filter("backup_deliver"))
            .build();
        let env = StorageEnvironment::from_simulation(&sim);
        let f = fixture(&env, MemorySink::with_faults(Arc::clone(&sim.faults))).await;
        f.legacy.write(".workspaces/w/a.txt", b"x").await.unwrap();

        assert!(matches!(
            f.utility.download_backup(&f.legacy).await,
            Err(MigrationError::Delivery(_))
        ));
        assert_eq!(
            f.telemetry.count(crate::telemetry::EventCategory::Backup),
            1
        );
    }

    #[tokio::test]
    async fn test_restore_rejects_garbage() {
        let env = StorageEnvironment::in_memory();
        let f = fixture(&env, MemorySink::new()).await;
        assert!(matches!(
            f.utility.restore_backup(b"nope", &f.preferred).await,
            Err(StorageError::Serialization(_))
        ));
    }
}
