//! Backup delivery targets.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use roost_core::dst::FaultInjector;

use super::MigrationError;

/// Receives finished backup archives.
#[async_trait]
pub trait BackupSink: Send + Sync {
    /// Deliver `bytes` under `file_name`.
    async fn deliver(&self, file_name: &str, bytes: &[u8]) -> Result<(), MigrationError>;
}

/// Writes archives into a directory on the host filesystem.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Deliver into `dir`, created on first delivery.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl BackupSink for DirectorySink {
    #[tracing::instrument(skip(self, bytes), fields(dir = %self.dir.display(), bytes = bytes.len()))]
    async fn deliver(&self, file_name: &str, bytes: &[u8]) -> Result<(), MigrationError> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(MigrationError::delivery(format!(
                "invalid backup file name {file_name:?}"
            )));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| MigrationError::delivery(format!("{}: {e}", self.dir.display())))?;
        let target = self.dir.join(file_name);
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| MigrationError::delivery(format!("{}: {e}", target.display())))?;

        tracing::info!(path = %target.display(), "backup written");
        Ok(())
    }
}

/// One delivered archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// File name
    pub file_name: String,
    /// Archive bytes
    pub bytes: Vec<u8>,
}

/// Keeps deliveries in memory. Delivery can be failed via `backup_deliver` faults.
#[derive(Debug, Default)]
pub struct MemorySink {
    deliveries: Mutex<Vec<Delivery>>,
    faults: Option<Arc<FaultInjector>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that consults `faults` before each delivery.
    #[must_use]
    pub fn with_faults(faults: Arc<FaultInjector>) -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            faults: Some(faults),
        }
    }

    /// Deliveries so far.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent delivery.
    #[must_use]
    pub fn last(&self) -> Option<Delivery> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

#[async_trait]
impl BackupSink for MemorySink {
    async fn deliver(&self, file_name: &str, bytes: &[u8]) -> Result<(), MigrationError> {
        if let Some(fault) = self
            .faults
            .as_ref()
            .and_then(|faults| faults.should_inject("backup_deliver"))
        {
            return Err(MigrationError::delivery(format!(
                "injected {} for {file_name}",
                fault.as_str()
            )));
        }

        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Delivery {
                file_name: file_name.to_string(),
                bytes: bytes.to_vec(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roost_core::dst::{FaultConfig, FaultType, SimConfig, Simulation};

    #[tokio::test]
    async fn test_directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("backups"));

        sink.deliver("b.tar.gz", b"archive").await.unwrap();

        let written = tokio::fs::read(dir.path().join("backups").join("b.tar.gz"))
            .await
            .unwrap();
        assert_eq!(written, b"archive");
    }

    #[tokio::test]
    async fn test_directory_sink_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        tokio::fs::write(&blocker, b"x").await.unwrap();

        let sink = DirectorySink::new(&blocker);
        assert!(matches!(
            sink.deliver("b.tar.gz", b"archive").await,
            Err(MigrationError::Delivery(_))
        ));
    }

    #[tokio::test]
    async fn test_directory_sink_rejects_nested_name() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path());

        for name in ["backups/b.tar.gz", "..\\b.tar.gz", ""] {
            assert!(matches!(
                sink.deliver(name, b"archive").await,
                Err(MigrationError::Delivery(_))
            ));
        }
        assert!(!dir.path().join("backups").exists());
    }

    #[tokio::test]
    async fn test_memory_sink_records() {
        let sink = MemorySink::new();
        sink.deliver("a", b"1").await.unwrap();
        sink.deliver("b", b"2").await.unwrap();

        assert_eq!(sink.deliveries().len(), 2);
        assert_eq!(sink.last().unwrap().file_name, "b");
    }

    #[tokio::test]
    async fn test_memory_sink_fault() {
        let env = Simulation::new(SimConfig::with_seed(42))
            .with_fault(FaultConfig::new(FaultType::BackupDeliveryFail, 1.0).with_filter("backup_deliver"))
            .build();
        let sink = MemorySink::with_faults(Arc::clone(&env.faults));

        assert!(sink.deliver("a", b"1").await.is_err());
        assert!(sink.deliveries().is_empty());
    }
}
