//! Collaborators the controller hands off to.

use std::sync::Arc;

use async_trait::async_trait;

use crate::storage::Backend;

/// The application started once a backend is chosen.
#[async_trait]
pub trait Host: Send + Sync {
    /// Start the application on `backend`.
    async fn start(&self, backend: Arc<dyn Backend>) -> anyhow::Result<()>;
}

/// The user's answer to the backup prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupChoice {
    /// Download a backup of the legacy data, then migrate
    DownloadBackup,
    /// Migrate without a backup
    SkipBackup,
}

/// Asks the user whether to back up before migrating.
#[async_trait]
pub trait BackupPrompt: Send + Sync {
    /// Wait for the user's choice.
    async fn choose(&self) -> BackupChoice;
}

/// A fixed answer, for non-interactive runs.
#[async_trait]
impl BackupPrompt for BackupChoice {
    async fn choose(&self) -> BackupChoice {
        *self
    }
}
