//! Storage Backend Trait
//!
//! TigerStyle: Abstract interface over the browser storage APIs.
//!
//! # Simulation-First
//!
//! Both implementations run on the in-process platform models, so the same
//! contract tests cover both and every failure mode is reproducible.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::constants::WORKSPACES_ROOT;

use super::error::StorageResult;
use super::path::workspace_of;

/// Kind of a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file with contents
    File,
    /// Directory
    Directory,
}

impl EntryKind {
    /// Get kind as string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A path and its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    /// Normalised path
    pub path: String,
    /// File or directory
    pub kind: EntryKind,
}

impl Entry {
    /// File entry.
    #[must_use]
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
        }
    }

    /// Directory entry.
    #[must_use]
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
        }
    }

    /// Whether this entry is a file.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Abstract storage backend for workspace files.
///
/// TigerStyle: All operations are async, return explicit errors. Only
/// `probe` is infallible; everything else requires a successful probe first.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable backend name.
    fn name(&self) -> &str;

    /// Check the underlying API exists and is writable.
    ///
    /// Opens the store on first call; later calls reuse the open store.
    /// Unsupported environments resolve to `false`.
    async fn probe(&self) -> bool;

    /// Result of the last probe (`false` before any probe).
    fn is_loaded(&self) -> bool;

    /// Read a file.
    async fn read(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Write a file, creating missing parent directories.
    async fn write(&self, path: &str, data: &[u8]) -> StorageResult<()>;

    /// Create a directory and its parents. Idempotent.
    async fn create_dir(&self, path: &str) -> StorageResult<()>;

    /// All entries at or beneath `prefix` (empty = all), sorted by path.
    async fn entries(&self, prefix: &str) -> StorageResult<Vec<Entry>>;

    /// Names of workspaces holding at least one file, sorted.
    async fn workspaces(&self) -> StorageResult<Vec<String>> {
        let names: BTreeSet<String> = self
            .entries(WORKSPACES_ROOT)
            .await?
            .iter()
            .filter(|entry| entry.is_file())
            .filter_map(|entry| workspace_of(&entry.path))
            .map(str::to_string)
            .collect();
        Ok(names.into_iter().collect())
    }

    /// Whether at least one non-empty workspace exists.
    async fn has_workspace(&self) -> StorageResult<bool> {
        Ok(!self.workspaces().await?.is_empty())
    }
}

impl fmt::Debug for dyn Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
