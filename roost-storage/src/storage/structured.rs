//! `StructuredBackend` - Object Database Storage
//!
//! `TigerStyle`: preferred backend. Every write is one read-write transaction,
//! so a file and the parent directories it implies land together or not at all.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::constants::{
    FILE_CONTENT_BYTES_MAX, PROBE_KEY, STRUCTURED_BACKEND_NAME, STRUCTURED_DB_NAME_DEFAULT,
    STRUCTURED_DB_VERSION, STRUCTURED_FILES_STORE,
};
use crate::platform::{ObjectDatabase, ObjectDbFactory, Record, StorageEnvironment, TransactionMode};

use super::backend::{Backend, Entry, EntryKind};
use super::error::{StorageError, StorageResult};
use super::path::{ancestors, is_within, normalize, normalize_entry};

// =============================================================================
// StructuredBackend
// =============================================================================

/// Backend over the transactional object database.
#[derive(Debug)]
pub struct StructuredBackend {
    factory: Option<Arc<ObjectDbFactory>>,
    db_name: String,
    db: OnceCell<Arc<ObjectDatabase>>,
    loaded: AtomicBool,
}

impl StructuredBackend {
    /// Create a backend on the environment's object database API.
    #[must_use]
    pub fn new(env: &StorageEnvironment) -> Self {
        Self::with_db_name(env, STRUCTURED_DB_NAME_DEFAULT)
    }

    /// Create a backend using a specific database name.
    #[must_use]
    pub fn with_db_name(env: &StorageEnvironment, db_name: impl Into<String>) -> Self {
        let db_name = db_name.into();
        assert!(!db_name.is_empty(), "database name must not be empty");

        Self {
            factory: env.structured(),
            db_name,
            db: OnceCell::new(),
            loaded: AtomicBool::new(false),
        }
    }

    /// Database name.
    #[must_use]
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    async fn open(&self) -> StorageResult<&Arc<ObjectDatabase>> {
        let factory = self
            .factory
            .as_ref()
            .ok_or_else(|| StorageError::OpenFailed("object database API is missing".into()))?;

        self.db
            .get_or_try_init(|| async {
                factory.open(&self.db_name, STRUCTURED_DB_VERSION, &[STRUCTURED_FILES_STORE])
            })
            .await
    }

    fn round_trip(db: &ObjectDatabase) -> StorageResult<()> {
        let mut tx = db.transaction(STRUCTURED_FILES_STORE, TransactionMode::ReadWrite);
        tx.put(PROBE_KEY, Record::file(vec![1], db.now_ms()))?;
        tx.commit()?;

        let mut tx = db.transaction(STRUCTURED_FILES_STORE, TransactionMode::ReadWrite);
        tx.delete(PROBE_KEY)?;
        tx.commit()?;
        Ok(())
    }

    fn db(&self) -> StorageResult<&Arc<ObjectDatabase>> {
        match self.db.get() {
            Some(db) if self.is_loaded() => Ok(db),
            _ => Err(StorageError::not_open(self.name())),
        }
    }

    /// Directories that must be created so `path`'s ancestors exist.
    fn missing_dirs(db: &ObjectDatabase, path: &str) -> StorageResult<Vec<String>> {
        let mut missing = Vec::new();
        for dir in ancestors(path) {
            match db.get(STRUCTURED_FILES_STORE, &dir)? {
                Some(record) if record.kind == EntryKind::File => {
                    return Err(StorageError::NotADirectory { path: dir });
                }
                Some(_) => {}
                None => missing.push(dir),
            }
        }
        Ok(missing)
    }
}

#[async_trait]
impl Backend for StructuredBackend {
    fn name(&self) -> &str {
        STRUCTURED_BACKEND_NAME
    }

    #[tracing::instrument(skip(self), fields(backend = STRUCTURED_BACKEND_NAME, db = %self.db_name))]
    async fn probe(&self) -> bool {
        let result = match self.open().await {
            Ok(db) => Self::round_trip(db),
            Err(e) => Err(e),
        };

        let loaded = match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "structured storage unusable");
                false
            }
        };
        self.loaded.store(loaded, Ordering::SeqCst);
        loaded
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    #[tracing::instrument(skip(self), fields(backend = STRUCTURED_BACKEND_NAME))]
    async fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        let db = self.db()?;
        let path = normalize_entry(path)?;

        match db.get(STRUCTURED_FILES_STORE, &path)? {
            None => Err(StorageError::not_found(path)),
            Some(record) if record.kind == EntryKind::Directory => {
                Err(StorageError::IsDirectory { path })
            }
            Some(record) => Ok(record.data),
        }
    }

    #[tracing::instrument(skip(self, data), fields(backend = STRUCTURED_BACKEND_NAME, bytes = data.len()))]
    async fn write(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let db = self.db()?;
        let path = normalize_entry(path)?;
        if data.len() > FILE_CONTENT_BYTES_MAX {
            return Err(StorageError::WriteFailed(format!(
                "{path}: {} bytes exceeds {FILE_CONTENT_BYTES_MAX}",
                data.len()
            )));
        }

        if let Some(existing) = db.get(STRUCTURED_FILES_STORE, &path)? {
            if existing.kind == EntryKind::Directory {
                return Err(StorageError::IsDirectory { path });
            }
        }
        let missing = Self::missing_dirs(db, &path)?;

        let now_ms = db.now_ms();
        let mut tx = db.transaction(STRUCTURED_FILES_STORE, TransactionMode::ReadWrite);
        for dir in missing {
            tx.put(dir, Record::directory(now_ms))?;
        }
        tx.put(path, Record::file(data.to_vec(), now_ms))?;
        tx.commit()?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(backend = STRUCTURED_BACKEND_NAME))]
    async fn create_dir(&self, path: &str) -> StorageResult<()> {
        let db = self.db()?;
        let path = normalize_entry(path)?;

        let mut missing = Self::missing_dirs(db, &path)?;
        match db.get(STRUCTURED_FILES_STORE, &path)? {
            Some(record) if record.kind == EntryKind::File => {
                return Err(StorageError::NotADirectory { path });
            }
            Some(_) => {}
            None => missing.push(path),
        }
        if missing.is_empty() {
            return Ok(());
        }

        let now_ms = db.now_ms();
        let mut tx = db.transaction(STRUCTURED_FILES_STORE, TransactionMode::ReadWrite);
        for dir in missing {
            tx.put(dir, Record::directory(now_ms))?;
        }
        tx.commit()?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(backend = STRUCTURED_BACKEND_NAME))]
    async fn entries(&self, prefix: &str) -> StorageResult<Vec<Entry>> {
        let db = self.db()?;
        let prefix = normalize(prefix)?;

        Ok(db
            .scan(STRUCTURED_FILES_STORE, &prefix)?
            .into_iter()
            .filter(|(key, _)| key != PROBE_KEY && is_within(key, &prefix))
            .map(|(path, record)| Entry {
                path,
                kind: record.kind,
            })
            .collect())
    }
}
