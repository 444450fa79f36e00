//! `KeyValueBackend` - Key-Value Area Storage
//!
//! `TigerStyle`: legacy backend. One key per entry, JSON values, file bytes
//! base64-encoded, all under a single key prefix.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::constants::{
    FILE_CONTENT_BYTES_MAX, KEY_VALUE_BACKEND_NAME, KEY_VALUE_PREFIX_DEFAULT, PROBE_KEY,
};
use crate::platform::{KeyValueArea, StorageEnvironment};

use super::backend::{Backend, Entry, EntryKind};
use super::error::{StorageError, StorageResult};
use super::path::{ancestors, is_within, normalize, normalize_entry};

/// Stored value of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum StoredValue {
    File { data: String },
    Directory,
}

impl StoredValue {
    fn kind(&self) -> EntryKind {
        match self {
            Self::File { .. } => EntryKind::File,
            Self::Directory => EntryKind::Directory,
        }
    }
}

// =============================================================================
// KeyValueBackend
// =============================================================================

/// Backend over the quota-bounded key-value area.
#[derive(Debug)]
pub struct KeyValueBackend {
    area: Option<Arc<KeyValueArea>>,
    prefix: String,
    loaded: AtomicBool,
}

impl KeyValueBackend {
    /// Create a backend on the environment's key-value API.
    #[must_use]
    pub fn new(env: &StorageEnvironment) -> Self {
        Self::with_prefix(env, KEY_VALUE_PREFIX_DEFAULT)
    }

    /// Create a backend storing entries under `prefix`.
    #[must_use]
    pub fn with_prefix(env: &StorageEnvironment, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        assert!(!prefix.is_empty(), "key prefix must not be empty");

        Self {
            area: env.key_value(),
            prefix,
            loaded: AtomicBool::new(false),
        }
    }

    /// Key prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn area(&self) -> StorageResult<&KeyValueArea> {
        match &self.area {
            Some(area) if self.is_loaded() => Ok(area.as_ref()),
            _ => Err(StorageError::not_open(self.name())),
        }
    }

    fn key(&self, path: &str) -> String {
        format!("{}{path}", self.prefix)
    }

    fn load(&self, area: &KeyValueArea, path: &str) -> StorageResult<Option<StoredValue>> {
        match area.get_item(&self.key(path))? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|_| {
                StorageError::Corrupted {
                    path: path.to_string(),
                }
            }),
        }
    }

    fn store(&self, area: &KeyValueArea, path: &str, value: &StoredValue) -> StorageResult<()> {
        area.set_item(&self.key(path), &serde_json::to_string(value)?)
    }

    /// Create every missing ancestor of `path`.
    fn ensure_parents(&self, area: &KeyValueArea, path: &str) -> StorageResult<()> {
        for dir in ancestors(path) {
            match self.load(area, &dir)? {
                Some(StoredValue::File { .. }) => {
                    return Err(StorageError::NotADirectory { path: dir });
                }
                Some(StoredValue::Directory) => {}
                None => self.store(area, &dir, &StoredValue::Directory)?,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for KeyValueBackend {
    fn name(&self) -> &str {
        KEY_VALUE_BACKEND_NAME
    }

    #[tracing::instrument(skip(self), fields(backend = KEY_VALUE_BACKEND_NAME))]
    async fn probe(&self) -> bool {
        let result = match &self.area {
            None => Err(StorageError::OpenFailed("key-value API is missing".into())),
            Some(area) => {
                let key = self.key(PROBE_KEY);
                area.set_item(&key, PROBE_KEY)
                    .and_then(|()| area.remove_item(&key))
            }
        };

        let loaded = match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "key-value storage unusable");
                false
            }
        };
        self.loaded.store(loaded, Ordering::SeqCst);
        loaded
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    #[tracing::instrument(skip(self), fields(backend = KEY_VALUE_BACKEND_NAME))]
    async fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        let area = self.area()?;
        let path = normalize_entry(path)?;

        match self.load(area, &path)? {
            None => Err(StorageError::not_found(path)),
            Some(StoredValue::Directory) => Err(StorageError::IsDirectory { path }),
            Some(StoredValue::File { data }) => BASE64
                .decode(data)
                .map_err(|_| StorageError::Corrupted { path }),
        }
    }

    #[tracing::instrument(skip(self, data), fields(backend = KEY_VALUE_BACKEND_NAME, bytes = data.len()))]
    async fn write(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let area = self.area()?;
        let path = normalize_entry(path)?;
        if data.len() > FILE_CONTENT_BYTES_MAX {
            return Err(StorageError::WriteFailed(format!(
                "{path}: {} bytes exceeds {FILE_CONTENT_BYTES_MAX}",
                data.len()
            )));
        }

        if let Some(StoredValue::Directory) = self.load(area, &path)? {
            return Err(StorageError::IsDirectory { path });
        }
        self.ensure_parents(area, &path)?;
        self.store(
            area,
            &path,
            &StoredValue::File {
                data: BASE64.encode(data),
            },
        )
    }

    #[tracing::instrument(skip(self), fields(backend = KEY_VALUE_BACKEND_NAME))]
    async fn create_dir(&self, path: &str) -> StorageResult<()> {
        let area = self.area()?;
        let path = normalize_entry(path)?;

        self.ensure_parents(area, &path)?;
        match self.load(area, &path)? {
            Some(StoredValue::File { .. }) => Err(StorageError::NotADirectory { path }),
            Some(StoredValue::Directory) => Ok(()),
            None => self.store(area, &path, &StoredValue::Directory),
        }
    }

    #[tracing::instrument(skip(self), fields(backend = KEY_VALUE_BACKEND_NAME))]
    async fn entries(&self, prefix: &str) -> StorageResult<Vec<Entry>> {
        let area = self.area()?;
        let prefix = normalize(prefix)?;

        let mut entries = Vec::new();
        for key in area.keys(&self.key(&prefix))? {
            let path = &key[self.prefix.len()..];
            if path == PROBE_KEY || !is_within(path, &prefix) {
                continue;
            }
            let value = self.load(area, path)?.ok_or_else(|| StorageError::not_found(path))?;
            entries.push(Entry {
                path: path.to_string(),
                kind: value.kind(),
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ApiSupport;
    use roost_core::dst::{FaultConfig, FaultType, SimConfig, Simulation};

    async fn opened(env: &StorageEnvironment) -> KeyValueBackend {
        let backend = KeyValueBackend::new(env);
        assert!(backend.probe().await);
        backend
    }

    #[tokio::test]
    async fn test_stored_format() {
        let env = StorageEnvironment::in_memory();
        let backend = opened(&env).await;
        backend.write(".workspaces/w/a.txt", b"hi").await.unwrap();

        let area = env.key_value().unwrap();
        assert_eq!(
            area.get_item("roost:fs:.workspaces/w/a.txt").unwrap().unwrap(),
            r#"{"kind":"file","data":"aGk="}"#
        );
        assert_eq!(
            area.get_item("roost:fs:.workspaces/w").unwrap().unwrap(),
            r#"{"kind":"directory"}"#
        );
    }

    #[tokio::test]
    async fn test_probe_leaves_no_key() {
        let env = StorageEnvironment::in_memory();
        opened(&env).await;
        assert!(env.key_value().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_probe_key_is_not_a_user_path() {
        let env = StorageEnvironment::in_memory();
        let backend = opened(&env).await;

        assert!(matches!(
            backend.write(PROBE_KEY, b"user data").await,
            Err(StorageError::InvalidPath { .. })
        ));
        backend.write("notes/__roost_probe__", b"user data").await.unwrap();
        assert!(backend.probe().await);
        assert_eq!(backend.read("notes/__roost_probe__").await.unwrap(), b"user data");
    }

    #[tokio::test]
    async fn test_probe_false_when_missing_or_denied() {
        for support in [ApiSupport::Missing, ApiSupport::Denied] {
            let env = StorageEnvironment::builder().key_value(support).build();
            assert!(!KeyValueBackend::new(&env).probe().await);
        }
    }

    #[tokio::test]
    async fn test_not_open_before_probe() {
        let backend = KeyValueBackend::new(&StorageEnvironment::in_memory());
        assert_eq!(
            backend.workspaces().await,
            Err(StorageError::not_open(KEY_VALUE_BACKEND_NAME))
        );
    }

    #[tokio::test]
    async fn test_read_write_binary() {
        let env = StorageEnvironment::in_memory();
        let backend = opened(&env).await;
        let bytes = vec![0u8, 159, 146, 150, 255];
        backend.write("bin/blob", &bytes).await.unwrap();
        assert_eq!(backend.read("bin/blob").await.unwrap(), bytes);
        assert!(matches!(backend.read("bin").await, Err(StorageError::IsDirectory { .. })));
    }

    #[tokio::test]
    async fn test_quota_exceeded() {
        let env = StorageEnvironment::builder().key_value_quota_bytes(256).build();
        let backend = opened(&env).await;

        let err = backend.write("big", &[7u8; 512]).await.unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 256, .. }));
    }

    #[tokio::test]
    async fn test_corrupted_value() {
        let env = StorageEnvironment::in_memory();
        let backend = opened(&env).await;
        env.key_value().unwrap().set_item("roost:fs:bad", "{not json").unwrap();

        assert!(matches!(backend.read("bad").await, Err(StorageError::Corrupted { .. })));
    }

    #[tokio::test]
    async fn test_workspaces() {
        let env = StorageEnvironment::in_memory();
        let backend = opened(&env).await;
        backend.create_dir(".workspaces/empty").await.unwrap();
        backend.write(".workspaces/b/x", b"1").await.unwrap();
        backend.write(".workspaces/a/deep/y", b"2").await.unwrap();

        assert_eq!(backend.workspaces().await.unwrap(), vec!["a", "b"]);
        assert!(backend.has_workspace().await.unwrap());
    }

    #[tokio::test]
    async fn test_read_fault() {
        let sim = Simulation::new(SimConfig::with_seed(42))
            .with_fault(FaultConfig::new(FaultType::StorageReadFail, 1.0).with_filter("kv_read"))
            .build();
        let env = StorageEnvironment::from_simulation(&sim);
        let backend = opened(&env).await;

        assert!(matches!(
            backend.has_workspace().await,
            Err(StorageError::ReadFailed(_))
        ));
    }
}
