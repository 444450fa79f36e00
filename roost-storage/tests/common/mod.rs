//! Shared doubles for the DST scenario tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use roost_storage::preload::{BackupChoice, BackupPrompt, Host};
use roost_storage::storage::Backend;
use roost_storage::{KeyValueBackend, StorageEnvironment, StructuredBackend};

/// Records every backend it is started on.
#[derive(Default)]
pub struct RecordingHost {
    started: Mutex<Vec<Arc<dyn Backend>>>,
}

impl RecordingHost {
    pub fn starts(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn backend(&self) -> Option<Arc<dyn Backend>> {
        self.started.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Host for RecordingHost {
    async fn start(&self, backend: Arc<dyn Backend>) -> anyhow::Result<()> {
        self.started.lock().unwrap().push(backend);
        Ok(())
    }
}

/// Answers with a fixed choice and counts how often it was asked.
pub struct CountingPrompt {
    choice: BackupChoice,
    asked: AtomicUsize,
}

impl CountingPrompt {
    pub fn new(choice: BackupChoice) -> Self {
        Self {
            choice,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackupPrompt for CountingPrompt {
    async fn choose(&self) -> BackupChoice {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.choice
    }
}

/// Write a one-file workspace named `name` into the legacy store of `env`.
pub async fn seed_legacy(env: &StorageEnvironment, name: &str) -> KeyValueBackend {
    let legacy = KeyValueBackend::new(env);
    assert!(legacy.probe().await);
    legacy
        .write(&format!(".workspaces/{name}/contracts/Storage.sol"), b"contract Storage {}")
        .await
        .unwrap();
    legacy
        .write(&format!(".workspaces/{name}/README.txt"), b"hello")
        .await
        .unwrap();
    legacy
}

/// Write a one-file workspace named `name` into the structured store of `env`.
pub async fn seed_preferred(env: &StorageEnvironment, name: &str) -> StructuredBackend {
    let preferred = StructuredBackend::new(env);
    assert!(preferred.probe().await);
    preferred
        .write(&format!(".workspaces/{name}/main.sol"), b"contract Main {}")
        .await
        .unwrap();
    preferred
}

/// Every `(path, contents)` pair in `backend`, directories with `None`.
pub async fn snapshot(backend: &dyn Backend) -> Vec<(String, Option<Vec<u8>>)> {
    let mut out = Vec::new();
    for entry in backend.entries("").await.unwrap() {
        let data = if entry.is_file() {
            Some(backend.read(&entry.path).await.unwrap())
        } else {
            None
        };
        out.push((entry.path, data));
    }
    out
}
