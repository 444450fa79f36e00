//! Object Database - Transactional Record Store
//!
//! `TigerStyle`: named, versioned databases of object stores. Writes are
//! staged in a transaction and applied all-or-nothing on commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use roost_core::dst::{FaultInjector, SimClock};

use crate::storage::{EntryKind, StorageError, StorageResult};

use super::{roll_fault, FaultOutcome};

/// A stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// File or directory
    pub kind: EntryKind,
    /// File contents (empty for directories)
    pub data: Vec<u8>,
    /// Simulated time of the last write
    pub modified_ms: u64,
}

impl Record {
    /// Directory record.
    #[must_use]
    pub fn directory(modified_ms: u64) -> Self {
        Self {
            kind: EntryKind::Directory,
            data: Vec::new(),
            modified_ms,
        }
    }

    /// File record.
    #[must_use]
    pub fn file(data: Vec<u8>, modified_ms: u64) -> Self {
        Self {
            kind: EntryKind::File,
            data,
            modified_ms,
        }
    }
}

type ObjectStore = BTreeMap<String, Record>;

// =============================================================================
// Factory
// =============================================================================

/// Opens named databases. Databases outlive the handles opened on them.
#[derive(Debug)]
pub struct ObjectDbFactory {
    databases: RwLock<HashMap<String, Arc<ObjectDatabase>>>,
    faults: Arc<FaultInjector>,
    clock: SimClock,
    denied: bool,
    opens: AtomicU64,
}

impl ObjectDbFactory {
    pub(crate) fn new(faults: Arc<FaultInjector>, clock: SimClock, denied: bool) -> Self {
        Self {
            databases: RwLock::new(HashMap::new()),
            faults,
            clock,
            denied,
            opens: AtomicU64::new(0),
        }
    }

    /// Open (or create) a database, creating any missing object stores.
    ///
    /// # Errors
    /// `AccessDenied` when the environment refuses the API, `OpenFailed` on an
    /// injected open fault or when `version` is older than the stored schema.
    pub fn open(
        &self,
        name: &str,
        version: u32,
        stores: &[&str],
    ) -> StorageResult<Arc<ObjectDatabase>> {
        assert!(!name.is_empty(), "database name must not be empty");
        assert!(version > 0, "database version must be positive");

        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.denied {
            return Err(StorageError::access_denied(name));
        }
        roll_fault(&self.faults, "structured_open")?;

        let mut databases = self
            .databases
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let db = databases
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(ObjectDatabase {
                    name: name.to_string(),
                    version: RwLock::new(0),
                    stores: RwLock::new(HashMap::new()),
                    faults: Arc::clone(&self.faults),
                    clock: self.clock.clone(),
                })
            })
            .clone();
        drop(databases);

        db.upgrade(version, stores)?;
        Ok(db)
    }

    /// Number of `open` calls made, including failed ones.
    #[must_use]
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Database
// =============================================================================

/// An open database.
#[derive(Debug)]
pub struct ObjectDatabase {
    name: String,
    version: RwLock<u32>,
    stores: RwLock<HashMap<String, ObjectStore>>,
    faults: Arc<FaultInjector>,
    clock: SimClock,
}

/// Transaction access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Reads only
    ReadOnly,
    /// Reads and writes
    ReadWrite,
}

impl ObjectDatabase {
    /// Database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current schema version.
    #[must_use]
    pub fn version(&self) -> u32 {
        *self.version.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulated time used to stamp records.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn upgrade(&self, version: u32, stores: &[&str]) -> StorageResult<()> {
        let mut current = self.version.write().unwrap_or_else(PoisonError::into_inner);
        if version < *current {
            return Err(StorageError::OpenFailed(format!(
                "{}: requested version {version} is older than {}",
                self.name, *current
            )));
        }
        if version > *current {
            let mut existing = self.stores.write().unwrap_or_else(PoisonError::into_inner);
            for store in stores {
                existing.entry((*store).to_string()).or_default();
            }
            tracing::debug!(db = %self.name, from = *current, to = version, "upgraded schema");
            *current = version;
        }
        Ok(())
    }

    /// Read one record.
    ///
    /// # Errors
    /// `ReadFailed` on an injected fault or unknown store. A corruption fault
    /// yields `Corrupted`.
    pub fn get(&self, store: &str, key: &str) -> StorageResult<Option<Record>> {
        if roll_fault(&self.faults, "structured_read")? == FaultOutcome::Corrupt {
            return Err(StorageError::Corrupted {
                path: key.to_string(),
            });
        }
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        let records = stores
            .get(store)
            .ok_or_else(|| StorageError::ReadFailed(format!("no object store {store}")))?;
        Ok(records.get(key).cloned())
    }

    /// All records whose key starts with `prefix`, in key order.
    ///
    /// # Errors
    /// `ReadFailed` on an injected fault or unknown store.
    pub fn scan(&self, store: &str, prefix: &str) -> StorageResult<Vec<(String, Record)>> {
        roll_fault(&self.faults, "structured_read")?;
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        let records = stores
            .get(store)
            .ok_or_else(|| StorageError::ReadFailed(format!("no object store {store}")))?;
        Ok(records
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect())
    }

    /// Begin a transaction on one object store.
    #[must_use]
    pub fn transaction(&self, store: &str, mode: TransactionMode) -> Transaction<'_> {
        Transaction {
            db: self,
            store: store.to_string(),
            mode,
            ops: Vec::new(),
        }
    }

    /// Number of records in a store.
    #[must_use]
    pub fn record_count(&self, store: &str) -> usize {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(store)
            .map_or(0, BTreeMap::len)
    }
}

// =============================================================================
// Transaction
// =============================================================================

#[derive(Debug)]
enum Op {
    Put(String, Record),
    Delete(String),
}

/// Staged writes against one object store.
#[derive(Debug)]
#[must_use = "a transaction does nothing until committed"]
pub struct Transaction<'db> {
    db: &'db ObjectDatabase,
    store: String,
    mode: TransactionMode,
    ops: Vec<Op>,
}

impl Transaction<'_> {
    /// Stage a put.
    ///
    /// # Errors
    /// `WriteFailed` in a read-only transaction.
    pub fn put(&mut self, key: impl Into<String>, record: Record) -> StorageResult<()> {
        self.require_write()?;
        self.ops.push(Op::Put(key.into(), record));
        Ok(())
    }

    /// Stage a delete.
    ///
    /// # Errors
    /// `WriteFailed` in a read-only transaction.
    pub fn delete(&mut self, key: impl Into<String>) -> StorageResult<()> {
        self.require_write()?;
        self.ops.push(Op::Delete(key.into()));
        Ok(())
    }

    fn require_write(&self) -> StorageResult<()> {
        if self.mode == TransactionMode::ReadOnly {
            return Err(StorageError::WriteFailed(format!(
                "read-only transaction on {}",
                self.store
            )));
        }
        Ok(())
    }

    /// Apply every staged operation, or none.
    ///
    /// # Errors
    /// `WriteFailed` on an injected write or commit fault; nothing is applied.
    pub fn commit(self) -> StorageResult<usize> {
        if self.ops.is_empty() {
            return Ok(0);
        }
        let corrupt = roll_fault(&self.db.faults, "structured_write")? == FaultOutcome::Corrupt;
        roll_fault(&self.db.faults, "structured_commit")?;

        let mut stores = self.db.stores.write().unwrap_or_else(PoisonError::into_inner);
        let records = stores
            .get_mut(&self.store)
            .ok_or_else(|| StorageError::WriteFailed(format!("no object store {}", self.store)))?;

        let applied = self.ops.len();
        for op in self.ops {
            match op {
                Op::Put(key, mut record) => {
                    if corrupt {
                        if let Some(byte) = record.data.first_mut() {
                            *byte ^= 0xFF;
                        }
                    }
                    records.insert(key, record);
                }
                Op::Delete(key) => {
                    records.remove(&key);
                }
            }
        }
        Ok(applied)
    }
}
