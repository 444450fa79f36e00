//! Storage Errors
//!
//! `TigerStyle`: Explicit error types with context.

use thiserror::Error;

/// Errors from backend and platform store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Backend was used before a successful probe opened it
    #[error("backend not open: {backend}")]
    NotOpen {
        /// Backend name
        backend: String,
    },

    /// Path does not exist
    #[error("not found: {path}")]
    NotFound {
        /// Normalised path
        path: String,
    },

    /// Path names a directory where a file was expected
    #[error("is a directory: {path}")]
    IsDirectory {
        /// Normalised path
        path: String,
    },

    /// A path component names a file where a directory was expected
    #[error("not a directory: {path}")]
    NotADirectory {
        /// Normalised path
        path: String,
    },

    /// Path failed validation
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// Path as given
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// The environment refuses access to the store
    #[error("access denied: {store}")]
    AccessDenied {
        /// Store name
        store: String,
    },

    /// Write would exceed the store quota
    #[error("quota exceeded: {required} bytes required, {quota} bytes allowed")]
    QuotaExceeded {
        /// Bytes the store would hold after the write
        required: usize,
        /// Quota in bytes
        quota: usize,
    },

    /// Opening the store failed
    #[error("open failed: {0}")]
    OpenFailed(String),

    /// Read failed
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// Write failed
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Stored record could not be decoded
    #[error("corrupted record: {path}")]
    Corrupted {
        /// Normalised path
        path: String,
    },

    /// Simulated fault (for DST)
    #[error("simulated fault: {fault_type}")]
    SimulatedFault {
        /// Type of simulated fault
        fault_type: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Host filesystem error
    #[error("io error: {0}")]
    Io(String),
}

impl StorageError {
    /// Create a not-open error.
    #[must_use]
    pub fn not_open(backend: impl Into<String>) -> Self {
        Self::NotOpen {
            backend: backend.into(),
        }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an invalid path error.
    #[must_use]
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an access denied error.
    #[must_use]
    pub fn access_denied(store: impl Into<String>) -> Self {
        Self::AccessDenied {
            store: store.into(),
        }
    }

    /// Create a simulated fault error.
    #[must_use]
    pub fn simulated_fault(fault_type: impl Into<String>) -> Self {
        Self::SimulatedFault {
            fault_type: fault_type.into(),
        }
    }

    /// Check if this is a transient error (a retry may succeed).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ReadFailed(_) | Self::WriteFailed(_) | Self::SimulatedFault { .. }
        )
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
