//! # Roost Storage
//!
//! Storage selection and workspace migration for a browser-hosted IDE, with
//! deterministic simulation testing.
//!
//! ## Features
//!
//! - **Backend probing**: every storage model proves it can round-trip a write before it counts
//! - **Priority fallback**: the structured object store first, the key-value area second
//! - **Safe migration**: legacy workspaces copied forward, verified by SHA-256, never deleted
//! - **Backups**: deterministic `.tar.gz` archives of the legacy store, handed to a pluggable sink
//! - **Deterministic Testing**: every backend I/O path routes through a seeded fault injector
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use roost_storage::migration::MemorySink;
//! use roost_storage::platform::StorageEnvironment;
//! use roost_storage::preload::{BackupChoice, PreloadState, Preloader};
//! use roost_storage::telemetry::TracingTelemetry;
//! use roost_storage::StorageConfig;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let env = StorageEnvironment::in_memory();
//! let mut preloader = Preloader::from_config(
//!     &StorageConfig::default(),
//!     &env,
//!     Arc::new(MemorySink::new()),
//!     Arc::new(TracingTelemetry),
//! );
//!
//! preloader.probe().await?;
//! if preloader.state() == PreloadState::AwaitingUserChoice {
//!     preloader.choose(BackupChoice::DownloadBackup).await?;
//! }
//! let backend = preloader.load()?.expect("in-memory storage is always available");
//! assert_eq!(backend.name(), "indexeddb");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Preloader (state machine)               │
//! ├─────────────────────────────────────────────────────────┤
//! │  BackendRegistry   │ MigrationUtility │ TelemetrySink   │
//! ├─────────────────────────────────────────────────────────┤
//! │  StructuredBackend (preferred) │ KeyValueBackend (legacy)│
//! ├─────────────────────────────────────────────────────────┤
//! │  ObjectDbFactory   │ KeyValueArea     │ platform models │
//! ├─────────────────────────────────────────────────────────┤
//! │  roost-core DST          │ Fault injection + SimClock   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Feature Flags
//!
//! - `opentelemetry` - OTLP trace export alongside the fmt subscriber

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod migration;
pub mod platform;
pub mod preload;
pub mod registry;
pub mod storage;
pub mod telemetry;

// Re-export common types
pub use config::{OverrideGate, StorageConfig};
pub use migration::{BackupReceipt, MigrationError, MigrationRecord, MigrationUtility};
pub use platform::{ApiSupport, StorageEnvironment};
pub use preload::{
    BackupChoice, BackupPrompt, EnvironmentOverrides, Host, PreloadError, PreloadOutcome,
    PreloadState, Preloader, ProbeReport,
};
pub use registry::{Availability, BackendRegistry, CandidateSlot};
pub use storage::{
    Backend, Entry, EntryKind, KeyValueBackend, StorageError, StorageResult, StructuredBackend,
};
pub use telemetry::{StorageEvent, TelemetrySink};
