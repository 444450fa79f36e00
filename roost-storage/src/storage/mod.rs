//! Storage - Backend Trait and Implementations
//!
//! TigerStyle: Abstract storage with simulation-first testing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Backend Trait                          │
//! └─────────────────────────────────────────────────────────────┘
//!               ↑                                ↑
//!               │                                │
//!   ┌───────────┴───────────┐        ┌───────────┴───────────┐
//!   │  StructuredBackend    │        │   KeyValueBackend     │
//!   │  (preferred)          │        │   (legacy)            │
//!   └───────────┬───────────┘        └───────────┬───────────┘
//!               ↓                                ↓
//!        ObjectDbFactory                   KeyValueArea
//! ```
//!
//! # Layout
//!
//! User data lives under `.workspaces/<name>/...`. A workspace counts only
//! once it holds a file.

mod backend;
mod error;
mod keyvalue;
pub mod path;
mod structured;

pub use backend::{Backend, Entry, EntryKind};
pub use error::{StorageError, StorageResult};
pub use keyvalue::KeyValueBackend;
pub use structured::StructuredBackend;
