//! `TigerStyle` Constants
//!
//! All limits use big-endian naming: `CATEGORY_SPECIFICS_UNIT_LIMIT`.
//! Every constant includes its unit in the name.

// =============================================================================
// Backend Identity
// =============================================================================

/// Name of the structured (transactional object database) backend
pub const STRUCTURED_BACKEND_NAME: &str = "indexeddb";

/// Name of the key-value backend
pub const KEY_VALUE_BACKEND_NAME: &str = "localstorage";

// =============================================================================
// Workspace Layout
// =============================================================================

/// Directory that holds one sub-directory per user workspace
pub const WORKSPACES_ROOT: &str = ".workspaces";

/// Maximum length of a normalised path
pub const PATH_BYTES_MAX: usize = 4096;

/// Maximum depth of a normalised path
pub const PATH_SEGMENTS_COUNT_MAX: usize = 64;

/// Maximum size of a single file payload
pub const FILE_CONTENT_BYTES_MAX: usize = 64 * 1024 * 1024; // 64MB

// =============================================================================
// Structured Store
// =============================================================================

/// Default object database name
pub const STRUCTURED_DB_NAME_DEFAULT: &str = "roost-fs";

/// Schema version of the object database
pub const STRUCTURED_DB_VERSION: u32 = 1;

/// Object store holding file records
pub const STRUCTURED_FILES_STORE: &str = "files";

/// Key written and removed by the availability probe
pub const PROBE_KEY: &str = "__roost_probe__";

// =============================================================================
// Key-Value Store
// =============================================================================

/// Default key prefix for file entries in the key-value area
pub const KEY_VALUE_PREFIX_DEFAULT: &str = "roost:fs:";

/// Default key-value quota (browsers commonly allow 5MB per origin)
pub const KEY_VALUE_QUOTA_BYTES_DEFAULT: usize = 5 * 1024 * 1024;

/// Minimum accepted key-value quota
pub const KEY_VALUE_QUOTA_BYTES_MIN: usize = 1024;

// =============================================================================
// Backup
// =============================================================================

/// Default backup file name prefix
pub const BACKUP_FILE_PREFIX_DEFAULT: &str = "workspace-backup";

/// Backup archive extension
pub const BACKUP_FILE_EXTENSION: &str = "tar.gz";

/// Readme placed at the root of every backup archive
pub const BACKUP_README_NAME: &str = "readme.txt";

/// Readme content
pub const BACKUP_README_CONTENT: &str = "This is a workspace backup file.\n\
This archive can be restored into any storage backend.\n\
The .workspaces directory contains your workspaces.\n";

/// Owner name recorded in archive headers
pub const BACKUP_ARCHIVE_OWNER: &str = "roost";

/// Maximum number of entries in one backup archive
pub const BACKUP_ARCHIVE_ENTRIES_COUNT_MAX: usize = 1_000_000;

// =============================================================================
// Environment Overrides
// =============================================================================

/// Fragment flag forcing the preferred backend unavailable
pub const OVERRIDE_FALLBACK_FLAG: &str = "e2e_testmigration_fallback=true";

/// Fragment flag seeding synthetic data into the legacy backend
pub const OVERRIDE_MIGRATION_FLAG: &str = "e2e_testmigration=true";

/// Fragment flag forcing every backend unavailable
pub const OVERRIDE_BLOCK_STORAGE_FLAG: &str = "e2e_testblock_storage=true";

/// Scheme a launch URL must use for overrides to apply
pub const OVERRIDE_GATE_SCHEME_DEFAULT: &str = "http";

/// Host a launch URL must use for overrides to apply
pub const OVERRIDE_GATE_HOST_DEFAULT: &str = "127.0.0.1";

/// Port a launch URL must use for overrides to apply
pub const OVERRIDE_GATE_PORT_DEFAULT: u16 = 8080;

/// Environment variable holding the launch URL
pub const LAUNCH_URL_ENV_VAR: &str = "ROOST_LAUNCH_URL";

// =============================================================================
// User-Facing Messages
// =============================================================================

/// Shown when no backend can be activated
pub const UNSUPPORTED_MESSAGE: &str = "Your browser does not support any of the filesystems \
required by this application. Either change the settings in your browser or use a supported browser.";

/// Shown when startup fails unexpectedly
pub const HARD_REFRESH_MESSAGE: &str = "An unknown error has occurred while loading the application.
Doing a hard refresh might fix this issue:

Windows:
- Chrome: CTRL + F5 or CTRL + Reload Button
- Firefox: CTRL + SHIFT + R or CTRL + F5

MacOS:
- Chrome & FireFox: CMD + SHIFT + R or SHIFT + Reload Button

Linux:
- Chrome & FireFox: CTRL + SHIFT + R";

/// Shown when legacy data is about to be migrated
pub const BACKUP_PROMPT_MESSAGE: &str = "This app will be updated now. Please download a backup \
of your files now to make sure you don't lose your work.
You don't need to do anything else, your files will be available when the app loads.";

// =============================================================================
// Telemetry
// =============================================================================

/// Default sampling rate (1.0 = 100% of traces)
pub const TELEMETRY_SAMPLING_RATE_DEFAULT: f64 = 1.0;

/// Minimum sampling rate
pub const TELEMETRY_SAMPLING_RATE_MIN: f64 = 0.0;

/// Maximum sampling rate
pub const TELEMETRY_SAMPLING_RATE_MAX: f64 = 1.0;

/// Export timeout in milliseconds
pub const TELEMETRY_EXPORT_TIMEOUT_MS: u64 = 10_000;

/// Default log filter when `RUST_LOG` is unset
pub const LOG_FILTER_DEFAULT: &str = "roost_storage=info,roost_core=info";
