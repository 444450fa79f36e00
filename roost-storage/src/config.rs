//! Storage Configuration
//!
//! `TigerStyle`: Sensible defaults, builder pattern, explicit over implicit.

use url::Url;

use crate::constants::{
    BACKUP_FILE_PREFIX_DEFAULT, KEY_VALUE_PREFIX_DEFAULT, KEY_VALUE_QUOTA_BYTES_DEFAULT,
    KEY_VALUE_QUOTA_BYTES_MIN, OVERRIDE_GATE_HOST_DEFAULT, OVERRIDE_GATE_PORT_DEFAULT,
    OVERRIDE_GATE_SCHEME_DEFAULT, STRUCTURED_DB_NAME_DEFAULT,
};
use crate::platform::{StorageEnvironment, StorageEnvironmentBuilder};
use crate::storage::{KeyValueBackend, StructuredBackend};

// =============================================================================
// OverrideGate
// =============================================================================

/// Launch origin that test overrides are honoured from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideGate {
    /// URL scheme
    pub scheme: String,
    /// Host name or address
    pub host: String,
    /// Port (explicit or the scheme's default)
    pub port: u16,
}

impl Default for OverrideGate {
    fn default() -> Self {
        Self {
            scheme: OVERRIDE_GATE_SCHEME_DEFAULT.to_string(),
            host: OVERRIDE_GATE_HOST_DEFAULT.to_string(),
            port: OVERRIDE_GATE_PORT_DEFAULT,
        }
    }
}

impl OverrideGate {
    /// Gate on an explicit origin.
    #[must_use]
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    /// Whether `url` was served from this origin.
    #[must_use]
    pub fn matches(&self, url: &Url) -> bool {
        url.scheme() == self.scheme
            && url.host_str() == Some(self.host.as_str())
            && url.port_or_known_default() == Some(self.port)
    }
}

// =============================================================================
// StorageConfig
// =============================================================================

/// Configuration for backends, backups and migration.
///
/// # Example
///
/// ```rust
/// use roost_storage::StorageConfig;
///
/// let config = StorageConfig::default()
///     .with_db_name("ide-fs")
///     .with_backup_file_prefix("ide-backup");
/// assert!(config.verify_migration);
/// ```
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Object database name.
    ///
    /// Default: "roost-fs"
    pub db_name: String,

    /// Key prefix for entries in the key-value area.
    ///
    /// Default: "roost:fs:"
    pub key_value_prefix: String,

    /// Key-value area quota in bytes.
    ///
    /// Default: 5MB
    pub key_value_quota_bytes: usize,

    /// Backup file name prefix.
    ///
    /// Default: "workspace-backup"
    pub backup_file_prefix: String,

    /// Re-read and hash every copied file after migration.
    ///
    /// Default: true
    pub verify_migration: bool,

    /// Origin test overrides are honoured from.
    pub override_gate: OverrideGate,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_name: STRUCTURED_DB_NAME_DEFAULT.to_string(),
            key_value_prefix: KEY_VALUE_PREFIX_DEFAULT.to_string(),
            key_value_quota_bytes: KEY_VALUE_QUOTA_BYTES_DEFAULT,
            backup_file_prefix: BACKUP_FILE_PREFIX_DEFAULT.to_string(),
            verify_migration: true,
            override_gate: OverrideGate::default(),
        }
    }
}

impl StorageConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `ROOST_DB_NAME`, `ROOST_KV_QUOTA_BYTES` and
    /// `ROOST_BACKUP_PREFIX`. Unparseable values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("ROOST_DB_NAME") {
            if !name.is_empty() {
                config.db_name = name;
            }
        }
        if let Ok(raw) = std::env::var("ROOST_KV_QUOTA_BYTES") {
            match raw.parse::<usize>() {
                Ok(bytes) => config = config.with_key_value_quota_bytes(bytes),
                Err(e) => tracing::warn!(value = %raw, error = %e, "ignoring ROOST_KV_QUOTA_BYTES"),
            }
        }
        if let Ok(prefix) = std::env::var("ROOST_BACKUP_PREFIX") {
            if !prefix.is_empty() {
                config.backup_file_prefix = prefix;
            }
        }
        config
    }

    /// Set the object database name.
    #[must_use]
    pub fn with_db_name(mut self, name: impl Into<String>) -> Self {
        self.db_name = name.into();
        self
    }

    /// Set the key-value key prefix.
    #[must_use]
    pub fn with_key_value_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_value_prefix = prefix.into();
        self
    }

    /// Set the key-value quota. Values below the minimum are raised to it.
    #[must_use]
    pub fn with_key_value_quota_bytes(mut self, bytes: usize) -> Self {
        self.key_value_quota_bytes = bytes.max(KEY_VALUE_QUOTA_BYTES_MIN);
        self
    }

    /// Set the backup file name prefix.
    #[must_use]
    pub fn with_backup_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.backup_file_prefix = prefix.into();
        self
    }

    /// Skip post-migration verification.
    #[must_use]
    pub fn without_verification(mut self) -> Self {
        self.verify_migration = false;
        self
    }

    /// Set the override gate.
    #[must_use]
    pub fn with_override_gate(mut self, gate: OverrideGate) -> Self {
        self.override_gate = gate;
        self
    }

    /// Environment builder carrying this config's quota.
    #[must_use]
    pub fn environment(&self) -> StorageEnvironmentBuilder {
        StorageEnvironment::builder().key_value_quota_bytes(self.key_value_quota_bytes)
    }

    /// Preferred backend on `env`.
    #[must_use]
    pub fn structured_backend(&self, env: &StorageEnvironment) -> StructuredBackend {
        StructuredBackend::with_db_name(env, self.db_name.clone())
    }

    /// Legacy backend on `env`.
    #[must_use]
    pub fn key_value_backend(&self, env: &StorageEnvironment) -> KeyValueBackend {
        KeyValueBackend::with_prefix(env, self.key_value_prefix.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.db_name, STRUCTURED_DB_NAME_DEFAULT);
        assert_eq!(config.key_value_quota_bytes, KEY_VALUE_QUOTA_BYTES_DEFAULT);
        assert!(config.verify_migration);
        assert_eq!(config.override_gate, OverrideGate::default());
    }

    #[test]
    fn test_builder_pattern() {
        let config = StorageConfig::new()
            .with_db_name("ide")
            .with_key_value_prefix("ide:")
            .with_key_value_quota_bytes(10)
            .with_backup_file_prefix("ide-backup")
            .without_verification();

        assert_eq!(config.db_name, "ide");
        assert_eq!(config.key_value_prefix, "ide:");
        assert_eq!(config.key_value_quota_bytes, KEY_VALUE_QUOTA_BYTES_MIN);
        assert_eq!(config.backup_file_prefix, "ide-backup");
        assert!(!config.verify_migration);
    }

    #[test]
    fn test_gate_matches() {
        let gate = OverrideGate::default();
        assert!(gate.matches(&Url::parse("http://127.0.0.1:8080/#e2e_testmigration=true").unwrap()));
        assert!(!gate.matches(&Url::parse("https://127.0.0.1:8080/").unwrap()));
        assert!(!gate.matches(&Url::parse("http://localhost:8080/").unwrap()));
        assert!(!gate.matches(&Url::parse("http://127.0.0.1:8081/").unwrap()));
    }

    #[test]
    fn test_gate_default_port() {
        let gate = OverrideGate::new("https", "ide.example.org", 443);
        assert!(gate.matches(&Url::parse("https://ide.example.org/").unwrap()));
    }

    #[tokio::test]
    async fn test_backends_use_config_names() {
        use crate::storage::Backend;

        let config = StorageConfig::default().with_db_name("custom");
        let env = config.environment().build();
        let backend = config.structured_backend(&env);
        assert_eq!(backend.db_name(), "custom");
        assert!(backend.probe().await);
        assert_eq!(config.key_value_backend(&env).prefix(), KEY_VALUE_PREFIX_DEFAULT);
    }
}
