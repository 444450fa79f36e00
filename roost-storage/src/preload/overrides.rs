//! Launch-URL test overrides.
//!
//! Flags live in the URL fragment and are honoured only when the URL's origin
//! matches the configured [`OverrideGate`]. Read once at startup.

use url::Url;

use crate::config::OverrideGate;
use crate::constants::{
    LAUNCH_URL_ENV_VAR, OVERRIDE_BLOCK_STORAGE_FLAG, OVERRIDE_FALLBACK_FLAG,
    OVERRIDE_MIGRATION_FLAG,
};

/// Test overrides in effect for this session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvironmentOverrides {
    /// Preferred backend is never selected
    pub migration_fallback: bool,
    /// Legacy backend is seeded with synthetic workspace data
    pub migration_test: bool,
    /// No backend is ever selected
    pub block_storage: bool,
}

impl EnvironmentOverrides {
    /// No overrides.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Read flags from `launch_url`'s fragment if its origin matches `gate`.
    ///
    /// An unparseable URL yields no overrides.
    #[must_use]
    pub fn from_launch_url(launch_url: &str, gate: &OverrideGate) -> Self {
        let url = match Url::parse(launch_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(error = %e, "launch URL unparseable, no overrides");
                return Self::none();
            }
        };
        if !gate.matches(&url) {
            return Self::none();
        }

        let fragment = url.fragment().unwrap_or_default();
        let overrides = Self {
            migration_fallback: fragment.contains(OVERRIDE_FALLBACK_FLAG),
            migration_test: fragment.contains(OVERRIDE_MIGRATION_FLAG),
            block_storage: fragment.contains(OVERRIDE_BLOCK_STORAGE_FLAG),
        };
        if overrides.any() {
            tracing::info!(?overrides, "test overrides active");
        }
        overrides
    }

    /// Read the launch URL from `ROOST_LAUNCH_URL`; unset means no overrides.
    #[must_use]
    pub fn from_env(gate: &OverrideGate) -> Self {
        std::env::var(LAUNCH_URL_ENV_VAR)
            .map(|url| Self::from_launch_url(&url, gate))
            .unwrap_or_default()
    }

    /// Whether any flag is set.
    #[must_use]
    pub fn any(&self) -> bool {
        self.migration_fallback || self.migration_test || self.block_storage
    }

    /// Whether the preferred slot is forced unavailable.
    #[must_use]
    pub fn preferred_forced_unavailable(&self) -> bool {
        self.migration_fallback || self.block_storage
    }

    /// Whether the legacy slot is forced unavailable.
    #[must_use]
    pub fn legacy_forced_unavailable(&self) -> bool {
        self.block_storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(url: &str) -> EnvironmentOverrides {
        EnvironmentOverrides::from_launch_url(url, &OverrideGate::default())
    }

    #[test]
    fn test_flags_from_fragment() {
        let o = parse("http://127.0.0.1:8080/#e2e_testmigration=true");
        assert!(o.migration_test);
        assert!(!o.migration_fallback);
        assert!(!o.block_storage);

        let o = parse("http://127.0.0.1:8080/#e2e_testmigration_fallback=true");
        assert!(o.migration_fallback);
        assert!(!o.migration_test);
        assert!(o.preferred_forced_unavailable());
        assert!(!o.legacy_forced_unavailable());

        let o = parse("http://127.0.0.1:8080/#e2e_testblock_storage=true");
        assert!(o.preferred_forced_unavailable());
        assert!(o.legacy_forced_unavailable());
    }

    #[test]
    fn test_flags_combine() {
        let o = parse("http://127.0.0.1:8080/#activate=x&e2e_testmigration=true&e2e_testmigration_fallback=true");
        assert!(o.migration_test);
        assert!(o.migration_fallback);
    }

    #[test]
    fn test_gate_mismatch_ignores_flags() {
        for url in [
            "https://127.0.0.1:8080/#e2e_testblock_storage=true",
            "http://localhost:8080/#e2e_testblock_storage=true",
            "http://127.0.0.1:9090/#e2e_testblock_storage=true",
        ] {
            assert_eq!(parse(url), EnvironmentOverrides::none());
        }
    }

    #[test]
    fn test_flags_outside_fragment_are_ignored() {
        let o = parse("http://127.0.0.1:8080/?e2e_testblock_storage=true");
        assert!(!o.any());
    }

    #[test]
    fn test_unparseable_url() {
        assert!(!parse("not a url").any());
    }
}
