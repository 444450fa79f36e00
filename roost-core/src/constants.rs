//! `TigerStyle` Constants
//!
//! All limits use big-endian naming: `CATEGORY_SPECIFICS_UNIT_LIMIT`.
//! Every constant carries its unit in the name (`_MS`, `_BYTES`, `_COUNT`).

// =============================================================================
// DST (Deterministic Simulation Testing) Limits
// =============================================================================

/// Maximum probability for fault injection (1.0 = 100%)
pub const DST_FAULT_PROBABILITY_MAX: f64 = 1.0;

/// Maximum time advance per call in milliseconds
pub const DST_TIME_ADVANCE_MS_MAX: u64 = 86_400_000; // 24 hours

/// Maximum number of random bytes generated in one call
pub const DST_RANDOM_BYTES_COUNT_MAX: usize = 1_000_000;

/// Environment variable holding an explicit simulation seed
pub const DST_SEED_ENV_VAR: &str = "DST_SEED";

/// Multiplier used to derive fork seeds (golden ratio, 64-bit)
pub const DST_FORK_SEED_MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

// =============================================================================
// Time Constants
// =============================================================================

/// Milliseconds per second
pub const TIME_MS_PER_SEC: u64 = 1000;

/// Milliseconds per minute
pub const TIME_MS_PER_MIN: u64 = 60 * TIME_MS_PER_SEC;

/// Milliseconds per hour
pub const TIME_MS_PER_HOUR: u64 = 60 * TIME_MS_PER_MIN;
