//! Path normalisation shared by every backend.
//!
//! Backends key entries by normalised path: relative, `/`-separated, no empty,
//! `.` or `..` segments. The empty string is the root.

use crate::constants::{PATH_BYTES_MAX, PATH_SEGMENTS_COUNT_MAX, PROBE_KEY, WORKSPACES_ROOT};

use super::error::{StorageError, StorageResult};

/// Normalise a path. Leading `/` and duplicate separators are dropped.
///
/// # Errors
/// Returns `InvalidPath` for `..` segments, NUL bytes or over-long paths.
pub fn normalize(path: &str) -> StorageResult<String> {
    if path.len() > PATH_BYTES_MAX {
        return Err(StorageError::invalid_path(path, "path too long"));
    }
    if path.contains('\0') {
        return Err(StorageError::invalid_path(path, "path contains NUL"));
    }

    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(StorageError::invalid_path(path, "parent segments are not allowed")),
            other => segments.push(other),
        }
    }

    if segments.len() > PATH_SEGMENTS_COUNT_MAX {
        return Err(StorageError::invalid_path(path, "path too deep"));
    }
    Ok(segments.join("/"))
}

/// Normalise a path that must name an entry (not the root or the probe key).
///
/// # Errors
/// Returns `InvalidPath` if the path is invalid, empty after normalisation,
/// or the key reserved for backend probes.
pub fn normalize_entry(path: &str) -> StorageResult<String> {
    let normalized = normalize(path)?;
    if normalized.is_empty() {
        return Err(StorageError::invalid_path(path, "path names the root"));
    }
    if normalized == PROBE_KEY {
        return Err(StorageError::invalid_path(path, "path is reserved"));
    }
    Ok(normalized)
}

/// Strict ancestors of a normalised path, outermost first.
///
/// `a/b/c` yields `["a", "a/b"]`.
#[must_use]
pub fn ancestors(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut end = 0;
    while let Some(offset) = path[end..].find('/') {
        end += offset;
        out.push(path[..end].to_string());
        end += 1;
    }
    out
}

/// Whether normalised `path` is `prefix` itself or lies beneath it.
#[must_use]
pub fn is_within(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path == prefix
        || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
}

/// Workspace a normalised path belongs to, if any.
///
/// `.workspaces/default/contracts/a.sol` belongs to `default`; `.workspaces`
/// itself and paths outside it belong to none.
#[must_use]
pub fn workspace_of(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(WORKSPACES_ROOT)?.strip_prefix('/')?;
    rest.split('/').next().filter(|name| !name.is_empty())
}
