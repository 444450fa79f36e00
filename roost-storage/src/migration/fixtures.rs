//! Workspace seeding from JSON trees.

use serde_json::{json, Value};

use crate::storage::{Backend, StorageError, StorageResult};

/// Fixed tree seeded into the legacy backend by the migration-test override.
///
/// One workspace with files, one empty workspace (which must not count as
/// user data).
#[must_use]
pub fn migration_test_data() -> Value {
    json!({
        ".workspaces": {
            "emptyspace": {},
            "workspace_test": {
                "TEST_README.txt": "TEST README",
                "Untitled6.sol": "pragma solidity ^0.8.0;\ncontract Untitled6 {}\n",
                "tests": {
                    "test_storage.js": "it('stores', async () => {})\n"
                },
                ".deps": {
                    "remix-tests": {
                        "remix_tests.sol": "library Assert {}\n",
                        "remix_accounts.sol": "library TestsAccounts {}\n"
                    }
                }
            }
        }
    })
}

/// Write `tree` into `destination`: objects become directories, strings files.
///
/// Returns the number of entries written.
///
/// # Errors
/// Any backend error, or `Serialization` for a node that is neither an object
/// nor a string.
pub async fn populate_workspace(tree: &Value, destination: &dyn Backend) -> StorageResult<usize> {
    let Value::Object(root) = tree else {
        return Err(StorageError::Serialization("workspace tree root must be an object".into()));
    };

    let mut pending: Vec<(String, &Value)> = root
        .iter()
        .rev()
        .map(|(name, node)| (name.clone(), node))
        .collect();
    let mut written = 0;

    while let Some((path, node)) = pending.pop() {
        match node {
            Value::Object(children) => {
                destination.create_dir(&path).await?;
                pending.extend(
                    children
                        .iter()
                        .rev()
                        .map(|(name, child)| (format!("{path}/{name}"), child)),
                );
            }
            Value::String(content) => destination.write(&path, content.as_bytes()).await?,
            other => {
                return Err(StorageError::Serialization(format!(
                    "{path}: unsupported node {other}"
                )))
            }
        }
        written += 1;
    }

    tracing::debug!(backend = destination.name(), written, "populated workspace tree");
    Ok(written)
}
