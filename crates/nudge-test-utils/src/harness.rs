// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite fixtures for end-to-end tests.

use nudge_config::model::StorageConfig;
use nudge_core::{NudgeError, StorageAdapter};
use nudge_storage::SqliteStorage;

/// Open a migrated [`SqliteStorage`] inside a fresh temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the storage is used.
pub async fn temp_storage() -> Result<(SqliteStorage, tempfile::TempDir), NudgeError> {
    let temp_dir =
        tempfile::TempDir::new().map_err(|e| NudgeError::Storage { source: e.into() })?;
    let db_path = temp_dir.path().join("nudge-test.db");

    let storage = SqliteStorage::new(StorageConfig {
        database_path: db_path.to_string_lossy().into_owned(),
        wal_mode: true,
    });
    storage.initialize().await?;
    Ok((storage, temp_dir))
}
