// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;

use crate::error::NudgeError;
use crate::traits::adapter::PluginAdapter;

/// Lifecycle of a storage backend.
///
/// The data access itself is split across [`EngagementStore`](crate::EngagementStore),
/// [`ActivityLog`](crate::ActivityLog), [`ProfileStore`](crate::ProfileStore) and
/// [`QueueStore`](crate::QueueStore).
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), NudgeError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), NudgeError>;
}
