// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage-facing adapter traits.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use nudge_config::model::StorageConfig;
use nudge_core::types::{
    ActiveUserSummary, EngagementState, InactiveUser, NewQueuedMessage, QueueStats, QueueStatus,
    QueuedMessage, StateChange, StateTransitionRecord, TransactionActivity, UserProfile,
};
use nudge_core::{
    ActivityLog, AdapterType, EngagementStore, HealthStatus, NudgeError, PluginAdapter,
    ProfileStore, QueueStore, StorageAdapter,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// One handle serves every store trait the engagement engine needs. The
/// database is opened on [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already opened database.
    pub fn from_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// The underlying database, or an error before [`StorageAdapter::initialize`].
    pub fn database(&self) -> Result<&Database, NudgeError> {
        self.db
            .get()
            .ok_or_else(|| NudgeError::storage("storage not initialized -- call initialize() first"))
    }

    async fn checkpoint(db: &Database) -> Result<(), NudgeError> {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, NudgeError> {
        let Ok(db) = self.database() else {
            return Ok(HealthStatus::Unhealthy("not initialized".to_string()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), NudgeError> {
        if let Some(db) = self.db.get() {
            Self::checkpoint(db).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), NudgeError> {
        let db =
            Database::open_with_options(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| NudgeError::storage("storage already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), NudgeError> {
        Self::checkpoint(self.database()?).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl EngagementStore for SqliteStorage {
    async fn get_state(&self, user_id: &str) -> Result<Option<EngagementState>, NudgeError> {
        queries::engagement::get_state(self.database()?, user_id).await
    }

    async fn create_state(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<EngagementState, NudgeError> {
        queries::engagement::create_state(self.database()?, user_id, at).await
    }

    async fn touch_activity(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), NudgeError> {
        queries::engagement::touch_activity(self.database()?, user_id, at).await
    }

    async fn apply_transition(&self, change: &StateChange) -> Result<bool, NudgeError> {
        queries::engagement::apply_transition(self.database()?, change).await
    }

    async fn list_expired_goodbyes(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EngagementState>, NudgeError> {
        queries::engagement::list_expired_goodbyes(self.database()?, now).await
    }

    async fn list_due_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EngagementState>, NudgeError> {
        queries::engagement::list_due_reminders(self.database()?, now).await
    }

    async fn list_transitions(
        &self,
        user_id: &str,
    ) -> Result<Vec<StateTransitionRecord>, NudgeError> {
        queries::engagement::list_transitions(self.database()?, user_id).await
    }
}

#[async_trait]
impl ActivityLog for SqliteStorage {
    async fn list_users_inactive_since(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<InactiveUser>, NudgeError> {
        queries::activity::list_users_inactive_since(self.database()?, threshold).await
    }

    async fn list_transaction_activity_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<TransactionActivity>, NudgeError> {
        queries::activity::list_transaction_activity_since(self.database()?, since).await
    }

    async fn count_transactions_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, NudgeError> {
        queries::activity::count_transactions_since(self.database()?, user_id, since).await
    }

    async fn list_active_users_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActiveUserSummary>, NudgeError> {
        queries::activity::list_active_users_since(self.database()?, since).await
    }
}

#[async_trait]
impl ProfileStore for SqliteStorage {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, NudgeError> {
        queries::profiles::get_profile(self.database()?, user_id).await
    }

    async fn get_opt_out_flags(
        &self,
        user_ids: &[String],
    ) -> Result<HashMap<String, bool>, NudgeError> {
        queries::profiles::get_opt_out_flags(self.database()?, user_ids).await
    }
}

#[async_trait]
impl QueueStore for SqliteStorage {
    async fn insert_message(&self, message: &NewQueuedMessage) -> Result<bool, NudgeError> {
        queries::queue::insert_message(self.database()?, message).await
    }

    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueuedMessage>, NudgeError> {
        queries::queue::fetch_due(self.database()?, now, limit).await
    }

    async fn claim_message(
        &self,
        id: i64,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<bool, NudgeError> {
        queries::queue::claim_message(self.database()?, id, now, lease_until).await
    }

    async fn mark_sent(&self, id: i64, at: DateTime<Utc>) -> Result<(), NudgeError> {
        queries::queue::mark_sent(self.database()?, id, at).await
    }

    async fn record_failure(
        &self,
        id: i64,
        error: &str,
        max_retries: u32,
    ) -> Result<QueueStatus, NudgeError> {
        queries::queue::record_failure(self.database()?, id, error, max_retries).await
    }

    async fn get_message(&self, id: i64) -> Result<Option<QueuedMessage>, NudgeError> {
        queries::queue::get_message(self.database()?, id).await
    }

    async fn count_by_idempotency_key(&self, key: &str) -> Result<u64, NudgeError> {
        queries::queue::count_by_idempotency_key(self.database()?, key).await
    }

    async fn queue_stats(&self) -> Result<QueueStats, NudgeError> {
        queries::queue::queue_stats(self.database()?).await
    }
}
