// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable outbound message queue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::NudgeError;
use crate::types::{NewQueuedMessage, QueueStats, QueueStatus, QueuedMessage};

/// Storage for [`QueuedMessage`] rows with a unique idempotency key.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Inserts the message unless its idempotency key already exists.
    ///
    /// Returns `true` if a new row was written, `false` if the key was taken.
    async fn insert_message(&self, message: &NewQueuedMessage) -> Result<bool, NudgeError>;

    /// Up to `limit` pending messages scheduled at or before `now`, oldest
    /// first, skipping messages held by an unexpired claim.
    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueuedMessage>, NudgeError>;

    /// Claims a pending message for delivery until `lease_until`.
    ///
    /// Returns `true` only for the caller that won the claim. A message that
    /// is no longer pending, or is held by an unexpired lease, is not claimed.
    async fn claim_message(
        &self,
        id: i64,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<bool, NudgeError>;

    /// Marks a message as delivered.
    async fn mark_sent(&self, id: i64, at: DateTime<Utc>) -> Result<(), NudgeError>;

    /// Records a failed delivery attempt and returns the resulting status.
    ///
    /// The retry count is incremented; once it reaches `max_retries` the
    /// message becomes [`QueueStatus::Failed`] and is never fetched again.
    async fn record_failure(
        &self,
        id: i64,
        error: &str,
        max_retries: u32,
    ) -> Result<QueueStatus, NudgeError>;

    /// Loads a message by id.
    async fn get_message(&self, id: i64) -> Result<Option<QueuedMessage>, NudgeError>;

    /// Number of rows carrying the given idempotency key (0 or 1).
    async fn count_by_idempotency_key(&self, key: &str) -> Result<u64, NudgeError>;

    /// Row counts per status.
    async fn queue_stats(&self) -> Result<QueueStats, NudgeError>;
}
