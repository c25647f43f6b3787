// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only view over the activity and transaction log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::NudgeError;
use crate::types::{ActiveUserSummary, InactiveUser, TransactionActivity};

/// Read interface over user activity owned by the surrounding application.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// `active` users with no bot activity and no transactions since `threshold`.
    async fn list_users_inactive_since(
        &self,
        threshold: DateTime<Utc>,
    ) -> Result<Vec<InactiveUser>, NudgeError>;

    /// Users that created at least one transaction since `since`.
    async fn list_transaction_activity_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<TransactionActivity>, NudgeError>;

    /// Number of transactions a single user created since `since`.
    async fn count_transactions_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, NudgeError>;

    /// Non-dormant, non-opted-out users active since `since`, joined with
    /// their delivery preferences.
    async fn list_active_users_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ActiveUserSummary>, NudgeError>;
}
