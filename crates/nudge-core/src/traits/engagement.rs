// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence of per-user engagement state and the transition audit log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::NudgeError;
use crate::types::{EngagementState, StateChange, StateTransitionRecord};

/// Store for [`EngagementState`] rows and their append-only transition log.
#[async_trait]
pub trait EngagementStore: Send + Sync {
    /// Loads the engagement record for a user, if one exists.
    async fn get_state(&self, user_id: &str) -> Result<Option<EngagementState>, NudgeError>;

    /// Creates an `active` record unless one already exists, returning the stored row.
    async fn create_state(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<EngagementState, NudgeError>;

    /// Moves `last_activity_at` forward to `at` (never backwards).
    async fn touch_activity(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), NudgeError>;

    /// Atomically applies a transition and appends its audit record.
    ///
    /// Returns `false` without writing anything when the row is no longer in
    /// `change.expected_state` (another run got there first).
    async fn apply_transition(&self, change: &StateChange) -> Result<bool, NudgeError>;

    /// Users in `goodbye_sent` whose response window closed before `now`.
    async fn list_expired_goodbyes(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EngagementState>, NudgeError>;

    /// Users in `remind_later` whose reminder time is before `now`.
    async fn list_due_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<EngagementState>, NudgeError>;

    /// Transition history for a user, oldest first.
    async fn list_transitions(
        &self,
        user_id: &str,
    ) -> Result<Vec<StateTransitionRecord>, NudgeError>;
}
