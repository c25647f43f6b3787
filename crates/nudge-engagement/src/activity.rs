// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only activity classification over rolling windows.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use nudge_core::types::{ActiveUserSummary, InactiveUser, TransactionActivity};
use nudge_core::{ActivityLog, EngagementStore, NudgeError, ProfileStore};

use crate::settings::EngagementSettings;

/// Inactive users split by their re-engagement opt-out flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptOutFilter {
    pub eligible: Vec<InactiveUser>,
    pub opted_out: Vec<String>,
}

impl OptOutFilter {
    /// Share of users removed by the filter, in percent.
    pub fn filter_rate(&self) -> f64 {
        let total = self.eligible.len() + self.opted_out.len();
        if total == 0 {
            0.0
        } else {
            self.opted_out.len() as f64 * 100.0 / total as f64
        }
    }
}

pub struct ActivityDetector {
    activity: Arc<dyn ActivityLog>,
    engagement: Arc<dyn EngagementStore>,
    profiles: Arc<dyn ProfileStore>,
    settings: EngagementSettings,
}

impl ActivityDetector {
    pub fn new(
        activity: Arc<dyn ActivityLog>,
        engagement: Arc<dyn EngagementStore>,
        profiles: Arc<dyn ProfileStore>,
        settings: EngagementSettings,
    ) -> Self {
        Self {
            activity,
            engagement,
            profiles,
            settings,
        }
    }

    /// Users with transactions or bot activity in the active window,
    /// excluding dormant and opted-out users.
    pub async fn get_active_users_last_week(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ActiveUserSummary>, NudgeError> {
        self.activity
            .list_active_users_since(now - self.settings.active_window)
            .await
    }

    /// Transactions in the last `days` days, plus one if the user talked to
    /// the bot in that window.
    pub async fn get_user_activity_count(
        &self,
        user_id: &str,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<u64, NudgeError> {
        let since = now - TimeDelta::days(i64::from(days));
        let transactions = self.activity.count_transactions_since(user_id, since).await?;
        let bot_activity = self
            .engagement
            .get_state(user_id)
            .await?
            .is_some_and(|s| s.last_activity_at >= since);
        Ok(transactions + u64::from(bot_activity))
    }

    /// `active` users idle for longer than the inactivity threshold.
    pub async fn get_inactive_users(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<InactiveUser>, NudgeError> {
        self.activity
            .list_users_inactive_since(now - self.settings.inactivity)
            .await
    }

    /// Per-user transaction counts over the active window.
    pub async fn get_transaction_activity(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<TransactionActivity>, NudgeError> {
        self.activity
            .list_transaction_activity_since(now - self.settings.active_window)
            .await
    }

    /// Split users by their re-engagement opt-out flag.
    pub async fn filter_opted_out(
        &self,
        users: Vec<InactiveUser>,
    ) -> Result<OptOutFilter, NudgeError> {
        let ids: Vec<String> = users.iter().map(|u| u.user_id.clone()).collect();
        let flags = self.profiles.get_opt_out_flags(&ids).await?;
        let (opted_out, eligible): (Vec<_>, Vec<_>) = users
            .into_iter()
            .partition(|u| flags.get(&u.user_id).copied().unwrap_or(false));
        Ok(OptOutFilter {
            eligible,
            opted_out: opted_out.into_iter().map(|u| u.user_id).collect(),
        })
    }
}
