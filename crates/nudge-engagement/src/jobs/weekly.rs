// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Weekly review job: one `weekly_review` message per active user.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use nudge_core::NudgeError;
use nudge_core::types::{MessageType, Params};

use crate::activity::ActivityDetector;
use crate::jobs::JobResult;
use crate::queue::{MessageQueue, QueueRequest};

/// Localization key of the weekly review message.
pub const WEEKLY_REVIEW_KEY: &str = "engagement.weekly_review";

pub struct WeeklyReviewJob {
    detector: Arc<ActivityDetector>,
    queue: MessageQueue,
}

impl WeeklyReviewJob {
    pub fn new(detector: Arc<ActivityDetector>, queue: MessageQueue) -> Self {
        Self { detector, queue }
    }

    pub async fn run(&self) -> Result<JobResult, NudgeError> {
        self.run_at(Utc::now()).await
    }

    /// Queue reviews for users active in the window ending at `now`.
    ///
    /// The active-user query failing fails the run; enqueue failures are
    /// counted per user.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<JobResult, NudgeError> {
        let started = Instant::now();
        let mut result = JobResult::new("weekly");
        let users = self.detector.get_active_users_last_week(now).await?;
        info!(users = users.len(), "weekly review job started");

        for user in users {
            result.processed += 1;
            let Some(jid) = user.destination_jid else {
                warn!(user_id = %user.user_id, "no destination for weekly review, skipped");
                result.skipped += 1;
                continue;
            };
            let params = Params::from([(
                "transaction_count".to_string(),
                user.transaction_count.to_string(),
            )]);
            let queued = self
                .queue
                .queue_message(QueueRequest {
                    user_id: user.user_id.clone(),
                    message_type: MessageType::WeeklyReview,
                    message_key: WEEKLY_REVIEW_KEY.to_string(),
                    message_params: params,
                    destination: user.destination,
                    destination_jid: jid,
                    scheduled_for: now,
                    idempotency_key: None,
                })
                .await;
            if queued {
                result.succeeded += 1;
            } else {
                result.failed += 1;
                result
                    .errors
                    .push(format!("{}: weekly review not queued", user.user_id));
            }
        }

        result.finish(started);
        info!(
            processed = result.processed,
            succeeded = result.succeeded,
            failed = result.failed,
            skipped = result.skipped,
            "weekly review job finished"
        );
        Ok(result)
    }
}
