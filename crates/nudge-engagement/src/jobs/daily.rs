// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily engagement job.
//!
//! Four fault-isolated phases: goodbye inactive users, expire unanswered
//! goodbyes, close due reminders, drain the queue. Re-running on the same
//! day applies no further transitions and queues no further messages.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use nudge_core::types::{Params, Trigger};

use crate::activity::ActivityDetector;
use crate::jobs::JobResult;
use crate::sender::QueueProcessor;
use crate::state_machine::{StateMachine, TransitionOutcome};

pub struct DailyEngagementJob {
    detector: Arc<ActivityDetector>,
    state_machine: Arc<StateMachine>,
    processor: Arc<QueueProcessor>,
}

impl DailyEngagementJob {
    pub fn new(
        detector: Arc<ActivityDetector>,
        state_machine: Arc<StateMachine>,
        processor: Arc<QueueProcessor>,
    ) -> Self {
        Self {
            detector,
            state_machine,
            processor,
        }
    }

    /// Run the job at the current time.
    pub async fn run(&self) -> JobResult {
        self.run_at(Utc::now()).await
    }

    /// Run the job as of `now`. Never fails; problems land in `errors`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> JobResult {
        let started = Instant::now();
        let mut result = JobResult::new("daily");
        info!(%now, "daily engagement job started");

        self.goodbye_inactive_users(now, &mut result).await;
        self.expire_goodbyes(now, &mut result).await;
        self.close_due_reminders(now, &mut result).await;

        match self.processor.process_message_queue(now).await {
            Ok(queue) => result.queue = Some(queue),
            Err(e) => {
                error!(error = %e, "queue processing failed");
                result.errors.push(format!("queue processing: {e}"));
            }
        }

        result.finish(started);
        info!(
            processed = result.processed,
            succeeded = result.succeeded,
            failed = result.failed,
            skipped = result.skipped,
            noops = result.noops,
            duration_ms = result.duration_ms,
            "daily engagement job finished"
        );
        result
    }

    async fn goodbye_inactive_users(&self, now: DateTime<Utc>, result: &mut JobResult) {
        let inactive = match self.detector.get_inactive_users(now).await {
            Ok(users) => users,
            Err(e) => {
                error!(error = %e, "inactive user query failed");
                result.errors.push(format!("inactive users: {e}"));
                return;
            }
        };
        let total = inactive.len();
        let split = match self.detector.filter_opted_out(inactive).await {
            Ok(split) => split,
            Err(e) => {
                error!(error = %e, "opt-out lookup failed, no goodbye sent");
                result.errors.push(format!("opt-out flags: {e}"));
                return;
            }
        };
        result.skipped += split.opted_out.len();
        info!(
            total,
            opted_out = split.opted_out.len(),
            eligible = split.eligible.len(),
            filter_rate_pct = split.filter_rate(),
            "opt-out filter applied to inactive users"
        );

        for user in split.eligible {
            let metadata = Params::from([(
                "last_activity_at".to_string(),
                user.last_activity_at.to_rfc3339(),
            )]);
            self.apply(&user.user_id, Trigger::Inactivity14d, metadata, now, result)
                .await;
        }
    }

    async fn expire_goodbyes(&self, now: DateTime<Utc>, result: &mut JobResult) {
        match self.state_machine.get_expired_goodbyes(now).await {
            Ok(expired) => {
                for state in expired {
                    self.apply(&state.user_id, Trigger::GoodbyeTimeout, Params::new(), now, result)
                        .await;
                }
            }
            Err(e) => {
                error!(error = %e, "expired goodbye query failed");
                result.errors.push(format!("expired goodbyes: {e}"));
            }
        }
    }

    async fn close_due_reminders(&self, now: DateTime<Utc>, result: &mut JobResult) {
        match self.state_machine.get_due_reminders(now).await {
            Ok(due) => {
                for state in due {
                    self.apply(&state.user_id, Trigger::ReminderDue, Params::new(), now, result)
                        .await;
                }
            }
            Err(e) => {
                error!(error = %e, "due reminder query failed");
                result.errors.push(format!("due reminders: {e}"));
            }
        }
    }

    async fn apply(
        &self,
        user_id: &str,
        trigger: Trigger,
        mut metadata: Params,
        now: DateTime<Utc>,
        result: &mut JobResult,
    ) {
        result.processed += 1;
        metadata.insert("job".to_string(), "daily".to_string());
        match self
            .state_machine
            .transition_state(user_id, trigger, metadata, now)
            .await
        {
            Ok(TransitionOutcome::Applied(_)) => result.succeeded += 1,
            Ok(TransitionOutcome::Rejected(_) | TransitionOutcome::Superseded) => {
                result.noops += 1;
            }
            Err(e) if e.is_not_found() => {
                warn!(user_id, %trigger, "engagement state missing, skipped");
                result.skipped += 1;
            }
            Err(e) => {
                error!(user_id, %trigger, error = %e, "transition failed");
                result.failed += 1;
                result.errors.push(format!("{user_id}: {trigger}: {e}"));
            }
        }
    }
}
