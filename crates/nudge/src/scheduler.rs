// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cron-driven job scheduling for `nudge serve`.
//!
//! Each schedule runs on its own task. Runs are serialized through one lock
//! so the daily job and the standalone queue drain never overlap in-process.
//! Expressions are evaluated in UTC.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use nudge_config::model::ScheduleConfig;
use nudge_core::NudgeError;

use crate::app::{App, JobKind};

/// A parsed cron schedule for one job.
pub struct Schedule {
    pub kind: JobKind,
    pub expression: String,
    cron: croner::Cron,
}

impl Schedule {
    pub fn parse(kind: JobKind, expression: &str) -> Result<Self, NudgeError> {
        let cron: croner::Cron = expression
            .parse()
            .map_err(|e| NudgeError::Config(format!("invalid {kind} schedule `{expression}`: {e}")))?;
        Ok(Self {
            kind,
            expression: expression.to_string(),
            cron,
        })
    }

    /// First occurrence strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cron.find_next_occurrence(&after, false).ok()
    }
}

/// Schedules for every job in the configuration.
pub fn schedules(config: &ScheduleConfig) -> Result<Vec<Schedule>, NudgeError> {
    [
        (JobKind::Daily, &config.daily_cron),
        (JobKind::Weekly, &config.weekly_cron),
        (JobKind::Queue, &config.queue_cron),
    ]
    .into_iter()
    .map(|(kind, expression)| Schedule::parse(kind, expression))
    .collect()
}

/// Spawn one task per schedule. Tasks exit when `cancel` fires.
pub fn run_scheduler(
    app: Arc<App>,
    schedules: Vec<Schedule>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let lock = Arc::new(Mutex::new(()));
    schedules
        .into_iter()
        .map(|schedule| {
            let app = app.clone();
            let lock = lock.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { schedule_loop(app, schedule, lock, cancel).await })
        })
        .collect()
}

async fn schedule_loop(
    app: Arc<App>,
    schedule: Schedule,
    lock: Arc<Mutex<()>>,
    cancel: CancellationToken,
) {
    info!(job = %schedule.kind, cron = %schedule.expression, "schedule started");
    loop {
        let now = Utc::now();
        let Some(next) = schedule.next_after(now) else {
            warn!(job = %schedule.kind, "schedule has no future occurrence, stopping");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        debug!(job = %schedule.kind, next = %next, "next run scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel.cancelled() => {
                debug!(job = %schedule.kind, "schedule stopped");
                return;
            }
        }

        let _guard = lock.lock().await;
        match app.run_job(schedule.kind, Utc::now()).await {
            Ok(result) => info!(
                job = result.job,
                processed = result.processed,
                succeeded = result.succeeded,
                failed = result.failed,
                skipped = result.skipped,
                noops = result.noops,
                errors = result.errors.len(),
                duration_ms = result.duration_ms,
                "scheduled job finished"
            ),
            Err(e) => error!(job = %schedule.kind, error = %e, "scheduled job failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn daily_schedule_fires_next_morning() {
        let schedule = Schedule::parse(JobKind::Daily, "0 10 * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2026, 3, 20, 10, 0, 0).unwrap();
        assert_eq!(
            schedule.next_after(after),
            Some(Utc.with_ymd_and_hms(2026, 3, 21, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn weekly_schedule_fires_on_sunday() {
        let schedule = Schedule::parse(JobKind::Weekly, "0 10 * * 0").unwrap();
        // 2026-03-20 is a Friday.
        let after = Utc.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).unwrap();
        assert_eq!(
            schedule.next_after(after),
            Some(Utc.with_ymd_and_hms(2026, 3, 22, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn default_config_yields_three_schedules() {
        let all = schedules(&ScheduleConfig::default()).unwrap();
        let kinds: Vec<_> = all.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, [JobKind::Daily, JobKind::Weekly, JobKind::Queue]);
    }

    #[test]
    fn invalid_expression_is_config_error() {
        let result = Schedule::parse(JobKind::Queue, "every minute");
        assert!(matches!(result, Err(NudgeError::Config(_))));
    }
}
