// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled jobs and event handlers.

pub mod daily;
pub mod tier;
pub mod weekly;

use serde::Serialize;

use crate::sender::ProcessResult;

pub use daily::DailyEngagementJob;
pub use tier::{TierCompletionHandler, TierOutcome, spawn_tier_completion};
pub use weekly::WeeklyReviewJob;

/// Summary of one job run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobResult {
    pub job: &'static str,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Transitions that resolved to nothing: invalid pairs and lost races.
    pub noops: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
    /// Queue drain performed as part of the job, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<ProcessResult>,
}

impl JobResult {
    pub fn new(job: &'static str) -> Self {
        Self {
            job,
            ..Self::default()
        }
    }

    fn finish(&mut self, started: std::time::Instant) {
        self.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        crate::metrics::job(
            self.job,
            started.elapsed().as_secs_f64(),
            self.errors.len(),
        );
    }
}
