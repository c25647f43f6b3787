// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime knobs of the engagement engine, derived from configuration.

use std::time::Duration;

use chrono::TimeDelta;
use nudge_config::model::NudgeConfig;
use nudge_core::types::{
    ACTIVE_WINDOW_DAYS, GOODBYE_WINDOW_HOURS, INACTIVITY_THRESHOLD_DAYS, MAX_SEND_RETRIES,
    QUEUE_BATCH_SIZE, REMIND_LATER_DAYS, SEND_CLAIM_LEASE_SECS, SEND_DELAY_MS,
};

/// Windows, limits and defaults shared by every engagement component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementSettings {
    pub inactivity: TimeDelta,
    pub goodbye_window: TimeDelta,
    pub remind_later: TimeDelta,
    pub active_window: TimeDelta,
    pub default_locale: String,
    pub batch_size: usize,
    pub max_retries: u32,
    pub send_delay: Duration,
    /// How long a claimed message is withheld from other processors.
    pub claim_lease: TimeDelta,
}

impl Default for EngagementSettings {
    fn default() -> Self {
        Self {
            inactivity: TimeDelta::days(i64::from(INACTIVITY_THRESHOLD_DAYS)),
            goodbye_window: TimeDelta::hours(i64::from(GOODBYE_WINDOW_HOURS)),
            remind_later: TimeDelta::days(i64::from(REMIND_LATER_DAYS)),
            active_window: TimeDelta::days(i64::from(ACTIVE_WINDOW_DAYS)),
            default_locale: "pt-BR".to_string(),
            batch_size: QUEUE_BATCH_SIZE,
            max_retries: MAX_SEND_RETRIES,
            send_delay: Duration::from_millis(SEND_DELAY_MS),
            claim_lease: TimeDelta::seconds(SEND_CLAIM_LEASE_SECS),
        }
    }
}

impl EngagementSettings {
    /// Build settings from the `[engagement]` and `[queue]` config sections.
    pub fn from_config(config: &NudgeConfig) -> Self {
        let engagement = &config.engagement;
        let queue = &config.queue;
        Self {
            inactivity: TimeDelta::days(i64::from(engagement.inactivity_days)),
            goodbye_window: TimeDelta::hours(i64::from(engagement.goodbye_window_hours)),
            remind_later: TimeDelta::days(i64::from(engagement.remind_later_days)),
            active_window: TimeDelta::days(i64::from(engagement.active_window_days)),
            default_locale: engagement.default_locale.clone(),
            batch_size: queue.batch_size,
            max_retries: queue.max_retries,
            send_delay: Duration::from_millis(queue.send_delay_ms),
            claim_lease: TimeDelta::seconds(SEND_CLAIM_LEASE_SECS),
        }
    }

    /// Same settings with the inter-send pause disabled.
    pub fn without_send_delay(mut self) -> Self {
        self.send_delay = Duration::ZERO;
        self
    }
}
